//! X11 backend over EWMH properties. There is no accessibility tree on X11,
//! so `ax_windows` is synthesized from window type and state hints and
//! always carries a direct id.

mod monitors;
mod surface;
mod tap;

pub use tap::InputGuard;

use super::preview::{fit_thumbnail, pixels_to_rgba, ChannelOrder};
use super::{
    AppRecord, AxWindow, ProcessControl, ProcessId, ProcessRef, RawWindow, Rect, RgbaImage,
    WindowId, WindowIdentity, WindowRole, WindowScope, WindowSystem, NORMAL_WINDOW_LAYER,
};
use crate::app::AppEvent;
use crate::config::ICON_SIZE_MAX;
use crate::error::{Error, Result};
use crate::input::keys::Modifiers;
use crate::input::tap::TapHandler;
use crate::overlay::surface::{LoggingSurface, OverlaySurface};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};
use x11rb::connection::Connection;
use x11rb::cookie::Cookie;
use x11rb::errors::ReplyError;
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ClientMessageEvent, ConnectionExt as _, EventMask, GetGeometryReply,
    GetPropertyReply, ImageFormat, KeyButMask, TranslateCoordinatesReply, Window,
};
use x11rb::rust_connection::RustConnection;

x11rb::atom_manager! {
    pub(crate) Atoms: AtomsCookie {
        _NET_CLIENT_LIST,
        _NET_CLIENT_LIST_STACKING,
        _NET_ACTIVE_WINDOW,
        _NET_CLOSE_WINDOW,
        _NET_CURRENT_DESKTOP,
        _NET_WM_DESKTOP,
        _NET_WM_PID,
        _NET_WM_NAME,
        _NET_WM_ICON,
        _NET_WM_STATE,
        _NET_WM_STATE_HIDDEN,
        _NET_WM_STATE_MODAL,
        _NET_WM_WINDOW_TYPE,
        _NET_WM_WINDOW_TYPE_NORMAL,
        _NET_WM_WINDOW_TYPE_DIALOG,
        _NET_WM_WINDOW_TYPE_UTILITY,
        _NET_WM_WINDOW_TYPE_TOOLBAR,
        _NET_WM_WINDOW_TYPE_MENU,
        _NET_WM_WINDOW_TYPE_DOCK,
        _NET_WM_WINDOW_TYPE_DESKTOP,
        _NET_WM_WINDOW_TYPE_SPLASH,
        _NET_WM_WINDOW_TYPE_NOTIFICATION,
        UTF8_STRING,
    }
}

const ALL_DESKTOPS: u32 = 0xFFFF_FFFF;
/// EWMH source indication for pagers and other user tools.
const SOURCE_PAGER: u32 = 2;
const PANEL_LAYER: i32 = 1;
const DESKTOP_LAYER: i32 = -1;
const SNAPSHOT_TTL: Duration = Duration::from_secs(1);
const MAX_ICON_WORDS: u32 = 1 << 20;

pub(crate) fn os_err(e: impl std::fmt::Display) -> Error {
    Error::Os(e.to_string())
}

fn is_wayland() -> bool {
    std::env::var("XDG_SESSION_TYPE")
        .map(|v| v == "wayland")
        .unwrap_or(false)
        || std::env::var_os("WAYLAND_DISPLAY").is_some()
}

/// One managed client window with the properties the switcher reads.
#[derive(Debug, Clone)]
struct ClientWindow {
    id: Window,
    pid: Option<ProcessId>,
    title: String,
    class: Option<String>,
    types: Vec<Atom>,
    state: Vec<Atom>,
    desktop: Option<u32>,
    bounds: Rect,
}

struct PendingClient<'c> {
    id: Window,
    pid: Option<Cookie<'c, RustConnection, GetPropertyReply>>,
    net_name: Option<Cookie<'c, RustConnection, GetPropertyReply>>,
    wm_name: Option<Cookie<'c, RustConnection, GetPropertyReply>>,
    class: Option<Cookie<'c, RustConnection, GetPropertyReply>>,
    types: Option<Cookie<'c, RustConnection, GetPropertyReply>>,
    state: Option<Cookie<'c, RustConnection, GetPropertyReply>>,
    desktop: Option<Cookie<'c, RustConnection, GetPropertyReply>>,
    geometry: Option<Cookie<'c, RustConnection, GetGeometryReply>>,
    origin: Option<Cookie<'c, RustConnection, TranslateCoordinatesReply>>,
}

pub struct NativePlatform {
    conn: RustConnection,
    root: Window,
    screen_num: usize,
    atoms: Atoms,
    /// Client windows, front to back, from the last enumeration.
    snapshot: Mutex<Option<(Instant, Arc<Vec<ClientWindow>>)>>,
}

impl NativePlatform {
    pub fn connect() -> Result<Self> {
        if is_wayland() {
            warn!("wayland session: only X11 clients are visible and the shortcut only fires in them");
        }
        let (conn, screen_num) = x11rb::connect(None).map_err(os_err)?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|s| s.root)
            .ok_or_else(|| Error::Os(format!("no X11 screen {screen_num}")))?;
        let atoms = Atoms::new(&conn).map_err(os_err)?.reply().map_err(os_err)?;
        debug!(screen = screen_num, "connected to X11");
        Ok(Self {
            conn,
            root,
            screen_num,
            atoms,
            snapshot: Mutex::new(None),
        })
    }

    fn property32(
        &self,
        window: Window,
        property: Atom,
        ty: impl Into<Atom>,
        len: u32,
    ) -> std::result::Result<Vec<u32>, ReplyError> {
        let reply = self
            .conn
            .get_property(false, window, property, ty, 0, len)?
            .reply()?;
        Ok(reply.value32().map(|v| v.collect()).unwrap_or_default())
    }

    /// Managed windows bottom to top, as the WM stacks them.
    fn stacking(&self) -> Result<Vec<Window>> {
        let ids = self
            .property32(self.root, self.atoms._NET_CLIENT_LIST_STACKING, AtomEnum::WINDOW, 4096)
            .map_err(os_err)?;
        if !ids.is_empty() {
            return Ok(ids);
        }
        self.property32(self.root, self.atoms._NET_CLIENT_LIST, AtomEnum::WINDOW, 4096)
            .map_err(os_err)
    }

    fn current_desktop(&self) -> Option<u32> {
        self.property32(self.root, self.atoms._NET_CURRENT_DESKTOP, AtomEnum::CARDINAL, 1)
            .ok()?
            .first()
            .copied()
    }

    /// Describes every client, front to back. Requests are pipelined.
    fn describe_all(&self) -> Result<Arc<Vec<ClientWindow>>> {
        let mut ids = self.stacking()?;
        ids.reverse();
        let get = |id: Window, property: Atom, ty: Atom, len: u32| {
            self.conn.get_property(false, id, property, ty, 0, len).ok()
        };
        let any: Atom = AtomEnum::ANY.into();
        let pending: Vec<PendingClient<'_>> = ids
            .iter()
            .map(|&id| PendingClient {
                id,
                pid: get(id, self.atoms._NET_WM_PID, AtomEnum::CARDINAL.into(), 1),
                net_name: get(id, self.atoms._NET_WM_NAME, self.atoms.UTF8_STRING, 1024),
                wm_name: get(id, AtomEnum::WM_NAME.into(), any, 1024),
                class: get(id, AtomEnum::WM_CLASS.into(), AtomEnum::STRING.into(), 1024),
                types: get(id, self.atoms._NET_WM_WINDOW_TYPE, AtomEnum::ATOM.into(), 16),
                state: get(id, self.atoms._NET_WM_STATE, AtomEnum::ATOM.into(), 16),
                desktop: get(id, self.atoms._NET_WM_DESKTOP, AtomEnum::CARDINAL.into(), 1),
                geometry: self.conn.get_geometry(id).ok(),
                origin: self.conn.translate_coordinates(id, self.root, 0, 0).ok(),
            })
            .collect();

        let windows: Vec<ClientWindow> = pending.into_iter().map(resolve_client).collect();
        let windows = Arc::new(windows);
        *self.snapshot.lock() = Some((Instant::now(), windows.clone()));
        trace!(total = windows.len(), "described x11 clients");
        Ok(windows)
    }

    fn clients(&self) -> Result<Arc<Vec<ClientWindow>>> {
        if let Some((at, windows)) = self.snapshot.lock().as_ref() {
            if at.elapsed() < SNAPSHOT_TTL {
                return Ok(windows.clone());
            }
        }
        self.describe_all()
    }

    fn layer_of(&self, client: &ClientWindow) -> i32 {
        let a = &self.atoms;
        if client.types.contains(&a._NET_WM_WINDOW_TYPE_DESKTOP) {
            return DESKTOP_LAYER;
        }
        let panel_types = [
            a._NET_WM_WINDOW_TYPE_DOCK,
            a._NET_WM_WINDOW_TYPE_MENU,
            a._NET_WM_WINDOW_TYPE_SPLASH,
            a._NET_WM_WINDOW_TYPE_NOTIFICATION,
            a._NET_WM_WINDOW_TYPE_TOOLBAR,
        ];
        if client.types.iter().any(|t| panel_types.contains(t)) {
            return PANEL_LAYER;
        }
        NORMAL_WINDOW_LAYER
    }

    fn role_of(&self, client: &ClientWindow) -> WindowRole {
        let a = &self.atoms;
        if client.state.contains(&a._NET_WM_STATE_MODAL) {
            return WindowRole::Sheet;
        }
        match client.types.first() {
            None => WindowRole::Standard,
            Some(&t) if t == a._NET_WM_WINDOW_TYPE_NORMAL => WindowRole::Standard,
            Some(&t) if t == a._NET_WM_WINDOW_TYPE_DIALOG => WindowRole::Dialog,
            Some(&t) if t == a._NET_WM_WINDOW_TYPE_UTILITY || t == a._NET_WM_WINDOW_TYPE_TOOLBAR => {
                WindowRole::FloatingPanel
            }
            Some(_) => WindowRole::Other,
        }
    }

    fn window_pid(&self, id: Window) -> Result<Option<ProcessId>> {
        match self.property32(id, self.atoms._NET_WM_PID, AtomEnum::CARDINAL, 1) {
            Ok(v) => Ok(v.first().map(|&p| p as ProcessId)),
            Err(ReplyError::X11Error(_)) => Ok(None),
            Err(e) => Err(os_err(e)),
        }
    }

    /// Errors with a stale reference unless `identity` still names a live
    /// window owned by the same process.
    fn ensure_live(&self, identity: &WindowIdentity) -> Result<()> {
        match self.window_pid(identity.window)? {
            Some(pid) if pid == identity.pid => Ok(()),
            _ => Err(Error::stale(identity.pid, identity.window)),
        }
    }

    fn send_root_message(&self, window: Window, message: Atom, data: [u32; 5]) -> Result<()> {
        let event = ClientMessageEvent::new(32, window, message, data);
        self.conn
            .send_event(
                false,
                self.root,
                EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
                event,
            )
            .map_err(os_err)?;
        self.conn.flush().map_err(os_err)
    }

    fn request_activation(&self, window: Window) -> Result<()> {
        self.send_root_message(
            window,
            self.atoms._NET_ACTIVE_WINDOW,
            [SOURCE_PAGER, x11rb::CURRENT_TIME, 0, 0, 0],
        )
    }

    fn windows_of(&self, pid: ProcessId) -> Result<Vec<Window>> {
        Ok(self
            .describe_all()?
            .iter()
            .filter(|c| c.pid == Some(pid))
            .map(|c| c.id)
            .collect())
    }

    fn channel_order(&self) -> ChannelOrder {
        let Some(screen) = self.conn.setup().roots.get(self.screen_num) else {
            return ChannelOrder::default();
        };
        screen
            .allowed_depths
            .iter()
            .flat_map(|depth| depth.visuals.iter())
            .find(|visual| visual.visual_id == screen.root_visual)
            .map(|v| ChannelOrder::from_masks(v.red_mask, v.green_mask, v.blue_mask))
            .unwrap_or_default()
    }
}

fn reply_of<R>(cookie: Option<Cookie<'_, RustConnection, R>>) -> Option<R>
where
    R: x11rb::x11_utils::TryParse,
{
    cookie.and_then(|c| c.reply().ok())
}

fn resolve_client(p: PendingClient<'_>) -> ClientWindow {
    let words = |reply: Option<GetPropertyReply>| -> Vec<u32> {
        reply
            .and_then(|r| r.value32().map(|v| v.collect()))
            .unwrap_or_default()
    };
    let text = |reply: Option<GetPropertyReply>| -> String {
        reply
            .map(|r| String::from_utf8_lossy(&r.value).into_owned())
            .unwrap_or_default()
    };

    let mut title = text(reply_of(p.net_name));
    if title.is_empty() {
        title = text(reply_of(p.wm_name));
    }
    let class = reply_of(p.class).and_then(|r| wm_class_name(&r.value));
    let geometry = reply_of(p.geometry);
    let origin = reply_of(p.origin);
    let bounds = match (geometry, origin) {
        (Some(g), Some(o)) => Rect::new(
            f64::from(o.dst_x),
            f64::from(o.dst_y),
            f64::from(g.width),
            f64::from(g.height),
        ),
        (Some(g), None) => Rect::new(f64::from(g.x), f64::from(g.y), f64::from(g.width), f64::from(g.height)),
        _ => Rect::default(),
    };

    ClientWindow {
        id: p.id,
        pid: words(reply_of(p.pid)).first().map(|&pid| pid as ProcessId),
        title,
        class,
        types: words(reply_of(p.types)),
        state: words(reply_of(p.state)),
        desktop: words(reply_of(p.desktop)).first().copied(),
        bounds,
    }
}

/// `WM_CLASS` is "instance\0class\0"; the class part names the app.
fn wm_class_name(value: &[u8]) -> Option<String> {
    let parts: Vec<&str> = std::str::from_utf8(value)
        .ok()?
        .split('\0')
        .filter(|s| !s.is_empty())
        .collect();
    parts.get(1).or_else(|| parts.first()).map(|s| s.to_string())
}

/// Picks the largest `_NET_WM_ICON` entry no bigger than `max_side`, else
/// the smallest available. Pixels are packed ARGB words.
fn parse_net_wm_icon(data: &[u32], max_side: u32) -> Option<RgbaImage> {
    let mut entries = Vec::new();
    let mut rest = data;
    while let [w, h, tail @ ..] = rest {
        let len = (*w as usize).checked_mul(*h as usize)?;
        if *w == 0 || *h == 0 || tail.len() < len {
            break;
        }
        entries.push((*w, *h, &tail[..len]));
        rest = &tail[len..];
    }
    let fits = entries
        .iter()
        .filter(|(w, h, _)| *w <= max_side && *h <= max_side)
        .max_by_key(|(w, h, _)| w * h);
    let (w, h, pixels) = fits.or_else(|| entries.iter().min_by_key(|(w, h, _)| w * h))?;
    let rgba: Vec<u8> = pixels
        .iter()
        .flat_map(|argb| {
            let [a, r, g, b] = argb.to_be_bytes();
            [r, g, b, a]
        })
        .collect();
    RgbaImage::from_raw(*w, *h, rgba)
}

fn executable_of(pid: ProcessId) -> Option<PathBuf> {
    std::fs::read_link(format!("/proc/{pid}/exe")).ok()
}

fn process_name(pid: ProcessId) -> Option<String> {
    std::fs::read_to_string(format!("/proc/{pid}/comm"))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub(crate) fn modifiers_from_mask(mask: u16) -> Modifiers {
    let mut mods = Modifiers::empty();
    let pairs = [
        (KeyButMask::SHIFT, Modifiers::SHIFT),
        (KeyButMask::CONTROL, Modifiers::CONTROL),
        (KeyButMask::MOD1, Modifiers::ALT),
        (KeyButMask::MOD4, Modifiers::SUPER),
    ];
    for (bit, modifier) in pairs {
        if mask & u16::from(bit) != 0 {
            mods |= modifier;
        }
    }
    mods
}

impl WindowSystem for NativePlatform {
    fn running_apps(&self) -> Result<Vec<AppRecord>> {
        let clients = self.describe_all()?;
        let mut apps: Vec<AppRecord> = Vec::new();
        let mut index: HashMap<ProcessId, usize> = HashMap::new();
        for client in clients.iter() {
            let Some(pid) = client.pid else {
                continue;
            };
            let regular = self.layer_of(client) == NORMAL_WINDOW_LAYER;
            if let Some(&i) = index.get(&pid) {
                apps[i].regular |= regular;
                continue;
            }
            let name = client
                .class
                .clone()
                .or_else(|| process_name(pid))
                .unwrap_or_else(|| format!("pid {pid}"));
            index.insert(pid, apps.len());
            apps.push(AppRecord {
                process: ProcessRef {
                    pid,
                    executable: executable_of(pid),
                    bundle_id: None,
                },
                name,
                regular,
            });
        }
        Ok(apps)
    }

    fn window_list(&self, scope: WindowScope) -> Result<Vec<RawWindow>> {
        let clients = self.describe_all()?;
        let desktop = match scope {
            WindowScope::AllDesktops => None,
            WindowScope::OnScreen => self.current_desktop(),
        };
        Ok(clients
            .iter()
            .filter(|c| match (desktop, c.desktop) {
                (Some(current), Some(d)) => d == current || d == ALL_DESKTOPS,
                _ => true,
            })
            .filter_map(|c| {
                Some(RawWindow {
                    pid: c.pid?,
                    id: c.id,
                    title: c.title.clone(),
                    layer: self.layer_of(c),
                    bounds: c.bounds,
                })
            })
            .collect())
    }

    fn ax_windows(&self, pid: ProcessId) -> Result<Option<Vec<AxWindow>>> {
        let clients = self.clients()?;
        let windows = clients
            .iter()
            .filter(|c| c.pid == Some(pid))
            .map(|c| AxWindow {
                id: Some(c.id),
                title: Some(c.title.clone()),
                bounds: Some(c.bounds),
                minimized: c.state.contains(&self.atoms._NET_WM_STATE_HIDDEN),
                role: self.role_of(c),
            })
            .collect();
        Ok(Some(windows))
    }

    fn frontmost_pid(&self) -> Option<ProcessId> {
        let active = self
            .property32(self.root, self.atoms._NET_ACTIVE_WINDOW, AtomEnum::WINDOW, 1)
            .ok()?
            .first()
            .copied()
            .filter(|&w| w != 0)?;
        self.window_pid(active).ok().flatten()
    }

    fn app_icon(&self, process: &ProcessRef) -> Option<RgbaImage> {
        let clients = self.clients().ok()?;
        clients
            .iter()
            .filter(|c| c.pid == Some(process.pid))
            .find_map(|c| {
                let data = self
                    .property32(c.id, self.atoms._NET_WM_ICON, AtomEnum::CARDINAL, MAX_ICON_WORDS)
                    .ok()?;
                parse_net_wm_icon(&data, ICON_SIZE_MAX)
            })
    }

    fn capture_window(&self, id: WindowId, max_w: u32, max_h: u32) -> Result<RgbaImage> {
        let failure = |reason: String| Error::CaptureFailure { window: id, reason };
        let geometry = self
            .conn
            .get_geometry(id)
            .map_err(os_err)?
            .reply()
            .map_err(|e| failure(e.to_string()))?;
        if geometry.width == 0 || geometry.height == 0 {
            return Err(failure("empty geometry".into()));
        }
        let image = self
            .conn
            .get_image(ImageFormat::Z_PIXMAP, id, 0, 0, geometry.width, geometry.height, u32::MAX)
            .map_err(os_err)?
            .reply()
            .map_err(|e| failure(e.to_string()))?;

        let format = self
            .conn
            .setup()
            .pixmap_formats
            .iter()
            .find(|f| f.depth == image.depth)
            .ok_or_else(|| failure(format!("no pixmap format for depth {}", image.depth)))?;
        let width = usize::from(geometry.width);
        let height = usize::from(geometry.height);
        let bits = usize::from(format.bits_per_pixel);
        let pad = usize::from(format.scanline_pad).max(8);
        let stride = (width * bits).div_ceil(pad) * pad / 8;

        let full = pixels_to_rgba(&image.data, width, height, stride, bits / 8, self.channel_order())
            .ok_or_else(|| failure(format!("unsupported pixel layout ({bits} bpp)")))?;
        fit_thumbnail(&full, max_w, max_h).ok_or_else(|| failure("empty thumbnail".into()))
    }

    fn monitors(&self) -> Vec<Rect> {
        let found = monitors::xrandr_monitors();
        if !found.is_empty() {
            return found;
        }
        self.conn
            .setup()
            .roots
            .get(self.screen_num)
            .map(|s| {
                vec![Rect::new(
                    0.0,
                    0.0,
                    f64::from(s.width_in_pixels),
                    f64::from(s.height_in_pixels),
                )]
            })
            .unwrap_or_default()
    }

    fn cursor_position(&self) -> Option<(f64, f64)> {
        let pointer = self.conn.query_pointer(self.root).ok()?.reply().ok()?;
        Some((f64::from(pointer.root_x), f64::from(pointer.root_y)))
    }
}

impl ProcessControl for NativePlatform {
    fn activate_process(&self, process: &ProcessRef) -> Result<()> {
        let front = self
            .windows_of(process.pid)?
            .first()
            .copied()
            .ok_or_else(|| Error::stale(process.pid, None))?;
        self.request_activation(front)
    }

    fn raise_window(&self, identity: &WindowIdentity) -> Result<()> {
        self.ensure_live(identity)?;
        self.request_activation(identity.window)
    }

    fn raise_all_windows(&self, process: &ProcessRef) -> Result<()> {
        let windows = self.windows_of(process.pid)?;
        if windows.is_empty() {
            return Err(Error::stale(process.pid, None));
        }
        for window in windows.into_iter().rev() {
            self.request_activation(window)?;
        }
        Ok(())
    }

    fn terminate_process(&self, process: &ProcessRef) -> Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        match kill(Pid::from_raw(process.pid), Signal::SIGTERM) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => Err(Error::stale(process.pid, None)),
            Err(e) => Err(os_err(e)),
        }
    }

    fn close_window(&self, identity: &WindowIdentity) -> Result<()> {
        self.ensure_live(identity)?;
        self.send_root_message(
            identity.window,
            self.atoms._NET_CLOSE_WINDOW,
            [x11rb::CURRENT_TIME, SOURCE_PAGER, 0, 0, 0],
        )
    }

    fn launch_new_instance(&self, process: &ProcessRef) -> Result<()> {
        let exe = process
            .executable
            .clone()
            .or_else(|| executable_of(process.pid))
            .ok_or(Error::Unsupported)?;
        let mut child = std::process::Command::new(&exe)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()?;
        debug!(exe = %exe.display(), child = child.id(), "launched new instance");
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }

    fn send_new_window_shortcut(&self, _process: &ProcessRef) -> Result<()> {
        Err(Error::Unsupported)
    }
}

pub fn missing_permissions() -> Vec<&'static str> {
    if std::env::var_os("DISPLAY").is_none() {
        return vec!["X11 display"];
    }
    Vec::new()
}

pub fn install_input_tap(handler: TapHandler) -> Result<InputGuard> {
    tap::install(handler)
}

pub fn current_modifiers() -> Option<Modifiers> {
    static POINTER: OnceLock<Option<(RustConnection, Window)>> = OnceLock::new();
    let (conn, root) = POINTER
        .get_or_init(|| {
            let (conn, screen) = x11rb::connect(None).ok()?;
            let root = conn.setup().roots.get(screen)?.root;
            Some((conn, root))
        })
        .as_ref()?;
    let pointer = conn.query_pointer(*root).ok()?.reply().ok()?;
    Some(modifiers_from_mask(u16::from(pointer.mask)))
}

pub fn overlay_surface(events: Sender<AppEvent>) -> Box<dyn OverlaySurface> {
    match surface::X11Surface::open(events) {
        Ok(surface) => Box::new(surface),
        Err(e) => {
            warn!(error = %e, "x11 overlay unavailable, panel is headless");
            Box::new(LoggingSurface)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wm_class_prefers_class_part() {
        let cases: [(&[u8], Option<&str>); 4] = [
            (b"navigator\0Firefox\0", Some("Firefox")),
            (b"xterm\0", Some("xterm")),
            (b"", None),
            (b"\0\0", None),
        ];
        for (raw, expected) in cases {
            assert_eq!(wm_class_name(raw).as_deref(), expected, "raw: {raw:?}");
        }
    }

    #[test]
    fn icon_picks_largest_that_fits() {
        let mut data = vec![1, 1, 0xFF11_2233];
        data.extend([2, 2]);
        data.extend([0x8000_00FF; 4]);
        data.extend([4, 4]);
        data.extend([0u32; 16]);

        let icon = parse_net_wm_icon(&data, 3).unwrap();
        assert_eq!(icon.dimensions(), (2, 2));
        assert_eq!(icon.get_pixel(0, 0).0, [0, 0, 0xFF, 0x80]);

        let smallest = parse_net_wm_icon(&data, 0).unwrap();
        assert_eq!(smallest.get_pixel(0, 0).0, [0x11, 0x22, 0x33, 0xFF]);
    }

    #[test]
    fn truncated_icon_data_is_ignored() {
        let cases: [&[u32]; 3] = [&[], &[16, 16, 0, 0], &[0, 0]];
        for data in cases {
            assert!(parse_net_wm_icon(data, 64).is_none(), "data: {data:?}");
        }
    }

    #[test]
    fn modifier_mask_ignores_locks() {
        let mask = |bits: &[KeyButMask]| bits.iter().fold(0u16, |acc, b| acc | u16::from(*b));
        let cases = [
            (mask(&[KeyButMask::MOD1]), Modifiers::ALT),
            (mask(&[KeyButMask::MOD1, KeyButMask::SHIFT]), Modifiers::ALT | Modifiers::SHIFT),
            (mask(&[KeyButMask::LOCK, KeyButMask::MOD2]), Modifiers::empty()),
            (mask(&[KeyButMask::CONTROL, KeyButMask::MOD4]), Modifiers::CONTROL | Modifiers::SUPER),
        ];
        for (bits, expected) in cases {
            assert_eq!(modifiers_from_mask(bits), expected, "mask: {bits:#x}");
        }
    }
}
