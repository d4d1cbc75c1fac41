#[cfg(test)]
pub(crate) mod fake;
pub(crate) mod preview;

use crate::error::Result;
use crate::input::keys::Modifiers;
use crate::input::tap::TapHandler;
use std::path::PathBuf;

pub use image::RgbaImage;

pub type ProcessId = i32;
pub type WindowId = u32;

/// Stable key for one window: owning process plus window handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowIdentity {
    pub pid: ProcessId,
    pub window: WindowId,
}

impl WindowIdentity {
    pub fn new(pid: ProcessId, window: WindowId) -> Self {
        Self { pid, window }
    }
}

/// Handle used to query, activate or terminate the owning process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessRef {
    pub pid: ProcessId,
    pub executable: Option<PathBuf>,
    pub bundle_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    /// Every component within `tolerance` of the other rect's.
    pub fn approx_eq(&self, other: &Rect, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
    }

    pub fn centered(&self, width: f64, height: f64) -> Rect {
        Rect::new(
            self.x + (self.width - width) / 2.0,
            self.y + (self.height - height) / 2.0,
            width,
            height,
        )
    }
}

/// A running application as reported by the OS.
#[derive(Debug, Clone, PartialEq)]
pub struct AppRecord {
    pub process: ProcessRef,
    pub name: String,
    /// User-facing, dock-visible activation policy.
    pub regular: bool,
}

/// One entry of the system-wide window list, in enumeration order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWindow {
    pub pid: ProcessId,
    pub id: WindowId,
    pub title: String,
    pub layer: i32,
    pub bounds: Rect,
}

pub const NORMAL_WINDOW_LAYER: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowRole {
    #[default]
    Standard,
    Dialog,
    Sheet,
    FloatingPanel,
    SystemDialog,
    Other,
}

impl WindowRole {
    pub fn is_switchable(self) -> bool {
        matches!(self, Self::Standard | Self::Other)
    }
}

/// A window element from the accessibility tree. Every attribute may be
/// missing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AxWindow {
    pub id: Option<WindowId>,
    pub title: Option<String>,
    pub bounds: Option<Rect>,
    pub minimized: bool,
    pub role: WindowRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowScope {
    OnScreen,
    AllDesktops,
}

/// Read side of the windowing and accessibility subsystems.
pub trait WindowSystem: Send + Sync {
    fn running_apps(&self) -> Result<Vec<AppRecord>>;

    fn window_list(&self, scope: WindowScope) -> Result<Vec<RawWindow>>;

    /// `Ok(None)` when the accessibility tree for `pid` is unavailable.
    fn ax_windows(&self, pid: ProcessId) -> Result<Option<Vec<AxWindow>>>;

    fn frontmost_pid(&self) -> Option<ProcessId>;

    /// Whether the OS's own switcher-style UI is currently on screen.
    fn native_switcher_active(&self) -> bool {
        false
    }

    fn app_icon(&self, _process: &ProcessRef) -> Option<RgbaImage> {
        None
    }

    fn capture_window(&self, id: WindowId, max_w: u32, max_h: u32) -> Result<RgbaImage>;

    fn monitors(&self) -> Vec<Rect>;

    fn cursor_position(&self) -> Option<(f64, f64)>;
}

/// Write side: everything that changes process state or window z-order.
pub trait ProcessControl: Send + Sync {
    fn activate_process(&self, process: &ProcessRef) -> Result<()>;

    fn raise_window(&self, identity: &WindowIdentity) -> Result<()>;

    fn raise_all_windows(&self, process: &ProcessRef) -> Result<()>;

    fn terminate_process(&self, process: &ProcessRef) -> Result<()>;

    fn close_window(&self, identity: &WindowIdentity) -> Result<()>;

    /// `Err(Unsupported)` when the platform cannot force a new window.
    fn launch_new_instance(&self, process: &ProcessRef) -> Result<()>;

    fn send_new_window_shortcut(&self, process: &ProcessRef) -> Result<()>;
}

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as imp;
#[cfg(target_os = "macos")]
use macos as imp;
#[cfg(target_os = "windows")]
use windows as imp;

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
compile_error!("app-switcher: unsupported target OS; add src/platform/<os>.rs and wire it in src/platform/mod.rs");

pub type NativePlatform = imp::NativePlatform;
pub type InputGuard = imp::InputGuard;

pub fn connect() -> Result<NativePlatform> {
    imp::NativePlatform::connect()
}

/// Missing permissions, by name. Empty when everything is granted.
pub fn missing_permissions() -> Vec<&'static str> {
    imp::missing_permissions()
}

/// Installs the low-level key tap. Events are classified by `handler` on
/// the tap's own thread.
pub fn install_input_tap(handler: TapHandler) -> Result<InputGuard> {
    imp::install_input_tap(handler)
}

/// Currently held modifiers, polled by the release monitor.
pub fn current_modifiers() -> Option<Modifiers> {
    imp::current_modifiers()
}

pub fn overlay_surface(
    events: crossbeam_channel::Sender<crate::app::AppEvent>,
) -> Box<dyn crate::overlay::surface::OverlaySurface> {
    imp::overlay_surface(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_eq_tolerance() {
        let base = Rect::new(10.0, 20.0, 300.0, 200.0);
        let cases = [
            (Rect::new(10.0, 20.0, 300.0, 200.0), true),
            (Rect::new(11.5, 18.0, 302.0, 199.0), true),
            (Rect::new(12.5, 20.0, 300.0, 200.0), false),
            (Rect::new(10.0, 20.0, 300.0, 197.9), false),
        ];
        for (other, expected) in cases {
            assert_eq!(base.approx_eq(&other, 2.0), expected, "other: {other:?}");
        }
    }

    #[test]
    fn contains_is_half_open() {
        let r = Rect::new(0.0, 0.0, 1920.0, 1080.0);
        let cases = [
            (0.0, 0.0, true),
            (1919.0, 1079.0, true),
            (1920.0, 500.0, false),
            (0.0, 1080.0, false),
            (-1.0, 0.0, false),
        ];
        for (x, y, expected) in cases {
            assert_eq!(r.contains(x, y), expected, "point: ({x}, {y})");
        }
    }

    #[test]
    fn switchable_roles() {
        let cases = [
            (WindowRole::Standard, true),
            (WindowRole::Other, true),
            (WindowRole::Dialog, false),
            (WindowRole::Sheet, false),
            (WindowRole::FloatingPanel, false),
            (WindowRole::SystemDialog, false),
        ];
        for (role, expected) in cases {
            assert_eq!(role.is_switchable(), expected, "role: {role:?}");
        }
    }
}
