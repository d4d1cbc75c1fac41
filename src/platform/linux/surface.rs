//! Override-redirect X11 window showing the panel as plain cells, with a
//! thread that turns pointer events into [`SurfaceEvent`]s.

use super::os_err;
use crate::app::AppEvent;
use crate::error::Result;
use crate::overlay::surface::{OverlaySurface, PanelEntry, PanelView, SurfaceEvent};
use crate::platform::Rect;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    ChangeGCAux, ConfigureWindowAux, ConnectionExt as _, CreateGCAux, CreateWindowAux, EventMask,
    Gcontext, ImageFormat, Rectangle, StackMode, Window, WindowClass,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

const BACKGROUND: u32 = 0x20_21_24;
const CELL: u32 = 0x30_31_34;
const SELECTED: u32 = 0x3d_5a_b8;
const TEXT: u32 = 0xe8_ea_ed;
const LABEL_INSET: f64 = 6.0;
/// Approximate advance of the server's default fixed font.
const GLYPH_WIDTH: f64 = 6.0;
const PRIMARY_BUTTON: u8 = 1;

struct Painter {
    conn: RustConnection,
    window: Window,
    gc: Gcontext,
    depth: u8,
}

pub(super) struct X11Surface {
    painter: Arc<Painter>,
    view: Arc<Mutex<Option<PanelView>>>,
}

impl X11Surface {
    pub(super) fn open(events: Sender<AppEvent>) -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).map_err(os_err)?;
        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .ok_or_else(|| os_err(format!("no X11 screen {screen_num}")))?;
        let (root, depth) = (screen.root, screen.root_depth);

        let window = conn.generate_id().map_err(os_err)?;
        conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new()
                .background_pixel(BACKGROUND)
                .override_redirect(1)
                .event_mask(EventMask::EXPOSURE | EventMask::POINTER_MOTION | EventMask::BUTTON_PRESS),
        )
        .map_err(os_err)?;
        let gc = conn.generate_id().map_err(os_err)?;
        conn.create_gc(
            gc,
            window,
            &CreateGCAux::new()
                .foreground(TEXT)
                .background(CELL)
                .graphics_exposures(0),
        )
        .map_err(os_err)?;
        conn.flush().map_err(os_err)?;

        let painter = Arc::new(Painter {
            conn,
            window,
            gc,
            depth,
        });
        let view = Arc::new(Mutex::new(None));
        spawn_event_thread(painter.clone(), view.clone(), events)?;
        debug!(window, "x11 overlay window created");
        Ok(Self { painter, view })
    }
}

fn spawn_event_thread(
    painter: Arc<Painter>,
    view: Arc<Mutex<Option<PanelView>>>,
    events: Sender<AppEvent>,
) -> Result<()> {
    std::thread::Builder::new()
        .name("x11-overlay-events".into())
        .spawn(move || {
            let mut hovered = None;
            loop {
                let event = match painter.conn.wait_for_event() {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "x11 overlay connection lost");
                        let _ = events.send(AppEvent::Shutdown);
                        return;
                    }
                };
                let hit = |x: i16, y: i16| {
                    view.lock()
                        .as_ref()
                        .and_then(|v| v.layout.hit_test(f64::from(x), f64::from(y)))
                };
                let forwarded = match event {
                    Event::Expose(e) if e.count == 0 => {
                        if let Some(v) = view.lock().as_ref() {
                            painter.paint(v);
                        }
                        Vec::new()
                    }
                    Event::MotionNotify(e) => {
                        let index = hit(e.event_x, e.event_y);
                        let mut out = vec![SurfaceEvent::PointerMoved];
                        if index != hovered {
                            hovered = index;
                            out.extend(index.map(SurfaceEvent::Hover));
                        }
                        out
                    }
                    Event::ButtonPress(e) if e.detail == PRIMARY_BUTTON => {
                        hit(e.event_x, e.event_y).map(SurfaceEvent::Click).into_iter().collect()
                    }
                    _ => Vec::new(),
                };
                for event in forwarded {
                    if events.send(AppEvent::Surface(event)).is_err() {
                        return;
                    }
                }
            }
        })?;
    Ok(())
}

impl Painter {
    fn paint(&self, view: &PanelView) {
        if let Err(e) = self.try_paint(view) {
            warn!(error = %e, "failed to draw panel");
        }
    }

    fn try_paint(&self, view: &PanelView) -> Result<()> {
        let frame = view.layout.frame;
        self.fill(&Rect::new(0.0, 0.0, frame.width, frame.height), BACKGROUND)?;
        for (index, entry) in view.entries.iter().enumerate() {
            let Some(cell) = view.layout.cell_rect(index) else {
                break;
            };
            if cell.y + cell.height > frame.height {
                break;
            }
            let color = if view.selected == Some(index) { SELECTED } else { CELL };
            self.fill(&cell, color)?;
            self.thumbnail(entry, &cell, color)?;
            self.label(entry, &cell, color)?;
        }
        self.conn.flush().map_err(os_err)
    }

    fn fill(&self, rect: &Rect, color: u32) -> Result<()> {
        self.conn
            .change_gc(self.gc, &ChangeGCAux::new().foreground(color))
            .map_err(os_err)?;
        self.conn
            .poly_fill_rectangle(self.window, self.gc, &[to_rectangle(rect)])
            .map_err(os_err)?;
        Ok(())
    }

    fn thumbnail(&self, entry: &PanelEntry, cell: &Rect, background: u32) -> Result<()> {
        let Some(image) = entry.thumbnail.as_ref() else {
            return Ok(());
        };
        if self.depth != 24 && self.depth != 32 {
            return Ok(());
        }
        let (w, h) = image.dimensions();
        let area_h = cell.height - crate::overlay::layout::LABEL_HEIGHT;
        let x = cell.x + (cell.width - f64::from(w)) / 2.0;
        let y = cell.y + (area_h - f64::from(h)) / 2.0;
        let data = blend_bgrx(image.as_raw(), background);
        self.conn
            .put_image(
                ImageFormat::Z_PIXMAP,
                self.window,
                self.gc,
                w as u16,
                h as u16,
                x as i16,
                y as i16,
                0,
                self.depth,
                &data,
            )
            .map_err(os_err)?;
        Ok(())
    }

    fn label(&self, entry: &PanelEntry, cell: &Rect, background: u32) -> Result<()> {
        let max_chars = ((cell.width - LABEL_INSET * 2.0) / GLYPH_WIDTH).max(1.0) as usize;
        let text = label_bytes(&entry.label, max_chars);
        self.conn
            .change_gc(self.gc, &ChangeGCAux::new().foreground(TEXT).background(background))
            .map_err(os_err)?;
        self.conn
            .image_text8(
                self.window,
                self.gc,
                (cell.x + LABEL_INSET) as i16,
                (cell.y + cell.height - LABEL_INSET) as i16,
                &text,
            )
            .map_err(os_err)?;
        Ok(())
    }
}

impl OverlaySurface for X11Surface {
    fn show(&mut self, view: &PanelView) {
        let frame = view.layout.frame;
        let p = &self.painter;
        let placed = p
            .conn
            .configure_window(
                p.window,
                &ConfigureWindowAux::new()
                    .x(frame.x as i32)
                    .y(frame.y as i32)
                    .width(frame.width.max(1.0) as u32)
                    .height(frame.height.max(1.0) as u32)
                    .stack_mode(StackMode::ABOVE),
            )
            .and_then(|_| p.conn.map_window(p.window))
            .and_then(|_| p.conn.flush());
        if let Err(e) = placed {
            warn!(error = %e, "failed to map panel");
            return;
        }
        *self.view.lock() = Some(view.clone());
        p.paint(view);
    }

    fn update(&mut self, view: &PanelView) {
        let mut current = self.view.lock();
        if current.is_none() {
            return;
        }
        *current = Some(view.clone());
        drop(current);
        self.painter.paint(view);
    }

    fn hide(&mut self) {
        *self.view.lock() = None;
        let p = &self.painter;
        if let Err(e) = p.conn.unmap_window(p.window).and_then(|_| p.conn.flush()) {
            warn!(error = %e, "failed to unmap panel");
        }
        trace!("panel unmapped");
    }
}

fn to_rectangle(rect: &Rect) -> Rectangle {
    Rectangle {
        x: rect.x as i16,
        y: rect.y as i16,
        width: rect.width.max(0.0) as u16,
        height: rect.height.max(0.0) as u16,
    }
}

/// RGBA over a solid background, packed as little-endian BGRX.
fn blend_bgrx(rgba: &[u8], background: u32) -> Vec<u8> {
    let [_, bg_r, bg_g, bg_b] = background.to_be_bytes();
    let mix = |src: u8, dst: u8, a: u16| ((u16::from(src) * a + u16::from(dst) * (255 - a)) / 255) as u8;
    rgba.chunks_exact(4)
        .flat_map(|px| {
            let a = u16::from(px[3]);
            [mix(px[2], bg_b, a), mix(px[1], bg_g, a), mix(px[0], bg_r, a), 0]
        })
        .collect()
}

/// Latin-1 safe label, shortened with "..." to `max_chars`.
fn label_bytes(label: &str, max_chars: usize) -> Vec<u8> {
    let limit = max_chars.min(255);
    let chars: Vec<u8> = label
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c as u8 } else { b'?' })
        .collect();
    if chars.len() <= limit {
        return chars;
    }
    let keep = limit.saturating_sub(3);
    let mut out = chars[..keep].to_vec();
    out.extend_from_slice(&b"..."[..limit - keep]);
    out
}
