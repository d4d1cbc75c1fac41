use super::layout::PanelLayout;
use crate::platform::RgbaImage;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct PanelEntry {
    pub label: String,
    pub thumbnail: Option<Arc<RgbaImage>>,
    pub minimized: bool,
}

/// Everything a surface needs to draw one frame of the panel.
#[derive(Debug, Clone)]
pub struct PanelView {
    pub layout: PanelLayout,
    pub entries: Vec<PanelEntry>,
    pub selected: Option<usize>,
    /// Direction of the trigger that opened the panel.
    pub reverse: bool,
}

/// Pointer input reported back by a surface, as panel entry indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    PointerMoved,
    Hover(usize),
    Click(usize),
}

/// Presentation seam. Implementations only reflect the view they are
/// given and report pointer input; they never touch selection state.
pub trait OverlaySurface: Send {
    fn show(&mut self, view: &PanelView);
    fn update(&mut self, view: &PanelView);
    fn hide(&mut self);
}

/// Headless surface that only logs what it would draw.
#[derive(Debug, Default)]
pub struct LoggingSurface;

impl OverlaySurface for LoggingSurface {
    fn show(&mut self, view: &PanelView) {
        let frame = view.layout.frame;
        debug!(
            entries = view.entries.len(),
            selected = ?view.selected,
            x = frame.x,
            y = frame.y,
            width = frame.width,
            height = frame.height,
            "panel shown"
        );
    }

    fn update(&mut self, view: &PanelView) {
        let label = view
            .selected
            .and_then(|i| view.entries.get(i))
            .map(|e| e.label.as_str());
        trace!(selected = ?view.selected, label, "panel updated");
    }

    fn hide(&mut self) {
        debug!("panel hidden");
    }
}
