//! Overlay visibility: debounced show, hide and placement of the panel.

mod debounce;
pub mod layout;
pub mod placement;
pub mod surface;

use crate::platform::Rect;
use crate::selection::SelectionState;
use debounce::Debouncer;
use layout::PanelLayout;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use surface::{OverlaySurface, PanelEntry, PanelView};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ShowRequest {
    pub reverse: bool,
}

struct Shown {
    monitor: Rect,
    icon_size: u32,
    reverse: bool,
    layout: PanelLayout,
}

pub(crate) struct OverlayController {
    visible: Arc<AtomicBool>,
    pending: Debouncer<ShowRequest>,
    surface: Box<dyn OverlaySurface>,
    shown: Option<Shown>,
}

impl OverlayController {
    pub(crate) fn new(surface: Box<dyn OverlaySurface>) -> Self {
        Self {
            visible: Arc::new(AtomicBool::new(false)),
            pending: Debouncer::default(),
            surface,
            shown: None,
        }
    }

    /// Shared with the input tap, which reads it without locking the core.
    pub(crate) fn visible_flag(&self) -> Arc<AtomicBool> {
        self.visible.clone()
    }

    pub(crate) fn is_visible(&self) -> bool {
        self.shown.is_some()
    }

    pub(crate) fn schedule_show(&mut self, at: Instant, reverse: bool) {
        if self.pending.is_pending() {
            debug!(reverse, "rescheduling pending show");
        }
        self.pending.schedule(at, ShowRequest { reverse });
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.pending.deadline()
    }

    pub(crate) fn take_due(&mut self, now: Instant) -> Option<ShowRequest> {
        self.pending.take_due(now)
    }

    #[cfg(test)]
    pub(crate) fn layout(&self) -> Option<&PanelLayout> {
        self.shown.as_ref().map(|s| &s.layout)
    }

    pub(crate) fn show(
        &mut self,
        request: ShowRequest,
        selection: &SelectionState,
        icon_size: u32,
        monitor: Rect,
    ) {
        let layout = layout::panel_layout(selection.candidates().len(), icon_size, &monitor);
        let shown = Shown {
            monitor,
            icon_size,
            reverse: request.reverse,
            layout,
        };
        let view = view_of(&shown, selection);
        self.surface.show(&view);
        self.shown = Some(shown);
        self.visible.store(true, Ordering::Relaxed);
    }

    /// Re-renders after the list or the cursor changed. No-op while hidden.
    pub(crate) fn refresh(&mut self, selection: &SelectionState) {
        let Some(shown) = self.shown.as_mut() else {
            return;
        };
        let count = selection.candidates().len();
        if count != shown.layout.count {
            shown.layout = layout::panel_layout(count, shown.icon_size, &shown.monitor);
        }
        let view = view_of(shown, selection);
        self.surface.update(&view);
    }

    pub(crate) fn hide(&mut self) {
        self.pending.cancel();
        if self.shown.take().is_some() {
            self.surface.hide();
        }
        self.visible.store(false, Ordering::Relaxed);
    }
}

fn view_of(shown: &Shown, selection: &SelectionState) -> PanelView {
    let entries = selection
        .candidates()
        .iter()
        .map(|w| PanelEntry {
            label: w.label().to_string(),
            thumbnail: w.thumbnail().cloned(),
            minimized: w.minimized,
        })
        .collect();
    PanelView {
        layout: shown.layout,
        entries,
        selected: selection.selected_index(),
        reverse: shown.reverse,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::surface::{OverlaySurface, PanelView};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Frame {
        Show { selected: Option<usize>, count: usize, reverse: bool },
        Update { selected: Option<usize>, count: usize },
        Hide,
    }

    #[derive(Clone, Default)]
    pub(crate) struct RecordingSurface {
        pub frames: Arc<Mutex<Vec<Frame>>>,
    }

    impl RecordingSurface {
        pub(crate) fn frames(&self) -> Vec<Frame> {
            self.frames.lock().clone()
        }
    }

    impl OverlaySurface for RecordingSurface {
        fn show(&mut self, view: &PanelView) {
            self.frames.lock().push(Frame::Show {
                selected: view.selected,
                count: view.entries.len(),
                reverse: view.reverse,
            });
        }

        fn update(&mut self, view: &PanelView) {
            self.frames.lock().push(Frame::Update {
                selected: view.selected,
                count: view.entries.len(),
            });
        }

        fn hide(&mut self) {
            self.frames.lock().push(Frame::Hide);
        }
    }
}
