use crate::platform::{ProcessId, ProcessRef, Rect, RgbaImage, WindowIdentity};
use std::sync::Arc;

/// How much of a window's accessibility metadata could be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fidelity {
    Resolved,
    /// Kept without minimized/role filtering.
    Unresolved,
}

/// The unit of selection.
#[derive(Debug, Clone)]
pub struct CandidateWindow {
    pub identity: WindowIdentity,
    pub owner_name: String,
    pub owner: ProcessRef,
    pub title: String,
    pub icon: Option<Arc<RgbaImage>>,
    pub preview: Option<Arc<RgbaImage>>,
    pub bounds_hint: Rect,
    pub minimized: bool,
    pub fidelity: Fidelity,
}

impl CandidateWindow {
    pub fn pid(&self) -> ProcessId {
        self.identity.pid
    }

    /// Title to show; falls back to the owner's name for untitled windows.
    pub fn label(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.owner_name
        } else {
            &self.title
        }
    }

    /// Preview when one has been captured, else the application icon.
    pub fn thumbnail(&self) -> Option<&Arc<RgbaImage>> {
        self.preview.as_ref().or(self.icon.as_ref())
    }
}

/// One enumeration snapshot. Replaced wholesale, never patched except for
/// optimistic removals and late previews of the same epoch.
#[derive(Debug, Clone, Default)]
pub struct CandidateList {
    pub epoch: u64,
    pub windows: Vec<CandidateWindow>,
}

impl CandidateList {
    pub fn new(epoch: u64, windows: Vec<CandidateWindow>) -> Self {
        Self { epoch, windows }
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn position(&self, identity: &WindowIdentity) -> Option<usize> {
        self.windows.iter().position(|w| &w.identity == identity)
    }

    pub fn get(&self, index: usize) -> Option<&CandidateWindow> {
        self.windows.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CandidateWindow> {
        self.windows.iter()
    }
}
