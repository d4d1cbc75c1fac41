//! Correlates window-list entries with accessibility elements.
//!
//! The window list and the accessibility tree name windows differently and
//! only some platforms expose a shared id, so matching walks a priority
//! chain: shared id, unique exact title, bounds within a small tolerance,
//! and finally elimination when the process has exactly one window on both
//! sides.

use crate::platform::{AxWindow, RawWindow};
use tracing::debug;

/// Rounding slack between the two APIs' geometry, in points.
pub(crate) const BOUNDS_TOLERANCE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    Direct(usize),
    Title(usize),
    Bounds(usize),
    Elimination(usize),
    Unresolved,
}

impl Resolution {
    pub(crate) fn index(self) -> Option<usize> {
        match self {
            Self::Direct(ix) | Self::Title(ix) | Self::Bounds(ix) | Self::Elimination(ix) => {
                Some(ix)
            }
            Self::Unresolved => None,
        }
    }

    fn method(self) -> &'static str {
        match self {
            Self::Direct(_) => "direct_id",
            Self::Title(_) => "title",
            Self::Bounds(_) => "bounds",
            Self::Elimination(_) => "elimination",
            Self::Unresolved => "unresolved",
        }
    }
}

/// `raw_windows_for_pid` is how many window-list entries the owning process
/// contributed.
pub(crate) fn resolve(raw: &RawWindow, raw_windows_for_pid: usize, ax: &[AxWindow]) -> Resolution {
    let resolution = resolve_inner(raw, raw_windows_for_pid, ax);
    debug!(
        pid = raw.pid,
        window = raw.id,
        method = resolution.method(),
        "resolved window identity"
    );
    resolution
}

fn resolve_inner(raw: &RawWindow, raw_windows_for_pid: usize, ax: &[AxWindow]) -> Resolution {
    if let Some(ix) = ax.iter().position(|w| w.id == Some(raw.id)) {
        return Resolution::Direct(ix);
    }

    if !raw.title.is_empty() {
        if let Some(ix) = unique(ax, |w| w.title.as_deref() == Some(raw.title.as_str())) {
            return Resolution::Title(ix);
        }
    }

    if let Some(ix) = unique(ax, |w| {
        w.bounds
            .is_some_and(|b| b.approx_eq(&raw.bounds, BOUNDS_TOLERANCE))
    }) {
        return Resolution::Bounds(ix);
    }

    if raw_windows_for_pid == 1 && ax.len() == 1 {
        return Resolution::Elimination(0);
    }

    Resolution::Unresolved
}

fn unique(ax: &[AxWindow], pred: impl Fn(&AxWindow) -> bool) -> Option<usize> {
    let mut found = None;
    for (ix, w) in ax.iter().enumerate() {
        if pred(w) {
            if found.is_some() {
                return None;
            }
            found = Some(ix);
        }
    }
    found
}
