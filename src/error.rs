use crate::platform::{ProcessId, WindowId};

/// Failures at the OS boundary. Nothing in the core propagates these past
/// its own seam; they are logged and mapped to a fallback.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} permission not granted")]
    PermissionDenied(&'static str),

    #[error("process {pid} or window {window:?} no longer exists")]
    StaleReference {
        pid: ProcessId,
        window: Option<WindowId>,
    },

    #[error("could not resolve accessibility element for window {0}")]
    AmbiguousWindowMatch(WindowId),

    #[error("input tap disabled: {0}")]
    TapDisabled(&'static str),

    #[error("capture of window {window} failed: {reason}")]
    CaptureFailure { window: WindowId, reason: String },

    #[error("operation not supported on this platform")]
    Unsupported,

    #[error("os error: {0}")]
    Os(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn stale(pid: ProcessId, window: impl Into<Option<WindowId>>) -> Self {
        Self::StaleReference {
            pid,
            window: window.into(),
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleReference { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
