//! Inert backend: enumerates nothing and refuses every action, so the core
//! runs but never shows a panel.

use super::{
    AppRecord, AxWindow, ProcessControl, ProcessId, ProcessRef, RawWindow, Rect, RgbaImage,
    WindowId, WindowIdentity, WindowScope, WindowSystem,
};
use crate::app::AppEvent;
use crate::error::{Error, Result};
use crate::input::keys::Modifiers;
use crate::input::tap::TapHandler;
use crate::overlay::surface::{LoggingSurface, OverlaySurface};
use crossbeam_channel::Sender;
use tracing::warn;

pub struct InputGuard;

pub struct NativePlatform;

impl NativePlatform {
    pub fn connect() -> Result<Self> {
        warn!("no window system backend on Windows, switcher is inert");
        Ok(Self)
    }
}

impl WindowSystem for NativePlatform {
    fn running_apps(&self) -> Result<Vec<AppRecord>> {
        Ok(Vec::new())
    }

    fn window_list(&self, _scope: WindowScope) -> Result<Vec<RawWindow>> {
        Ok(Vec::new())
    }

    fn ax_windows(&self, _pid: ProcessId) -> Result<Option<Vec<AxWindow>>> {
        Ok(None)
    }

    fn frontmost_pid(&self) -> Option<ProcessId> {
        None
    }

    fn capture_window(&self, _id: WindowId, _max_w: u32, _max_h: u32) -> Result<RgbaImage> {
        Err(Error::Unsupported)
    }

    fn monitors(&self) -> Vec<Rect> {
        Vec::new()
    }

    fn cursor_position(&self) -> Option<(f64, f64)> {
        None
    }
}

impl ProcessControl for NativePlatform {
    fn activate_process(&self, _process: &ProcessRef) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn raise_window(&self, _identity: &WindowIdentity) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn raise_all_windows(&self, _process: &ProcessRef) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn terminate_process(&self, _process: &ProcessRef) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn close_window(&self, _identity: &WindowIdentity) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn launch_new_instance(&self, _process: &ProcessRef) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn send_new_window_shortcut(&self, _process: &ProcessRef) -> Result<()> {
        Err(Error::Unsupported)
    }
}

pub fn missing_permissions() -> Vec<&'static str> {
    Vec::new()
}

pub fn install_input_tap(_handler: TapHandler) -> Result<InputGuard> {
    Ok(InputGuard)
}

pub fn current_modifiers() -> Option<Modifiers> {
    None
}

pub fn overlay_surface(_events: Sender<AppEvent>) -> Box<dyn OverlaySurface> {
    Box::new(LoggingSurface)
}
