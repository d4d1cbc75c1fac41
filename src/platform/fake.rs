//! Scripted platform for tests.

use super::*;
use crate::error::Error;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Activate(ProcessId),
    Raise(WindowIdentity),
    RaiseAll(ProcessId),
    Terminate(ProcessId),
    Close(WindowIdentity),
    Launch(ProcessId),
    NewWindowShortcut(ProcessId),
}

#[derive(Default)]
pub(crate) struct FakePlatform {
    pub apps: Mutex<Vec<AppRecord>>,
    pub windows: Mutex<Vec<RawWindow>>,
    pub ax: Mutex<HashMap<ProcessId, Option<Vec<AxWindow>>>>,
    pub frontmost: Mutex<Option<ProcessId>>,
    pub native_switcher: AtomicBool,
    pub window_list_fails: AtomicBool,
    pub failing_captures: Mutex<HashSet<WindowId>>,
    /// Processes that have exited; control calls against them are stale.
    pub dead: Mutex<HashSet<ProcessId>>,
    /// Processes that ignore termination requests.
    pub refuses_quit: Mutex<HashSet<ProcessId>>,
    pub new_instance_supported: AtomicBool,
    pub calls: Mutex<Vec<Call>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app(&self, pid: ProcessId, name: &str) -> &Self {
        self.apps.lock().push(AppRecord {
            process: ProcessRef {
                pid,
                executable: Some(PathBuf::from(format!("/usr/bin/{name}"))),
                bundle_id: None,
            },
            name: name.to_string(),
            regular: true,
        });
        self
    }

    pub fn background_app(&self, pid: ProcessId, name: &str) -> &Self {
        self.app(pid, name);
        if let Some(last) = self.apps.lock().last_mut() {
            last.regular = false;
        }
        self
    }

    pub fn window(&self, pid: ProcessId, id: WindowId, title: &str, bounds: Rect) -> &Self {
        self.windows.lock().push(RawWindow {
            pid,
            id,
            title: title.to_string(),
            layer: NORMAL_WINDOW_LAYER,
            bounds,
        });
        self
    }

    pub fn window_on_layer(&self, pid: ProcessId, id: WindowId, layer: i32) -> &Self {
        self.windows.lock().push(RawWindow {
            pid,
            id,
            title: format!("layer{layer}"),
            layer,
            bounds: Rect::new(0.0, 0.0, 400.0, 300.0),
        });
        self
    }

    pub fn ax_for(&self, pid: ProcessId, windows: Option<Vec<AxWindow>>) -> &Self {
        self.ax.lock().insert(pid, windows);
        self
    }

    pub fn set_frontmost(&self, pid: Option<ProcessId>) -> &Self {
        *self.frontmost.lock() = pid;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn check_alive(&self, pid: ProcessId, window: Option<WindowId>) -> Result<()> {
        if self.dead.lock().contains(&pid) {
            return Err(Error::stale(pid, window));
        }
        Ok(())
    }
}

impl WindowSystem for FakePlatform {
    fn running_apps(&self) -> Result<Vec<AppRecord>> {
        Ok(self.apps.lock().clone())
    }

    fn window_list(&self, _scope: WindowScope) -> Result<Vec<RawWindow>> {
        if self.window_list_fails.load(Ordering::SeqCst) {
            return Err(Error::PermissionDenied("Screen Recording"));
        }
        Ok(self.windows.lock().clone())
    }

    fn ax_windows(&self, pid: ProcessId) -> Result<Option<Vec<AxWindow>>> {
        Ok(self.ax.lock().get(&pid).cloned().unwrap_or(None))
    }

    fn frontmost_pid(&self) -> Option<ProcessId> {
        *self.frontmost.lock()
    }

    fn native_switcher_active(&self) -> bool {
        self.native_switcher.load(Ordering::SeqCst)
    }

    fn app_icon(&self, _process: &ProcessRef) -> Option<RgbaImage> {
        Some(RgbaImage::new(2, 2))
    }

    fn capture_window(&self, id: WindowId, max_w: u32, max_h: u32) -> Result<RgbaImage> {
        if self.failing_captures.lock().contains(&id) {
            return Err(Error::CaptureFailure {
                window: id,
                reason: "scripted".into(),
            });
        }
        Ok(RgbaImage::new(max_w.min(4), max_h.min(3)))
    }

    fn monitors(&self) -> Vec<Rect> {
        vec![
            Rect::new(0.0, 0.0, 1920.0, 1080.0),
            Rect::new(1920.0, 0.0, 2560.0, 1440.0),
        ]
    }

    fn cursor_position(&self) -> Option<(f64, f64)> {
        Some((100.0, 100.0))
    }
}

impl ProcessControl for FakePlatform {
    fn activate_process(&self, process: &ProcessRef) -> Result<()> {
        self.check_alive(process.pid, None)?;
        self.record(Call::Activate(process.pid));
        Ok(())
    }

    fn raise_window(&self, identity: &WindowIdentity) -> Result<()> {
        self.check_alive(identity.pid, Some(identity.window))?;
        self.record(Call::Raise(*identity));
        Ok(())
    }

    fn raise_all_windows(&self, process: &ProcessRef) -> Result<()> {
        self.check_alive(process.pid, None)?;
        self.record(Call::RaiseAll(process.pid));
        Ok(())
    }

    fn terminate_process(&self, process: &ProcessRef) -> Result<()> {
        self.check_alive(process.pid, None)?;
        self.record(Call::Terminate(process.pid));
        if !self.refuses_quit.lock().contains(&process.pid) {
            self.windows.lock().retain(|w| w.pid != process.pid);
            self.apps.lock().retain(|a| a.process.pid != process.pid);
        }
        Ok(())
    }

    fn close_window(&self, identity: &WindowIdentity) -> Result<()> {
        self.check_alive(identity.pid, Some(identity.window))?;
        self.record(Call::Close(*identity));
        self.windows.lock().retain(|w| w.id != identity.window);
        Ok(())
    }

    fn launch_new_instance(&self, process: &ProcessRef) -> Result<()> {
        if !self.new_instance_supported.load(Ordering::SeqCst) {
            return Err(Error::Unsupported);
        }
        self.record(Call::Launch(process.pid));
        Ok(())
    }

    fn send_new_window_shortcut(&self, process: &ProcessRef) -> Result<()> {
        self.record(Call::NewWindowShortcut(process.pid));
        Ok(())
    }
}
