//! macOS backend: CoreGraphics window list, Accessibility elements,
//! NSRunningApplication for process control, ScreenCaptureKit thumbnails.

mod ax;
mod capture;
mod cg;
mod tap;

pub use tap::InputGuard;

use super::preview::fit_thumbnail;
use super::{
    AppRecord, AxWindow, ProcessControl, ProcessId, ProcessRef, RawWindow, Rect, RgbaImage,
    WindowId, WindowIdentity, WindowScope, WindowSystem, NORMAL_WINDOW_LAYER,
};
use crate::app::AppEvent;
use crate::config::ICON_SIZE_MAX;
use crate::error::{Error, Result};
use crate::input::keys::{codes, Modifiers};
use crate::input::tap::TapHandler;
use crate::overlay::surface::{LoggingSurface, OverlaySurface};
use ax::AxElement;
use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use crossbeam_channel::Sender;
use objc2::rc::{autoreleasepool, Retained};
use objc2_app_kit::{NSApplicationActivationOptions, NSApplicationActivationPolicy, NSRunningApplication};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, trace};

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn CGPreflightListenEventAccess() -> bool;
    fn CGPreflightScreenCaptureAccess() -> bool;
}

fn running_app(pid: ProcessId) -> Option<Retained<NSRunningApplication>> {
    NSRunningApplication::runningApplicationWithProcessIdentifier(pid)
}

fn app_record(pid: ProcessId, app: &NSRunningApplication) -> AppRecord {
    let (name, bundle_id, executable) = unsafe {
        (
            app.localizedName().map(|s| s.to_string()),
            app.bundleIdentifier().map(|s| s.to_string()),
            app.executableURL()
                .and_then(|url| url.path())
                .map(|p| PathBuf::from(p.to_string())),
        )
    };
    AppRecord {
        process: ProcessRef {
            pid,
            executable,
            bundle_id,
        },
        name: name.unwrap_or_else(|| format!("pid {pid}")),
        regular: app.activationPolicy() == NSApplicationActivationPolicy::Regular,
    }
}

pub struct NativePlatform {
    own_pid: ProcessId,
}

impl NativePlatform {
    pub fn connect() -> Result<Self> {
        if !unsafe { CGPreflightScreenCaptureAccess() } {
            info!("screen recording not granted: titles and previews may be missing");
        }
        Ok(Self {
            own_pid: std::process::id() as ProcessId,
        })
    }

    fn activate(&self, process: &ProcessRef, options: NSApplicationActivationOptions) -> Result<()> {
        autoreleasepool(|_| {
            let app = running_app(process.pid).ok_or_else(|| Error::stale(process.pid, None))?;
            if app.isTerminated() {
                return Err(Error::stale(process.pid, None));
            }
            #[allow(deprecated)]
            let ok = app.activateWithOptions(options);
            if ok {
                Ok(())
            } else {
                Err(Error::Os(format!("activation of pid {} refused", process.pid)))
            }
        })
    }
}

impl WindowSystem for NativePlatform {
    fn running_apps(&self) -> Result<Vec<AppRecord>> {
        let mut seen = HashSet::new();
        let apps = autoreleasepool(|_| {
            cg::window_list(false)
                .into_iter()
                .filter(|w| seen.insert(w.pid))
                .filter_map(|w| running_app(w.pid).map(|app| app_record(w.pid, &app)))
                .collect()
        });
        Ok(apps)
    }

    fn window_list(&self, scope: WindowScope) -> Result<Vec<RawWindow>> {
        let on_screen = scope == WindowScope::OnScreen;
        Ok(cg::window_list(on_screen)
            .into_iter()
            .map(|w| RawWindow {
                pid: w.pid,
                id: w.id,
                title: w.title,
                layer: w.layer,
                bounds: w.bounds,
            })
            .collect())
    }

    fn ax_windows(&self, pid: ProcessId) -> Result<Option<Vec<AxWindow>>> {
        let Some(app) = AxElement::application(pid) else {
            return Ok(None);
        };
        Ok(app
            .windows()?
            .map(|windows| windows.iter().map(AxElement::describe).collect()))
    }

    fn frontmost_pid(&self) -> Option<ProcessId> {
        cg::window_list(true)
            .into_iter()
            .find(|w| w.layer == NORMAL_WINDOW_LAYER && w.pid != self.own_pid)
            .map(|w| w.pid)
    }

    fn native_switcher_active(&self) -> bool {
        cg::native_switcher_visible(&cg::window_list(true))
    }

    fn app_icon(&self, process: &ProcessRef) -> Option<RgbaImage> {
        let tiff = autoreleasepool(|_| {
            let icon = unsafe { running_app(process.pid)?.icon() }?;
            let data = unsafe { icon.TIFFRepresentation() }?;
            Some(data.to_vec())
        })?;
        let decoded = image::load_from_memory_with_format(&tiff, image::ImageFormat::Tiff)
            .map_err(|e| trace!(pid = process.pid, error = %e, "icon decode failed"))
            .ok()?;
        fit_thumbnail(&decoded.to_rgba8(), ICON_SIZE_MAX, ICON_SIZE_MAX)
    }

    fn capture_window(&self, id: WindowId, max_w: u32, max_h: u32) -> Result<RgbaImage> {
        capture::capture(id, max_w, max_h)
    }

    fn monitors(&self) -> Vec<Rect> {
        cg::displays()
    }

    fn cursor_position(&self) -> Option<(f64, f64)> {
        cg::cursor()
    }
}

impl ProcessControl for NativePlatform {
    fn activate_process(&self, process: &ProcessRef) -> Result<()> {
        self.activate(process, NSApplicationActivationOptions::ActivateIgnoringOtherApps)
    }

    fn raise_window(&self, identity: &WindowIdentity) -> Result<()> {
        ax::window_element(identity.pid, identity.window)?.raise()
    }

    fn raise_all_windows(&self, process: &ProcessRef) -> Result<()> {
        #[allow(deprecated)]
        let options = NSApplicationActivationOptions::ActivateAllWindows
            | NSApplicationActivationOptions::ActivateIgnoringOtherApps;
        self.activate(process, options)
    }

    fn terminate_process(&self, process: &ProcessRef) -> Result<()> {
        autoreleasepool(|_| {
            let app = running_app(process.pid).ok_or_else(|| Error::stale(process.pid, None))?;
            if app.terminate() {
                Ok(())
            } else {
                Err(Error::Os(format!("pid {} refused to terminate", process.pid)))
            }
        })
    }

    fn close_window(&self, identity: &WindowIdentity) -> Result<()> {
        ax::window_element(identity.pid, identity.window)?.close()
    }

    fn launch_new_instance(&self, _process: &ProcessRef) -> Result<()> {
        Err(Error::Unsupported)
    }

    /// Posts Cmd+N; the caller has already activated the app.
    fn send_new_window_shortcut(&self, process: &ProcessRef) -> Result<()> {
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| Error::Os("event source unavailable".into()))?;
        for down in [true, false] {
            let event = CGEvent::new_keyboard_event(source.clone(), codes::N as u16, down)
                .map_err(|_| Error::Os("keyboard event unavailable".into()))?;
            event.set_flags(CGEventFlags::CGEventFlagCommand);
            event.post(CGEventTapLocation::HID);
        }
        debug!(pid = process.pid, "posted new window shortcut");
        Ok(())
    }
}

pub fn missing_permissions() -> Vec<&'static str> {
    let mut missing = Vec::new();
    if !ax::trusted() {
        missing.push("Accessibility");
    }
    if !unsafe { CGPreflightListenEventAccess() } {
        missing.push("Input Monitoring");
    }
    missing
}

pub fn install_input_tap(handler: TapHandler) -> Result<InputGuard> {
    tap::install(handler)
}

pub fn current_modifiers() -> Option<Modifiers> {
    Some(cg::modifiers_from_flags(cg::event_flags()))
}

/// The panel is drawn by the host UI on macOS; the core only logs frames.
pub fn overlay_surface(_events: Sender<AppEvent>) -> Box<dyn OverlaySurface> {
    Box::new(LoggingSurface)
}
