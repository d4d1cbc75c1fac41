use super::{AppEvent, Switcher, Workers};
use crate::config::ConfigHandle;
use crate::error::Result;
use crate::input::keys::ShortcutSlot;
use crate::input::listener::InputListener;
use crate::input::monitor::ModifierMonitor;
use crate::input::tap::{TapEnv, TapHandler};
use crate::platform::{self, InputGuard, NativePlatform};
use crate::window_source::previews::PreviewWorker;
use crate::window_source::{self, WindowSource};
use crossbeam_channel::RecvTimeoutError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const PERMISSION_RECHECK_INTERVAL: Duration = Duration::from_secs(2);

/// Installs the tap and the release monitor once the OS allows it.
struct InputGate {
    handler: TapHandler,
    guard: Option<InputGuard>,
    stop: Arc<AtomicBool>,
    next_check: Option<Instant>,
    reported: Vec<&'static str>,
}

impl InputGate {
    fn new(handler: TapHandler) -> Self {
        Self {
            handler,
            guard: None,
            stop: Arc::new(AtomicBool::new(false)),
            next_check: Some(Instant::now()),
            reported: Vec::new(),
        }
    }

    fn poll(&mut self, now: Instant) {
        let Some(at) = self.next_check else {
            return;
        };
        if at > now {
            return;
        }
        let missing = platform::missing_permissions();
        if !missing.is_empty() {
            if missing != self.reported {
                warn!(?missing, "permissions missing, switcher stays inactive");
                self.reported = missing;
            }
            self.next_check = Some(now + PERMISSION_RECHECK_INTERVAL);
            return;
        }
        match platform::install_input_tap(self.handler.clone()) {
            Ok(guard) => {
                self.guard = Some(guard);
                self.next_check = None;
                ModifierMonitor::new(self.handler.clone(), platform::current_modifiers)
                    .spawn(self.stop.clone());
                info!("input tap installed");
            }
            Err(e) => {
                warn!(error = %e, "input tap installation failed, retrying");
                self.next_check = Some(now + PERMISSION_RECHECK_INTERVAL);
            }
        }
    }
}

impl Drop for InputGate {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.guard.take();
    }
}

/// Runs the switcher until the platform reports shutdown.
pub fn run(platform: NativePlatform, config: ConfigHandle, rebind: Option<ShortcutSlot>) -> Result<()> {
    let platform = Arc::new(platform);
    let (tx, rx) = crossbeam_channel::unbounded::<AppEvent>();

    let source = Arc::new(WindowSource::new(platform.clone(), config.clone()));
    let workers = Workers {
        refresh: window_source::spawn_worker(source, tx.clone()),
        previews: PreviewWorker::spawn(platform.clone(), tx.clone()),
    };

    let listener = Arc::new(Mutex::new(InputListener::new(config.clone())));
    if let Some(slot) = rebind {
        info!(?slot, "press the new shortcut");
        listener.lock().begin_capture(slot);
    }

    let surface = platform::overlay_surface(tx.clone());
    let mut switcher = Switcher::new(
        platform.clone(),
        platform.clone(),
        config.clone(),
        surface,
        listener.clone(),
        workers,
    );
    let env = Arc::new(TapEnv {
        system: platform.clone(),
        panel_visible: switcher.visible_flag(),
    });
    let mut gate = InputGate::new(TapHandler::new(listener, env, tx, config));

    debug!("event loop started");
    loop {
        let now = Instant::now();
        gate.poll(now);
        switcher.tick(now);

        let deadline = match (switcher.next_deadline(), gate.next_check) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let received = match deadline {
            Some(at) => rx.recv_deadline(at),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(AppEvent::Shutdown) => break,
            Ok(event) => switcher.handle(event, Instant::now()),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!("shutting down");
    Ok(())
}
