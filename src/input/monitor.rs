use super::keys::Modifiers;
use super::tap::TapHandler;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const ENGAGED_POLL_INTERVAL: Duration = Duration::from_millis(50);
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(150);

/// Coarse modifier watcher used for release detection. Runs beside the
/// key tap and shares its listener and configuration.
pub struct ModifierMonitor<F> {
    handler: TapHandler,
    poll: F,
    last: Option<Modifiers>,
}

impl<F> ModifierMonitor<F>
where
    F: Fn() -> Option<Modifiers> + Send + 'static,
{
    pub fn new(handler: TapHandler, poll: F) -> Self {
        Self {
            handler,
            poll,
            last: None,
        }
    }

    /// One poll. Forwards the mask when it changed while a session or a
    /// capture is live.
    pub fn step(&mut self) -> bool {
        if !self.handler.is_engaged() {
            self.last = None;
            return false;
        }
        let Some(mods) = (self.poll)() else {
            return true;
        };
        if self.last != Some(mods) {
            self.last = Some(mods);
            self.handler.flags_changed(mods);
        }
        true
    }

    pub fn spawn(mut self, stop: Arc<AtomicBool>) {
        let spawned = std::thread::Builder::new()
            .name("modifier-monitor".into())
            .spawn(move || {
                debug!("modifier monitor started");
                while !stop.load(Ordering::Relaxed) {
                    let interval = if self.step() {
                        ENGAGED_POLL_INTERVAL
                    } else {
                        IDLE_POLL_INTERVAL
                    };
                    std::thread::sleep(interval);
                }
                debug!("modifier monitor ended");
            });
        if let Err(e) = spawned {
            warn!(error = %e, "failed to spawn modifier monitor");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppEvent;
    use crate::config::{ConfigHandle, SwitcherConfig};
    use crate::input::keys::{codes, KeyEvent};
    use crate::input::listener::{Command, InputListener};
    use crate::input::tap::TapEnv;
    use crate::platform::fake::FakePlatform;
    use parking_lot::Mutex;

    #[test]
    fn polls_only_while_engaged_and_reports_release() {
        let config = ConfigHandle::new(SwitcherConfig::default());
        let env = Arc::new(TapEnv {
            system: Arc::new(FakePlatform::new()),
            panel_visible: Arc::new(AtomicBool::new(false)),
        });
        let (tx, rx) = crossbeam_channel::unbounded();
        let listener = Arc::new(Mutex::new(InputListener::new(config.clone())));
        let handler = TapHandler::new(listener, env, tx, config);

        let held = Arc::new(Mutex::new(Modifiers::ALT));
        let source = held.clone();
        let mut monitor = ModifierMonitor::new(handler.clone(), move || Some(*source.lock()));

        assert!(!monitor.step(), "idle listener is not polled");

        handler.key_down(KeyEvent::new(codes::TAB, Modifiers::ALT));
        let _ = rx.try_recv();
        assert!(monitor.step());
        assert!(rx.try_recv().is_err(), "modifier still held");

        *held.lock() = Modifiers::empty();
        assert!(monitor.step());
        match rx.try_recv().unwrap() {
            AppEvent::Input(cmds) => assert_eq!(cmds, vec![Command::Commit]),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(!monitor.step());
    }
}
