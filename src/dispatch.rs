use crate::candidate::CandidateWindow;
use crate::config::ConfigHandle;
use crate::error::{Error, Result};
use crate::platform::ProcessControl;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Applied,
    /// The process or window was already gone.
    Stale,
    Failed,
}

/// Performs OS actions against a selected candidate. Errors are logged
/// and folded into an [`Outcome`]; nothing is rolled back.
pub(crate) struct ActionDispatcher<P: ProcessControl> {
    control: Arc<P>,
    config: ConfigHandle,
}

impl<P: ProcessControl> ActionDispatcher<P> {
    pub(crate) fn new(control: Arc<P>, config: ConfigHandle) -> Self {
        Self { control, config }
    }

    /// Brings the owning process forward and raises the chosen window.
    pub(crate) fn activate(&self, target: &CandidateWindow) -> Outcome {
        let all = self.config.read(|c| c.activate_all_windows);
        let result = self
            .control
            .activate_process(&target.owner)
            .and_then(|()| {
                if all {
                    self.control.raise_all_windows(&target.owner)?;
                }
                self.control.raise_window(&target.identity)
            });
        fold("activate", target, result)
    }

    /// Raises the window without a full commit, for live switching.
    pub(crate) fn raise(&self, target: &CandidateWindow) -> Outcome {
        let result = self.control.raise_window(&target.identity);
        fold("raise", target, result)
    }

    pub(crate) fn quit(&self, target: &CandidateWindow) -> Outcome {
        info!(pid = target.pid(), app = %target.owner_name, "quitting application");
        fold("quit", target, self.control.terminate_process(&target.owner))
    }

    pub(crate) fn close_window(&self, target: &CandidateWindow) -> Outcome {
        fold("close_window", target, self.control.close_window(&target.identity))
    }

    /// Asks for a new window. Without a platform API for it, activates the
    /// app and synthesizes its "new window" shortcut, which is best effort.
    pub(crate) fn new_window_instance(&self, target: &CandidateWindow) -> Outcome {
        let result = match self.control.launch_new_instance(&target.owner) {
            Err(Error::Unsupported) => {
                debug!(pid = target.pid(), "no new-instance api, sending shortcut");
                self.control
                    .activate_process(&target.owner)
                    .and_then(|()| self.control.send_new_window_shortcut(&target.owner))
            }
            other => other,
        };
        fold("new_window", target, result)
    }
}

fn fold(op: &'static str, target: &CandidateWindow, result: Result<()>) -> Outcome {
    match result {
        Ok(()) => Outcome::Applied,
        Err(e) if e.is_stale() => {
            debug!(op, pid = target.pid(), window = target.identity.window, "stale reference");
            Outcome::Stale
        }
        Err(e) => {
            warn!(op, pid = target.pid(), window = target.identity.window, error = %e, "action failed");
            Outcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::test_support::window;
    use crate::config::SwitcherConfig;
    use crate::platform::fake::{Call, FakePlatform};
    use crate::platform::WindowIdentity;
    use std::sync::atomic::Ordering;

    fn dispatcher(config: SwitcherConfig) -> (Arc<FakePlatform>, ActionDispatcher<FakePlatform>) {
        let fake = Arc::new(FakePlatform::new());
        (fake.clone(), ActionDispatcher::new(fake, ConfigHandle::new(config)))
    }

    #[test]
    fn activate_raises_the_specific_window() {
        let cases = [
            (false, vec![Call::Activate(3), Call::Raise(WindowIdentity::new(3, 31))]),
            (
                true,
                vec![
                    Call::Activate(3),
                    Call::RaiseAll(3),
                    Call::Raise(WindowIdentity::new(3, 31)),
                ],
            ),
        ];
        for (all, expected) in cases {
            let (fake, d) = dispatcher(SwitcherConfig {
                activate_all_windows: all,
                ..Default::default()
            });
            assert_eq!(d.activate(&window(3, 31, "doc")), Outcome::Applied);
            assert_eq!(fake.calls(), expected, "activate_all_windows: {all}");
        }
    }

    #[test]
    fn gone_process_is_stale_not_fatal() {
        let (fake, d) = dispatcher(SwitcherConfig::default());
        fake.dead.lock().insert(3);
        let target = window(3, 31, "doc");
        let cases = [
            d.activate(&target),
            d.quit(&target),
            d.close_window(&target),
            d.raise(&target),
        ];
        for outcome in cases {
            assert_eq!(outcome, Outcome::Stale);
        }
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn new_window_falls_back_to_shortcut() {
        let (fake, d) = dispatcher(SwitcherConfig::default());
        let target = window(4, 40, "doc");
        assert_eq!(d.new_window_instance(&target), Outcome::Applied);
        assert_eq!(fake.calls(), vec![Call::Activate(4), Call::NewWindowShortcut(4)]);

        let (fake, d) = dispatcher(SwitcherConfig::default());
        fake.new_instance_supported.store(true, Ordering::SeqCst);
        assert_eq!(d.new_window_instance(&target), Outcome::Applied);
        assert_eq!(fake.calls(), vec![Call::Launch(4)]);
    }

    #[test]
    fn quit_and_close_target_owner_and_window() {
        let (fake, d) = dispatcher(SwitcherConfig::default());
        let target = window(5, 50, "doc");
        d.quit(&target);
        d.close_window(&target);
        assert_eq!(
            fake.calls(),
            vec![Call::Terminate(5), Call::Close(WindowIdentity::new(5, 50))]
        );
    }
}
