use super::keys::{KeyEvent, Modifiers, ShortcutSlot, TapVerdict};
use super::listener::{InputListener, ListenerEnv, ListenerState};
use crate::app::AppEvent;
use crate::config::ConfigHandle;
use crate::platform::WindowSystem;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Environment probes for the listener, shared with the core.
pub struct TapEnv<W: WindowSystem> {
    pub system: Arc<W>,
    pub panel_visible: Arc<AtomicBool>,
}

impl<W: WindowSystem> ListenerEnv for TapEnv<W> {
    fn native_switcher_active(&self) -> bool {
        self.system.native_switcher_active()
    }

    fn panel_visible(&self) -> bool {
        self.panel_visible.load(Ordering::Relaxed)
    }
}

/// The single object a platform hook calls into. Classification happens
/// under one lock and returns at once; resulting work is queued to the
/// core.
#[derive(Clone)]
pub struct TapHandler {
    listener: Arc<Mutex<InputListener>>,
    env: Arc<dyn ListenerEnv + Send + Sync>,
    events: Sender<AppEvent>,
    config: ConfigHandle,
}

impl TapHandler {
    pub fn new(
        listener: Arc<Mutex<InputListener>>,
        env: Arc<dyn ListenerEnv + Send + Sync>,
        events: Sender<AppEvent>,
        config: ConfigHandle,
    ) -> Self {
        Self {
            listener,
            env,
            events,
            config,
        }
    }

    pub fn key_down(&self, ev: KeyEvent) -> TapVerdict {
        let reaction = self.listener.lock().on_key_down(&ev, self.env.as_ref());
        if !reaction.commands.is_empty() {
            self.send(AppEvent::Input(reaction.commands));
        }
        reaction.verdict
    }

    pub fn flags_changed(&self, mods: Modifiers) {
        let commands = self.listener.lock().on_flags_changed(mods);
        if !commands.is_empty() {
            self.send(AppEvent::Input(commands));
        }
    }

    pub fn begin_capture(&self, slot: ShortcutSlot) {
        self.listener.lock().begin_capture(slot);
    }

    /// Armed or capturing: the release monitor polls faster.
    pub fn is_engaged(&self) -> bool {
        self.listener.lock().is_engaged()
    }

    pub fn state(&self) -> ListenerState {
        self.listener.lock().state()
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn tap_disabled(&self, reason: &'static str) {
        warn!(reason, "input tap disabled by the OS, re-enabling");
    }

    fn send(&self, event: AppEvent) {
        if self.events.send(event).is_err() {
            warn!("core event loop is gone, dropping input");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SwitcherConfig;
    use crate::input::keys::codes;
    use crate::input::listener::Command;
    use crate::platform::fake::FakePlatform;

    fn handler() -> (TapHandler, crossbeam_channel::Receiver<AppEvent>, Arc<FakePlatform>) {
        let config = ConfigHandle::new(SwitcherConfig::default());
        let fake = Arc::new(FakePlatform::new());
        let env = Arc::new(TapEnv {
            system: fake.clone(),
            panel_visible: Arc::new(AtomicBool::new(false)),
        });
        let (tx, rx) = crossbeam_channel::unbounded();
        let listener = Arc::new(Mutex::new(InputListener::new(config.clone())));
        (TapHandler::new(listener, env, tx, config), rx, fake)
    }

    #[test]
    fn trigger_is_queued_and_swallowed() {
        let (h, rx, _) = handler();
        assert_eq!(h.key_down(KeyEvent::new(codes::TAB, Modifiers::ALT)), TapVerdict::Swallow);
        match rx.try_recv().unwrap() {
            AppEvent::Input(cmds) => assert_eq!(cmds.first(), Some(&Command::Begin)),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(h.is_engaged());

        h.flags_changed(Modifiers::empty());
        match rx.try_recv().unwrap() {
            AppEvent::Input(cmds) => assert_eq!(cmds, vec![Command::Commit]),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(!h.is_engaged());
    }

    #[test]
    fn pass_through_sends_nothing() {
        let (h, rx, fake) = handler();
        assert_eq!(h.key_down(KeyEvent::new(codes::Q, Modifiers::empty())), TapVerdict::PassThrough);
        fake.native_switcher.store(true, Ordering::SeqCst);
        assert_eq!(h.key_down(KeyEvent::new(codes::TAB, Modifiers::ALT)), TapVerdict::PassThrough);
        assert!(rx.try_recv().is_err());
    }
}
