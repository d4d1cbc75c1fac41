use super::keys::{KeyCode, KeyEvent, Modifiers, ShortcutSlot, TapVerdict};
use crate::config::{ConfigHandle, ShortcutConfig};
use tracing::{debug, info, trace};

/// Secondary actions available while the panel is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    CloseWindow,
    NewWindow,
}

/// Work handed to the core, applied in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// A new session: forget the previous cursor.
    Begin,
    Refresh,
    Cycle { reverse: bool, repeat: bool },
    ScheduleShow { reverse: bool },
    Commit,
    Cancel,
    Dispatch(Action),
    Rebound(ShortcutSlot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    Idle,
    Armed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Armed,
    Capturing { slot: ShortcutSlot, resume: Resume },
}

/// What the listener cannot observe on its own.
pub trait ListenerEnv {
    fn native_switcher_active(&self) -> bool;
    fn panel_visible(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub verdict: TapVerdict,
    pub commands: Vec<Command>,
}

impl Reaction {
    fn pass() -> Self {
        Self {
            verdict: TapVerdict::PassThrough,
            commands: Vec::new(),
        }
    }

    fn swallow(commands: Vec<Command>) -> Self {
        Self {
            verdict: TapVerdict::Swallow,
            commands,
        }
    }
}

/// Classifies key and modifier events against the configured shortcut
/// grammar. Reads configuration at every decision.
pub struct InputListener {
    config: ConfigHandle,
    state: ListenerState,
}

impl InputListener {
    pub fn new(config: ConfigHandle) -> Self {
        Self {
            config,
            state: ListenerState::Idle,
        }
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn is_engaged(&self) -> bool {
        !matches!(self.state, ListenerState::Idle)
    }

    /// Ends a session the core closed on its own (click to commit).
    pub fn reset(&mut self) {
        if self.state == ListenerState::Armed {
            self.state = ListenerState::Idle;
        }
    }

    pub fn begin_capture(&mut self, slot: ShortcutSlot) {
        let resume = match self.state {
            ListenerState::Armed => Resume::Armed,
            ListenerState::Idle => Resume::Idle,
            ListenerState::Capturing { resume, .. } => resume,
        };
        info!(?slot, "capturing next shortcut");
        self.state = ListenerState::Capturing { slot, resume };
    }

    pub fn on_key_down(&mut self, ev: &KeyEvent, env: &dyn ListenerEnv) -> Reaction {
        let shortcut = self.config.shortcut();
        trace!(code = ev.code, mods = ?ev.modifiers, repeat = ev.repeat, state = ?self.state, "key_down");
        match self.state {
            ListenerState::Idle => self.from_idle(ev, &shortcut, env),
            ListenerState::Armed => {
                if !shortcut.trigger_held(ev.modifiers) {
                    // The release went unobserved; commit before classifying.
                    debug!("implicit release");
                    self.state = ListenerState::Idle;
                    let mut reaction = self.from_idle(ev, &shortcut, env);
                    reaction.commands.insert(0, Command::Commit);
                    return reaction;
                }
                self.while_armed(ev, &shortcut, env)
            }
            ListenerState::Capturing { slot, resume } => {
                if ev.repeat {
                    return Reaction::swallow(Vec::new());
                }
                self.capture(slot, resume, Some(ev.code), ev.modifiers)
            }
        }
    }

    pub fn on_flags_changed(&mut self, mods: Modifiers) -> Vec<Command> {
        match self.state {
            ListenerState::Armed => {
                if self.config.shortcut().trigger_held(mods) {
                    return Vec::new();
                }
                debug!(mods = ?mods, "trigger modifier released");
                self.state = ListenerState::Idle;
                vec![Command::Commit]
            }
            ListenerState::Capturing { slot, resume } if slot.is_modifier_only() && !mods.is_empty() => {
                self.capture(slot, resume, None, mods).commands
            }
            _ => Vec::new(),
        }
    }

    fn from_idle(&mut self, ev: &KeyEvent, shortcut: &ShortcutConfig, env: &dyn ListenerEnv) -> Reaction {
        let Some(reverse) = shortcut.trigger_direction(ev.code, ev.modifiers) else {
            return Reaction::pass();
        };
        if env.native_switcher_active() {
            debug!("native switcher on screen, ignoring trigger");
            return Reaction::pass();
        }
        debug!(reverse, "armed");
        self.state = ListenerState::Armed;
        Reaction::swallow(vec![
            Command::Begin,
            Command::Refresh,
            Command::Cycle {
                reverse,
                repeat: false,
            },
            Command::ScheduleShow { reverse },
        ])
    }

    fn while_armed(&mut self, ev: &KeyEvent, shortcut: &ShortcutConfig, env: &dyn ListenerEnv) -> Reaction {
        if let Some(reverse) = shortcut.trigger_direction(ev.code, ev.modifiers) {
            let mut commands = vec![Command::Cycle {
                reverse,
                repeat: ev.repeat,
            }];
            if !env.panel_visible() {
                commands.push(Command::ScheduleShow { reverse });
            }
            return Reaction::swallow(commands);
        }
        if !env.panel_visible() {
            return Reaction::pass();
        }
        match secondary(shortcut, ev.code) {
            Some(Secondary::Cycle(reverse)) => Reaction::swallow(vec![Command::Cycle {
                reverse,
                repeat: ev.repeat,
            }]),
            Some(Secondary::Action(_)) if ev.repeat => Reaction::swallow(Vec::new()),
            Some(Secondary::Action(action)) => Reaction::swallow(vec![Command::Dispatch(action)]),
            Some(Secondary::Cancel) => {
                self.state = ListenerState::Idle;
                Reaction::swallow(vec![Command::Cancel])
            }
            None => Reaction::pass(),
        }
    }

    fn capture(
        &mut self,
        slot: ShortcutSlot,
        resume: Resume,
        code: Option<KeyCode>,
        mods: Modifiers,
    ) -> Reaction {
        let bound = self.config.update(|c| c.shortcut.bind(slot, code, mods));
        if !bound {
            // Not a usable chord for this slot; keep waiting.
            return Reaction::swallow(Vec::new());
        }
        info!(?slot, ?code, mods = ?mods, "shortcut rebound");
        self.state = match resume {
            Resume::Idle => ListenerState::Idle,
            Resume::Armed => ListenerState::Armed,
        };
        Reaction::swallow(vec![Command::Rebound(slot)])
    }
}

enum Secondary {
    Cycle(bool),
    Action(Action),
    Cancel,
}

fn secondary(shortcut: &ShortcutConfig, code: KeyCode) -> Option<Secondary> {
    if code == shortcut.quit_app_key {
        Some(Secondary::Action(Action::Quit))
    } else if code == shortcut.close_window_key {
        Some(Secondary::Action(Action::CloseWindow))
    } else if code == shortcut.new_window_key {
        Some(Secondary::Action(Action::NewWindow))
    } else if code == shortcut.next_key {
        Some(Secondary::Cycle(false))
    } else if code == shortcut.previous_key {
        Some(Secondary::Cycle(true))
    } else if code == shortcut.cancel_key {
        Some(Secondary::Cancel)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SwitcherConfig;
    use crate::input::keys::codes;
    use proptest::prelude::*;

    #[derive(Default)]
    struct Env {
        native: bool,
        visible: bool,
    }

    impl ListenerEnv for Env {
        fn native_switcher_active(&self) -> bool {
            self.native
        }
        fn panel_visible(&self) -> bool {
            self.visible
        }
    }

    const ALT: Modifiers = Modifiers::ALT;

    fn listener() -> (ConfigHandle, InputListener) {
        let config = ConfigHandle::new(SwitcherConfig::default());
        (config.clone(), InputListener::new(config))
    }

    fn armed(env: &Env) -> InputListener {
        let (_, mut l) = listener();
        l.on_key_down(&KeyEvent::new(codes::TAB, ALT), env);
        assert_eq!(l.state(), ListenerState::Armed);
        l
    }

    #[test]
    fn trigger_arms_and_schedules_show() {
        let cases = [
            (ALT, false),
            (ALT | Modifiers::SHIFT, true),
        ];
        for (mods, reverse) in cases {
            let (_, mut l) = listener();
            let r = l.on_key_down(&KeyEvent::new(codes::TAB, mods), &Env::default());
            assert_eq!(r.verdict, TapVerdict::Swallow, "mods: {mods:?}");
            assert_eq!(
                r.commands,
                vec![
                    Command::Begin,
                    Command::Refresh,
                    Command::Cycle {
                        reverse,
                        repeat: false
                    },
                    Command::ScheduleShow { reverse },
                ],
                "mods: {mods:?}"
            );
            assert_eq!(l.state(), ListenerState::Armed);
        }
    }

    #[test]
    fn native_switcher_blocks_arming() {
        let (_, mut l) = listener();
        let env = Env {
            native: true,
            ..Default::default()
        };
        let r = l.on_key_down(&KeyEvent::new(codes::TAB, ALT), &env);
        assert_eq!(r, Reaction::pass());
        assert_eq!(l.state(), ListenerState::Idle);
    }

    #[test]
    fn armed_cycles_without_debounce_once_visible() {
        let visible = Env {
            visible: true,
            ..Default::default()
        };
        let hidden = Env::default();
        let cases = [
            (&visible, KeyEvent::new(codes::TAB, ALT), vec![Command::Cycle { reverse: false, repeat: false }]),
            (
                &visible,
                KeyEvent::new(codes::TAB, ALT | Modifiers::SHIFT).repeated(),
                vec![Command::Cycle { reverse: true, repeat: true }],
            ),
            (
                &hidden,
                KeyEvent::new(codes::TAB, ALT),
                vec![
                    Command::Cycle { reverse: false, repeat: false },
                    Command::ScheduleShow { reverse: false },
                ],
            ),
        ];
        for (env, ev, expected) in cases {
            let mut l = armed(env);
            let r = l.on_key_down(&ev, env);
            assert_eq!(r.verdict, TapVerdict::Swallow, "ev: {ev:?}");
            assert_eq!(r.commands, expected, "ev: {ev:?}");
            assert_eq!(l.state(), ListenerState::Armed);
        }
    }

    #[test]
    fn secondary_keys_need_visible_panel() {
        let visible = Env {
            visible: true,
            ..Default::default()
        };
        let cases = [
            (codes::Q, Some(Command::Dispatch(Action::Quit))),
            (codes::W, Some(Command::Dispatch(Action::CloseWindow))),
            (codes::N, Some(Command::Dispatch(Action::NewWindow))),
            (codes::RIGHT, Some(Command::Cycle { reverse: false, repeat: false })),
            (codes::LEFT, Some(Command::Cycle { reverse: true, repeat: false })),
            (codes::ESCAPE, Some(Command::Cancel)),
        ];
        for (code, expected) in cases {
            let mut l = armed(&visible);
            let r = l.on_key_down(&KeyEvent::new(code, ALT), &visible);
            assert_eq!(r.verdict, TapVerdict::Swallow, "code: {code}");
            assert_eq!(r.commands, expected.into_iter().collect::<Vec<_>>(), "code: {code}");

            let hidden = Env::default();
            let mut l = armed(&hidden);
            let r = l.on_key_down(&KeyEvent::new(code, ALT), &hidden);
            assert_eq!(r, Reaction::pass(), "hidden, code: {code}");
        }
    }

    #[test]
    fn escape_ends_session() {
        let visible = Env {
            visible: true,
            ..Default::default()
        };
        let mut l = armed(&visible);
        l.on_key_down(&KeyEvent::new(codes::ESCAPE, ALT), &visible);
        assert_eq!(l.state(), ListenerState::Idle);
        assert!(l.on_flags_changed(Modifiers::empty()).is_empty());
    }

    #[test]
    fn repeated_secondary_action_is_swallowed_once() {
        let visible = Env {
            visible: true,
            ..Default::default()
        };
        let mut l = armed(&visible);
        let r = l.on_key_down(&KeyEvent::new(codes::Q, ALT).repeated(), &visible);
        assert_eq!(r, Reaction::swallow(Vec::new()));
    }

    #[test]
    fn release_commits() {
        let env = Env::default();
        let mut l = armed(&env);
        assert!(l.on_flags_changed(ALT | Modifiers::SHIFT).is_empty());
        assert_eq!(l.on_flags_changed(Modifiers::SHIFT), vec![Command::Commit]);
        assert_eq!(l.state(), ListenerState::Idle);
        assert!(l.on_flags_changed(Modifiers::empty()).is_empty());
    }

    #[test]
    fn keydown_without_modifier_is_implicit_release() {
        let env = Env::default();
        let mut l = armed(&env);
        let r = l.on_key_down(&KeyEvent::new(codes::Q, Modifiers::empty()), &env);
        assert_eq!(r.verdict, TapVerdict::PassThrough);
        assert_eq!(r.commands, vec![Command::Commit]);
        assert_eq!(l.state(), ListenerState::Idle);
    }

    #[test]
    fn release_detection_follows_live_config() {
        let env = Env::default();
        let (config, mut l) = listener();
        l.on_key_down(&KeyEvent::new(codes::TAB, ALT), &env);
        config.update(|c| c.shortcut.trigger_modifiers = Modifiers::CONTROL);
        assert_eq!(l.on_flags_changed(ALT), vec![Command::Commit]);
    }

    #[test]
    fn capture_records_next_key_and_resumes() {
        let env = Env::default();
        let cases = [(Resume::Idle, ListenerState::Idle), (Resume::Armed, ListenerState::Armed)];
        for (resume, expected) in cases {
            let (config, mut l) = listener();
            if resume == Resume::Armed {
                l.on_key_down(&KeyEvent::new(codes::TAB, ALT), &env);
            }
            l.begin_capture(ShortcutSlot::Trigger);
            assert_eq!(
                l.state(),
                ListenerState::Capturing {
                    slot: ShortcutSlot::Trigger,
                    resume
                }
            );
            let r = l.on_key_down(&KeyEvent::new(77, Modifiers::CONTROL | Modifiers::SUPER), &env);
            assert_eq!(r, Reaction::swallow(vec![Command::Rebound(ShortcutSlot::Trigger)]));
            assert_eq!(l.state(), expected, "resume: {resume:?}");
            let shortcut = config.shortcut();
            assert_eq!(shortcut.trigger_key, 77);
            assert_eq!(shortcut.trigger_modifiers, Modifiers::CONTROL | Modifiers::SUPER);
        }
    }

    #[test]
    fn capture_ignores_unusable_chords() {
        let env = Env::default();
        let (config, mut l) = listener();
        l.begin_capture(ShortcutSlot::Trigger);
        let r = l.on_key_down(&KeyEvent::new(5, Modifiers::empty()), &env);
        assert_eq!(r, Reaction::swallow(Vec::new()));
        assert!(matches!(l.state(), ListenerState::Capturing { .. }));
        assert_eq!(config.shortcut().trigger_key, codes::TAB);
    }

    #[test]
    fn capture_reverse_from_flags() {
        let (config, mut l) = listener();
        l.begin_capture(ShortcutSlot::Reverse);
        assert!(l.on_flags_changed(Modifiers::empty()).is_empty());
        assert_eq!(
            l.on_flags_changed(Modifiers::CONTROL),
            vec![Command::Rebound(ShortcutSlot::Reverse)]
        );
        assert_eq!(config.shortcut().reverse_modifiers, Modifiers::CONTROL);
        assert_eq!(l.state(), ListenerState::Idle);
    }

    #[test]
    fn reverse_capture_waits_past_the_trigger_modifier() {
        let (config, mut l) = listener();
        l.begin_capture(ShortcutSlot::Reverse);
        assert!(l.on_flags_changed(ALT).is_empty(), "trigger modifier alone");
        assert!(matches!(l.state(), ListenerState::Capturing { .. }));
        assert_eq!(
            l.on_flags_changed(ALT | Modifiers::SHIFT),
            vec![Command::Rebound(ShortcutSlot::Reverse)]
        );
        assert_eq!(config.shortcut().reverse_modifiers, Modifiers::SHIFT);
        assert_eq!(l.state(), ListenerState::Idle);
    }

    #[test]
    fn reset_only_leaves_armed() {
        let env = Env::default();
        let mut l = armed(&env);
        l.reset();
        assert_eq!(l.state(), ListenerState::Idle);
        l.begin_capture(ShortcutSlot::Quit);
        l.reset();
        assert!(matches!(l.state(), ListenerState::Capturing { .. }));
    }

    fn mods_strategy() -> impl Strategy<Value = Modifiers> {
        (0u8..16).prop_map(Modifiers::from_bits_truncate)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn non_trigger_events_pass_through_when_idle(code in 0u32..512, mods in mods_strategy(), repeat in any::<bool>()) {
            let shortcut = ShortcutConfig::default();
            prop_assume!(shortcut.trigger_direction(code, mods).is_none());
            let (_, mut l) = listener();
            let ev = KeyEvent { code, modifiers: mods, repeat };
            let r = l.on_key_down(&ev, &Env::default());
            prop_assert_eq!(r, Reaction::pass());
            prop_assert_eq!(l.state(), ListenerState::Idle);
        }

        #[test]
        fn non_grammar_events_pass_through_when_armed(code in 0u32..512, mods in mods_strategy()) {
            let shortcut = ShortcutConfig::default();
            prop_assume!(shortcut.trigger_direction(code, mods).is_none());
            prop_assume!(secondary(&shortcut, code).is_none());
            let visible = Env { visible: true, ..Default::default() };
            let mut l = armed(&visible);
            let r = l.on_key_down(&KeyEvent::new(code, mods), &visible);
            prop_assert_eq!(r.verdict, TapVerdict::PassThrough);
        }
    }
}
