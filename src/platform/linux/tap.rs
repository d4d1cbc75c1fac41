//! Key capture through X11 grabs. The trigger chords are grabbed passively
//! on the root window; while a session is live the secondary keys are
//! grabbed the same way under the held chords. Passive grabs freeze the
//! keyboard on press, and the listener's verdict either consumes the key
//! or replays it to the focused client.
//!
//! Only a rebind grabs the whole keyboard, since capture consumes every key.
//! Modifier releases during a session come from the release monitor.

use super::{modifiers_from_mask, os_err};
use crate::error::{Error, Result};
use crate::config::ShortcutConfig;
use crate::input::keys::{codes, KeyCode, KeyEvent, Modifiers, TapVerdict};
use crate::input::listener::ListenerState;
use crate::input::tap::TapHandler;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    Allow, ConnectionExt as _, Grab, GrabMode, GrabStatus, Keycode, ModMask, Window,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

const IDLE_POLL: Duration = Duration::from_millis(8);

/// Lock combinations every grab is repeated under: none, CapsLock,
/// NumLock, both.
const LOCK_VARIANTS: [u16; 4] = [0, 1 << 1, 1 << 4, (1 << 1) | (1 << 4)];

pub struct InputGuard {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for InputGuard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

pub(super) fn install(handler: TapHandler) -> Result<InputGuard> {
    let (conn, screen) = x11rb::connect(None).map_err(os_err)?;
    let root = conn
        .setup()
        .roots
        .get(screen)
        .map(|s| s.root)
        .ok_or_else(|| Error::Os(format!("no X11 screen {screen}")))?;
    let modifier_keys = ModifierKeys::load(&conn)?;
    let mut grabber = KeyGrabber {
        conn,
        root,
        handler,
        modifier_keys,
        repeat: RepeatDetector::default(),
        generation: None,
        session_grabbed: false,
        keyboard_grabbed: false,
        grab_refused: false,
    };
    grabber.grab_triggers()?;

    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = stop.clone();
    let thread = std::thread::Builder::new()
        .name("x11-key-grab".into())
        .spawn(move || grabber.run(&thread_stop))?;
    Ok(InputGuard {
        stop,
        thread: Some(thread),
    })
}

/// Maps keycodes to the modifier they produce.
#[derive(Debug, Default)]
struct ModifierKeys {
    keys: Vec<(Keycode, Modifiers)>,
}

impl ModifierKeys {
    fn load(conn: &RustConnection) -> Result<Self> {
        let reply = conn
            .get_modifier_mapping()
            .map_err(os_err)?
            .reply()
            .map_err(os_err)?;
        Ok(Self::from_mapping(&reply.keycodes))
    }

    /// `keycodes` holds eight rows, one per modifier index
    /// (Shift, Lock, Control, Mod1..Mod5).
    fn from_mapping(keycodes: &[Keycode]) -> Self {
        let per_row = keycodes.len() / 8;
        if per_row == 0 {
            return Self::default();
        }
        let rows = [
            (0, Modifiers::SHIFT),
            (2, Modifiers::CONTROL),
            (3, Modifiers::ALT),
            (6, Modifiers::SUPER),
        ];
        let keys = rows
            .iter()
            .flat_map(|&(row, modifier)| {
                keycodes[row * per_row..(row + 1) * per_row]
                    .iter()
                    .filter(|&&k| k != 0)
                    .map(move |&k| (k, modifier))
            })
            .collect();
        Self { keys }
    }

    fn modifier_for(&self, key: Keycode) -> Option<Modifiers> {
        self.keys.iter().find(|(k, _)| *k == key).map(|(_, m)| *m)
    }
}

/// X11 auto-repeat arrives as release/press pairs with equal timestamps.
#[derive(Debug, Default)]
struct RepeatDetector {
    last_release: Option<(Keycode, u32)>,
}

impl RepeatDetector {
    fn release(&mut self, key: Keycode, time: u32) {
        self.last_release = Some((key, time));
    }

    fn press(&mut self, key: Keycode, time: u32) -> bool {
        self.last_release.take() == Some((key, time))
    }
}

/// Keys the listener acts on during a session, paired with every chord the
/// user can be holding. The trigger itself is already grabbed.
fn session_chords(shortcut: &ShortcutConfig) -> Vec<(KeyCode, Modifiers)> {
    let keys = [
        shortcut.quit_app_key,
        shortcut.close_window_key,
        shortcut.new_window_key,
        shortcut.next_key,
        shortcut.previous_key,
        codes::ESCAPE,
    ];
    let held = [
        shortcut.trigger_modifiers,
        shortcut.trigger_modifiers | shortcut.reverse_modifiers,
    ];
    let mut chords = Vec::new();
    for key in keys {
        for mods in held {
            let chord = (key, mods);
            let is_trigger = key == shortcut.trigger_key;
            if !is_trigger && !chords.contains(&chord) {
                chords.push(chord);
            }
        }
    }
    chords
}

/// How a key frozen by a passive grab is released.
fn allow_for(verdict: TapVerdict) -> Allow {
    match verdict {
        TapVerdict::Swallow => Allow::ASYNC_KEYBOARD,
        TapVerdict::PassThrough => Allow::REPLAY_KEYBOARD,
    }
}

fn mod_mask(mods: Modifiers) -> u16 {
    let mut mask = 0u16;
    let pairs = [
        (Modifiers::SHIFT, ModMask::SHIFT),
        (Modifiers::CONTROL, ModMask::CONTROL),
        (Modifiers::ALT, ModMask::M1),
        (Modifiers::SUPER, ModMask::M4),
    ];
    for (modifier, bit) in pairs {
        if mods.contains(modifier) {
            mask |= u16::from(bit);
        }
    }
    mask
}

struct KeyGrabber {
    conn: RustConnection,
    root: Window,
    handler: TapHandler,
    modifier_keys: ModifierKeys,
    repeat: RepeatDetector,
    generation: Option<u64>,
    /// Secondary keys are grabbed for the current session.
    session_grabbed: bool,
    keyboard_grabbed: bool,
    /// Set after a refused grab until the rebind ends.
    grab_refused: bool,
}

impl KeyGrabber {
    fn run(mut self, stop: &AtomicBool) {
        debug!("x11 key grab started");
        while !stop.load(Ordering::Relaxed) {
            if let Err(e) = self.sync_grabs() {
                warn!(error = %e, "failed to update key grabs");
            }
            match self.conn.poll_for_event() {
                Ok(Some(event)) => self.on_event(event),
                Ok(None) => std::thread::sleep(IDLE_POLL),
                Err(e) => {
                    warn!(error = %e, "x11 connection lost");
                    self.handler.tap_disabled("x11 connection lost");
                    return;
                }
            }
        }
        let _ = self.conn.ungrab_key(Grab::ANY, self.root, ModMask::ANY);
        let _ = self.conn.ungrab_keyboard(x11rb::CURRENT_TIME);
        let _ = self.conn.flush();
        debug!("x11 key grab ended");
    }

    /// Passive grabs for the trigger in both directions, under every lock
    /// combination.
    fn grab_triggers(&mut self) -> Result<()> {
        let shortcut = self.handler.config().shortcut();
        self.generation = Some(self.handler.config().generation());
        self.conn
            .ungrab_key(Grab::ANY, self.root, ModMask::ANY)
            .map_err(os_err)?;

        let Ok(key) = Keycode::try_from(shortcut.trigger_key) else {
            return Err(Error::Os(format!("keycode {} out of range", shortcut.trigger_key)));
        };
        self.session_grabbed = false;
        let chords = [
            shortcut.trigger_modifiers,
            shortcut.trigger_modifiers | shortcut.reverse_modifiers,
        ];
        for chord in chords {
            if !self.grab_chord(key, chord)? {
                return Err(Error::TapDisabled("trigger chord is grabbed by another client"));
            }
        }
        debug!(key, mods = ?shortcut.trigger_modifiers, "trigger grabbed");
        Ok(())
    }

    /// Grabs `key` under `chord` and every lock variant, freezing the
    /// keyboard on press. Returns false when another client holds it.
    fn grab_chord(&self, key: Keycode, chord: Modifiers) -> Result<bool> {
        for lock in LOCK_VARIANTS {
            let mods = ModMask::from(mod_mask(chord) | lock);
            let refused = self
                .conn
                .grab_key(true, self.root, mods, key, GrabMode::ASYNC, GrabMode::SYNC)
                .map_err(os_err)?
                .check()
                .is_err();
            if refused {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn grab_session_keys(&mut self) -> Result<()> {
        let shortcut = self.handler.config().shortcut();
        for (code, chord) in session_chords(&shortcut) {
            let Ok(key) = Keycode::try_from(code) else {
                debug!(code, "session key out of range");
                continue;
            };
            if !self.grab_chord(key, chord)? {
                debug!(key, mods = ?chord, "session key held by another client");
            }
        }
        self.conn.flush().map_err(os_err)?;
        self.session_grabbed = true;
        trace!("session keys grabbed");
        Ok(())
    }

    fn sync_grabs(&mut self) -> Result<()> {
        if self.generation != Some(self.handler.config().generation()) {
            self.grab_triggers()?;
        }
        let state = self.handler.state();
        let armed = state == ListenerState::Armed;
        if armed && !self.session_grabbed {
            self.grab_session_keys()?;
        } else if !armed && self.session_grabbed {
            // Drops the session keys along with every other grab.
            self.grab_triggers()?;
            trace!("session keys released");
        }

        let capturing = matches!(state, ListenerState::Capturing { .. });
        if !capturing {
            self.grab_refused = false;
        }
        if capturing && !self.keyboard_grabbed && !self.grab_refused {
            let reply = self
                .conn
                .grab_keyboard(true, self.root, x11rb::CURRENT_TIME, GrabMode::ASYNC, GrabMode::ASYNC)
                .map_err(os_err)?
                .reply()
                .map_err(os_err)?;
            if reply.status == GrabStatus::SUCCESS {
                self.keyboard_grabbed = true;
                trace!("keyboard grabbed");
            } else {
                self.grab_refused = true;
                self.handler.tap_disabled("keyboard grab refused");
            }
        } else if !capturing && self.keyboard_grabbed {
            self.conn
                .ungrab_keyboard(x11rb::CURRENT_TIME)
                .map_err(os_err)?;
            self.conn.flush().map_err(os_err)?;
            self.keyboard_grabbed = false;
            trace!("keyboard released");
        }
        Ok(())
    }

    fn on_event(&mut self, event: Event) {
        match event {
            Event::KeyPress(e) => {
                let repeat = self.repeat.press(e.detail, e.time);
                let mods = modifiers_from_mask(u16::from(e.state));
                if let Some(modifier) = self.modifier_keys.modifier_for(e.detail) {
                    self.handler.flags_changed(mods | modifier);
                    return;
                }
                let event = KeyEvent {
                    code: u32::from(e.detail),
                    modifiers: mods,
                    repeat,
                };
                let verdict = self.handler.key_down(event);
                trace!(code = event.code, ?verdict, "key press");
                // Ignored by the server unless a passive grab froze the keyboard.
                let released = self
                    .conn
                    .allow_events(allow_for(verdict), e.time)
                    .map_err(os_err)
                    .and_then(|_| self.conn.flush().map_err(os_err));
                if let Err(err) = released {
                    warn!(error = %err, "failed to release grabbed key");
                }
            }
            Event::KeyRelease(e) => {
                self.repeat.release(e.detail, e.time);
                if let Some(modifier) = self.modifier_keys.modifier_for(e.detail) {
                    let mods = modifiers_from_mask(u16::from(e.state));
                    self.handler.flags_changed(mods - modifier);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autorepeat_pairs_share_timestamps() {
        let mut d = RepeatDetector::default();
        assert!(!d.press(23, 100));
        d.release(23, 180);
        assert!(d.press(23, 180), "repeat");
        d.release(23, 220);
        assert!(!d.press(23, 400), "fresh press after a real release");
        d.release(23, 500);
        assert!(!d.press(24, 500), "different key");
    }

    #[test]
    fn modifier_mapping_rows() {
        // Two keycodes per modifier row.
        let mapping: [Keycode; 16] = [50, 62, 66, 0, 37, 105, 64, 108, 77, 0, 0, 0, 133, 134, 0, 0];
        let keys = ModifierKeys::from_mapping(&mapping);
        let cases = [
            (50, Some(Modifiers::SHIFT)),
            (37, Some(Modifiers::CONTROL)),
            (108, Some(Modifiers::ALT)),
            (134, Some(Modifiers::SUPER)),
            (66, None),
            (77, None),
            (23, None),
        ];
        for (key, expected) in cases {
            assert_eq!(keys.modifier_for(key), expected, "keycode: {key}");
        }
        assert!(ModifierKeys::from_mapping(&[]).keys.is_empty());
    }

    #[test]
    fn session_chords_cover_secondary_keys_under_held_chords() {
        let shortcut = ShortcutConfig::default();
        let chords = session_chords(&shortcut);
        let forward = shortcut.trigger_modifiers;
        let reverse = shortcut.trigger_modifiers | shortcut.reverse_modifiers;
        let cases = [
            (shortcut.quit_app_key, forward, true),
            (shortcut.close_window_key, reverse, true),
            (shortcut.next_key, forward, true),
            (codes::ESCAPE, reverse, true),
            (shortcut.trigger_key, forward, false),
            (shortcut.quit_app_key, Modifiers::empty(), false),
        ];
        for (key, mods, expected) in cases {
            assert_eq!(chords.contains(&(key, mods)), expected, "key {key} mods {mods:?}");
        }
        assert_eq!(chords.len(), 12);
    }

    #[test]
    fn session_chords_dedupe_without_reverse() {
        let shortcut = ShortcutConfig {
            reverse_modifiers: Modifiers::empty(),
            ..Default::default()
        };
        assert_eq!(session_chords(&shortcut).len(), 6);
    }

    #[test]
    fn verdict_picks_consume_or_replay() {
        assert_eq!(allow_for(TapVerdict::Swallow), Allow::ASYNC_KEYBOARD);
        assert_eq!(allow_for(TapVerdict::PassThrough), Allow::REPLAY_KEYBOARD);
    }

    #[test]
    fn mod_mask_matches_core_bits() {
        let cases = [
            (Modifiers::ALT, u16::from(ModMask::M1)),
            (Modifiers::ALT | Modifiers::SHIFT, u16::from(ModMask::M1) | u16::from(ModMask::SHIFT)),
            (Modifiers::SUPER, u16::from(ModMask::M4)),
            (Modifiers::empty(), 0),
        ];
        for (mods, expected) in cases {
            assert_eq!(mod_mask(mods), expected, "mods: {mods:?}");
        }
    }
}
