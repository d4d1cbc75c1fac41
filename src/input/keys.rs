use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Native virtual key code of the running platform (macOS virtual key
/// code, X11 keycode).
pub type KeyCode = u32;

bitflags! {
    /// Held modifier keys. Lock keys are never represented.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2;
        const SUPER = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifiers,
    pub repeat: bool,
}

impl KeyEvent {
    pub fn new(code: KeyCode, modifiers: Modifiers) -> Self {
        Self {
            code,
            modifiers,
            repeat: false,
        }
    }

    pub fn repeated(mut self) -> Self {
        self.repeat = true;
        self
    }
}

/// What the tap does with a key-down after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapVerdict {
    PassThrough,
    Swallow,
}

/// Rebindable shortcut slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ShortcutSlot {
    Trigger,
    Reverse,
    Quit,
    Close,
    NewWindow,
}

impl ShortcutSlot {
    /// Slots that bind a bare modifier set rather than a key.
    pub fn is_modifier_only(self) -> bool {
        matches!(self, Self::Reverse)
    }
}

#[cfg(target_os = "macos")]
pub mod codes {
    use super::KeyCode;

    pub const TAB: KeyCode = 48;
    pub const ESCAPE: KeyCode = 53;
    pub const Q: KeyCode = 12;
    pub const W: KeyCode = 13;
    pub const N: KeyCode = 45;
    pub const LEFT: KeyCode = 123;
    pub const RIGHT: KeyCode = 124;
}

#[cfg(not(target_os = "macos"))]
pub mod codes {
    use super::KeyCode;

    pub const TAB: KeyCode = 23;
    pub const ESCAPE: KeyCode = 9;
    pub const Q: KeyCode = 24;
    pub const W: KeyCode = 25;
    pub const N: KeyCode = 57;
    pub const LEFT: KeyCode = 113;
    pub const RIGHT: KeyCode = 114;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifiers_serde_is_readable() {
        let mods = Modifiers::ALT | Modifiers::SHIFT;
        let json = serde_json::to_string(&mods).unwrap();
        let back: Modifiers = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mods, "json: {json}");
    }

    #[test]
    fn only_reverse_is_modifier_only() {
        let cases = [
            (ShortcutSlot::Trigger, false),
            (ShortcutSlot::Reverse, true),
            (ShortcutSlot::Quit, false),
            (ShortcutSlot::Close, false),
            (ShortcutSlot::NewWindow, false),
        ];
        for (slot, expected) in cases {
            assert_eq!(slot.is_modifier_only(), expected, "slot: {slot:?}");
        }
    }
}
