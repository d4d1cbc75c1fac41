//! Global input: key tap classification and modifier-release monitoring.

pub mod keys;
pub mod listener;
pub mod monitor;
pub mod tap;

pub use keys::{KeyEvent, Modifiers, ShortcutSlot, TapVerdict};
pub use listener::{Action, Command, InputListener};
pub use tap::{TapEnv, TapHandler};
