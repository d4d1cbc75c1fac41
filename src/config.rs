use crate::error::Result;
use crate::input::keys::{codes, KeyCode, Modifiers, ShortcutSlot};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const ICON_SIZE_MIN: u32 = 40;
pub const ICON_SIZE_MAX: u32 = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutConfig {
    pub trigger_key: KeyCode,
    pub trigger_modifiers: Modifiers,
    pub reverse_modifiers: Modifiers,
    pub quit_app_key: KeyCode,
    pub close_window_key: KeyCode,
    pub new_window_key: KeyCode,
    pub next_key: KeyCode,
    pub previous_key: KeyCode,
    pub cancel_key: KeyCode,
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        Self {
            trigger_key: codes::TAB,
            trigger_modifiers: Modifiers::ALT,
            reverse_modifiers: Modifiers::SHIFT,
            quit_app_key: codes::Q,
            close_window_key: codes::W,
            new_window_key: codes::N,
            next_key: codes::RIGHT,
            previous_key: codes::LEFT,
            cancel_key: codes::ESCAPE,
        }
    }
}

impl ShortcutConfig {
    /// Returns `Some(reverse)` when `code`/`mods` is the trigger chord.
    pub fn trigger_direction(&self, code: KeyCode, mods: Modifiers) -> Option<bool> {
        if code != self.trigger_key || self.trigger_modifiers.is_empty() {
            return None;
        }
        if mods == self.trigger_modifiers {
            return Some(false);
        }
        let reverse = self.trigger_modifiers | self.reverse_modifiers;
        if !self.reverse_modifiers.is_empty() && mods == reverse {
            return Some(true);
        }
        None
    }

    pub fn trigger_held(&self, mods: Modifiers) -> bool {
        !self.trigger_modifiers.is_empty() && mods.contains(self.trigger_modifiers)
    }

    /// Writes a captured chord into `slot`. Key slots other than the trigger
    /// keep only the key code, since they are pressed under the trigger
    /// modifier.
    pub fn bind(&mut self, slot: ShortcutSlot, code: Option<KeyCode>, mods: Modifiers) -> bool {
        match (slot, code) {
            (ShortcutSlot::Trigger, Some(code)) if !mods.is_empty() => {
                self.trigger_key = code;
                self.trigger_modifiers = mods;
            }
            (ShortcutSlot::Reverse, _) if !(mods - self.trigger_modifiers).is_empty() => {
                self.reverse_modifiers = mods - self.trigger_modifiers;
            }
            (ShortcutSlot::Quit, Some(code)) => self.quit_app_key = code,
            (ShortcutSlot::Close, Some(code)) => self.close_window_key = code,
            (ShortcutSlot::NewWindow, Some(code)) => self.new_window_key = code,
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitcherConfig {
    pub shortcut: ShortcutConfig,
    pub all_desktops: bool,
    pub continuous_cycling: bool,
    pub preview_windows: bool,
    pub show_all_windows: bool,
    pub show_minimized: bool,
    pub activate_all_windows: bool,
    pub switch_windows_while_cycling: bool,
    pub icon_size: u32,
    pub show_delay_ms: u64,
    pub reconcile_delay_ms: u64,
    pub min_window_size: f64,
}

impl Default for SwitcherConfig {
    fn default() -> Self {
        Self {
            shortcut: ShortcutConfig::default(),
            all_desktops: false,
            continuous_cycling: true,
            preview_windows: false,
            show_all_windows: false,
            show_minimized: false,
            activate_all_windows: false,
            switch_windows_while_cycling: false,
            icon_size: 120,
            show_delay_ms: 100,
            reconcile_delay_ms: 300,
            min_window_size: 40.0,
        }
    }
}

impl SwitcherConfig {
    pub fn icon_size(&self) -> u32 {
        self.icon_size.clamp(ICON_SIZE_MIN, ICON_SIZE_MAX)
    }

    pub fn show_delay(&self) -> Duration {
        Duration::from_millis(self.show_delay_ms)
    }

    pub fn reconcile_delay(&self) -> Duration {
        Duration::from_millis(self.reconcile_delay_ms)
    }
}

/// Shared, injected configuration. Readers take a snapshot at decision
/// time; every write bumps the generation.
#[derive(Debug, Clone, Default)]
pub struct ConfigHandle {
    inner: Arc<RwLock<SwitcherConfig>>,
    generation: Arc<AtomicU64>,
}

impl ConfigHandle {
    pub fn new(config: SwitcherConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn snapshot(&self) -> SwitcherConfig {
        self.inner.read().clone()
    }

    pub fn shortcut(&self) -> ShortcutConfig {
        self.inner.read().shortcut.clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&SwitcherConfig) -> R) -> R {
        f(&self.inner.read())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut SwitcherConfig) -> R) -> R {
        let out = f(&mut self.inner.write());
        self.generation.fetch_add(1, Ordering::SeqCst);
        out
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

pub fn load_config() -> SwitcherConfig {
    for path in config_paths() {
        if let Some(config) = load_from(&path) {
            return config;
        }
    }
    info!("using default config");
    SwitcherConfig::default()
}

fn load_from(path: &Path) -> Option<SwitcherConfig> {
    let contents = fs::read_to_string(path).ok()?;
    match serde_json::from_str::<SwitcherConfig>(&contents) {
        Ok(config) => {
            info!(path = %path.display(), "loaded config");
            debug!(?config);
            Some(config)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse config");
            None
        }
    }
}

pub fn save_config(path: &Path, config: &SwitcherConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}

/// Path new settings are written to: the first existing candidate, else the
/// preferred location.
pub fn config_write_path() -> Option<PathBuf> {
    let paths = config_paths();
    paths
        .iter()
        .find(|p| p.is_file())
        .or_else(|| paths.first())
        .cloned()
}

fn config_paths() -> Vec<PathBuf> {
    const RELATIVE_CONFIG_PATH: &str = "app-switcher/config.json";

    let mut roots = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        roots.push(dir);
    }
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.trim().is_empty() {
            roots.push(PathBuf::from(xdg_config_home));
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        if !home.trim().is_empty() {
            roots.push(PathBuf::from(home).join(".config"));
        }
    }

    let mut paths = Vec::new();
    for root in roots {
        let candidate = root.join(RELATIVE_CONFIG_PATH);
        if !paths.contains(&candidate) {
            paths.push(candidate);
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: SwitcherConfig =
            serde_json::from_str(r#"{ "preview_windows": true, "shortcut": { "quit_app_key": 7 } }"#)
                .unwrap();
        assert!(config.preview_windows);
        assert!(config.continuous_cycling);
        assert_eq!(config.shortcut.quit_app_key, 7);
        assert_eq!(config.shortcut.trigger_key, codes::TAB);
        assert_eq!(config.shortcut.trigger_modifiers, Modifiers::ALT);
    }

    #[test]
    fn icon_size_is_clamped() {
        let cases = [(0, ICON_SIZE_MIN), (120, 120), (500, ICON_SIZE_MAX)];
        for (raw, expected) in cases {
            let config = SwitcherConfig {
                icon_size: raw,
                ..Default::default()
            };
            assert_eq!(config.icon_size(), expected, "raw: {raw}");
        }
    }

    #[test]
    fn trigger_direction_is_exact() {
        let shortcut = ShortcutConfig::default();
        let cases = [
            (codes::TAB, Modifiers::ALT, Some(false)),
            (codes::TAB, Modifiers::ALT | Modifiers::SHIFT, Some(true)),
            (codes::TAB, Modifiers::empty(), None),
            (codes::TAB, Modifiers::SHIFT, None),
            (codes::TAB, Modifiers::ALT | Modifiers::CONTROL, None),
            (codes::Q, Modifiers::ALT, None),
        ];
        for (code, mods, expected) in cases {
            assert_eq!(
                shortcut.trigger_direction(code, mods),
                expected,
                "code: {code} mods: {mods:?}"
            );
        }
    }

    #[test]
    fn bind_writes_slots() {
        let mut shortcut = ShortcutConfig::default();
        assert!(shortcut.bind(ShortcutSlot::Trigger, Some(5), Modifiers::CONTROL));
        assert_eq!(shortcut.trigger_key, 5);
        assert_eq!(shortcut.trigger_modifiers, Modifiers::CONTROL);

        assert!(shortcut.bind(
            ShortcutSlot::Reverse,
            None,
            Modifiers::CONTROL | Modifiers::SUPER
        ));
        assert_eq!(shortcut.reverse_modifiers, Modifiers::SUPER);

        assert!(shortcut.bind(ShortcutSlot::Quit, Some(77), Modifiers::CONTROL));
        assert_eq!(shortcut.quit_app_key, 77);

        assert!(!shortcut.bind(ShortcutSlot::Reverse, None, Modifiers::CONTROL));
        assert_eq!(shortcut.reverse_modifiers, Modifiers::SUPER, "trigger alone keeps the old chord");

        assert!(!shortcut.bind(ShortcutSlot::Trigger, Some(5), Modifiers::empty()));
        assert!(!shortcut.bind(ShortcutSlot::Close, None, Modifiers::ALT));
    }

    #[test]
    fn handle_update_bumps_generation() {
        let handle = ConfigHandle::new(SwitcherConfig::default());
        let other = handle.clone();
        assert_eq!(handle.generation(), 0);
        other.update(|c| c.show_all_windows = true);
        assert_eq!(handle.generation(), 1);
        assert!(handle.snapshot().show_all_windows);
    }

    #[test]
    fn save_then_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = SwitcherConfig {
            icon_size: 64,
            all_desktops: true,
            ..Default::default()
        };
        save_config(&path, &config).unwrap();
        assert_eq!(load_from(&path), Some(config));
    }

    #[test]
    fn invalid_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_from(&path), None);
    }
}
