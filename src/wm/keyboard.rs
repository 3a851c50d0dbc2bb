//! Keyboard Module
//!
//! Shortcut table built from the keybindings config: key names resolved to
//! keycodes through the server keyboard mapping, modifier names resolved
//! to a mask with the `primary` modifier standing for Super or Alt.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::{KeyBindingConfig, KeybindingsConfig, ModifierPreference};
use crate::wm::conn::{KeyboardMapping, XConn};

pub const SHIFT: u16 = 1;
pub const LOCK: u16 = 1 << 1;
pub const CONTROL: u16 = 1 << 2;
/// Alt on almost every keymap
pub const MOD1: u16 = 1 << 3;
/// NumLock on almost every keymap
pub const MOD2: u16 = 1 << 4;
/// Super on almost every keymap
pub const MOD4: u16 = 1 << 6;

/// Modifier bits that take part in matching
const RELEVANT: u16 = SHIFT | CONTROL | MOD1 | MOD4;

/// Shortcut action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    Close,
    ToggleMaximize,
    Minimize,
    ToggleFullscreen,
    ToggleDecorations,
    CycleWindows,
    Spawn(String),
    Quit,
}

impl KeyAction {
    pub fn parse(action: &str, command: Option<&str>) -> Option<Self> {
        Some(match action {
            "close" => Self::Close,
            "toggle_maximize" | "maximize" => Self::ToggleMaximize,
            "minimize" | "iconify" => Self::Minimize,
            "toggle_fullscreen" | "fullscreen" => Self::ToggleFullscreen,
            "toggle_decorations" => Self::ToggleDecorations,
            "cycle_windows" => Self::CycleWindows,
            "quit" => Self::Quit,
            "spawn" => Self::Spawn(command?.to_string()),
            _ => return None,
        })
    }

    /// Whether the action needs a focused window
    pub fn targets_window(&self) -> bool {
        matches!(
            self,
            Self::Close
                | Self::ToggleMaximize
                | Self::Minimize
                | Self::ToggleFullscreen
                | Self::ToggleDecorations
        )
    }
}

/// Keysym for a key name: single letters and digits, or an X keysym name
pub fn keysym_for_name(name: &str) -> Option<u32> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphanumeric() {
            return Some(c.to_ascii_lowercase() as u32);
        }
    }
    if let Some(n) = name.strip_prefix('F').and_then(|n| n.parse::<u32>().ok()) {
        if (1..=24).contains(&n) {
            return Some(0xffbe + n - 1);
        }
    }
    Some(match name {
        "space" => 0x0020,
        "BackSpace" => 0xff08,
        "Tab" => 0xff09,
        "Return" => 0xff0d,
        "Escape" => 0xff1b,
        "Home" => 0xff50,
        "Left" => 0xff51,
        "Up" => 0xff52,
        "Right" => 0xff53,
        "Down" => 0xff54,
        "Page_Up" => 0xff55,
        "Page_Down" => 0xff56,
        "End" => 0xff57,
        "Print" => 0xff61,
        "Delete" => 0xffff,
        _ => return None,
    })
}

/// Mask for a list of modifier names
pub fn modifier_mask(names: &[String], preference: ModifierPreference) -> Option<u16> {
    names.iter().try_fold(0u16, |mask, name| {
        let bit = match name.to_ascii_lowercase().as_str() {
            "primary" => match preference {
                ModifierPreference::Super => MOD4,
                ModifierPreference::Alt => MOD1,
            },
            "shift" => SHIFT,
            "control" | "ctrl" => CONTROL,
            "alt" | "mod1" => MOD1,
            "super" | "mod4" => MOD4,
            _ => return None,
        };
        Some(mask | bit)
    })
}

/// Event state reduced to the modifiers bindings match on; Lock, NumLock
/// and pointer buttons are ignored
pub fn effective_mask(state: u16) -> u16 {
    state & RELEVANT
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub keycode: u8,
    pub modifiers: u16,
    pub action: KeyAction,
}

/// Keyboard manager
#[derive(Debug, Default)]
pub struct KeyboardManager {
    bindings: Vec<KeyBinding>,
}

impl KeyboardManager {
    /// Resolve the configured bindings, skipping unknown keys and actions
    pub fn from_config(config: &KeybindingsConfig, mapping: &KeyboardMapping) -> Self {
        let bindings = config
            .bindings
            .iter()
            .filter_map(|binding| Self::resolve(binding, config.modifier, mapping))
            .collect::<Vec<_>>();
        info!("Loaded {} key bindings", bindings.len());
        Self { bindings }
    }

    fn resolve(
        binding: &KeyBindingConfig,
        preference: ModifierPreference,
        mapping: &KeyboardMapping,
    ) -> Option<KeyBinding> {
        let Some(action) = KeyAction::parse(&binding.action, binding.command.as_deref()) else {
            warn!("Unknown shortcut action '{}'", binding.action);
            return None;
        };
        let Some(modifiers) = modifier_mask(&binding.modifiers, preference) else {
            warn!("Unknown modifier in {:?}", binding.modifiers);
            return None;
        };
        let Some(keycode) = keysym_for_name(&binding.key).and_then(|sym| mapping.keycode_for(sym))
        else {
            warn!("Key '{}' is not on this keyboard", binding.key);
            return None;
        };
        Some(KeyBinding {
            keycode,
            modifiers,
            action,
        })
    }

    /// Read the keyboard mapping and grab every binding on the root window
    pub fn load(conn: &dyn XConn, config: &KeybindingsConfig) -> Result<Self> {
        let mapping = conn
            .keyboard_mapping()
            .context("Failed to read keyboard mapping")?;
        let manager = Self::from_config(config, &mapping);
        manager.grab_all(conn)?;
        Ok(manager)
    }

    /// Grab each binding once per Lock/NumLock combination so shortcuts
    /// work regardless of those locks
    pub fn grab_all(&self, conn: &dyn XConn) -> Result<()> {
        conn.ungrab_all_keys()?;
        for binding in &self.bindings {
            for locks in [0, LOCK, MOD2, LOCK | MOD2] {
                conn.grab_key(binding.keycode, binding.modifiers | locks)?;
            }
        }
        debug!("Grabbed {} key bindings", self.bindings.len());
        Ok(())
    }

    /// First binding matching a key press
    pub fn lookup(&self, keycode: u8, state: u16) -> Option<&KeyAction> {
        let mask = effective_mask(state);
        self.bindings
            .iter()
            .find(|b| b.keycode == keycode && b.modifiers == mask)
            .map(|b| &b.action)
    }

    pub fn bindings(&self) -> &[KeyBinding] {
        &self.bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::testing::{FakeConn, Request};

    // FakeConn keycodes: 'q' = 8 + 16, Tab = 35, Up = 37, F11 = 40
    const Q: u8 = 24;
    const TAB: u8 = 35;
    const UP: u8 = 37;

    fn manager(preference: ModifierPreference) -> KeyboardManager {
        let conn = FakeConn::new();
        let config = KeybindingsConfig {
            modifier: preference,
            ..Default::default()
        };
        KeyboardManager::load(&conn, &config).unwrap()
    }

    #[test]
    fn test_key_names() {
        assert_eq!(keysym_for_name("q"), Some(0x71));
        assert_eq!(keysym_for_name("Q"), Some(0x71));
        assert_eq!(keysym_for_name("F11"), Some(0xffc8));
        assert_eq!(keysym_for_name("Return"), Some(0xff0d));
        assert_eq!(keysym_for_name("F99"), None);
        assert_eq!(keysym_for_name("Hyper"), None);
    }

    #[test]
    fn test_primary_modifier_follows_preference() {
        let names = vec!["primary".to_string(), "shift".to_string()];
        assert_eq!(
            modifier_mask(&names, ModifierPreference::Super),
            Some(MOD4 | SHIFT)
        );
        assert_eq!(
            modifier_mask(&names, ModifierPreference::Alt),
            Some(MOD1 | SHIFT)
        );
        assert_eq!(
            modifier_mask(&["hyper".to_string()], ModifierPreference::Alt),
            None
        );
    }

    #[test]
    fn test_lookup_ignores_lock_modifiers() {
        let keyboard = manager(ModifierPreference::Super);
        assert_eq!(keyboard.lookup(Q, MOD4), Some(&KeyAction::Close));
        assert_eq!(keyboard.lookup(Q, MOD4 | LOCK | MOD2), Some(&KeyAction::Close));
        assert_eq!(keyboard.lookup(Q, MOD1), None);
        assert_eq!(keyboard.lookup(Q, MOD4 | SHIFT), None);
        assert_eq!(keyboard.lookup(UP, MOD4), Some(&KeyAction::ToggleMaximize));
        assert_eq!(keyboard.lookup(TAB, MOD1), Some(&KeyAction::CycleWindows));
    }

    #[test]
    fn test_alt_preference() {
        let keyboard = manager(ModifierPreference::Alt);
        assert_eq!(keyboard.lookup(Q, MOD1), Some(&KeyAction::Close));
        assert_eq!(keyboard.lookup(Q, MOD4), None);
    }

    #[test]
    fn test_first_match_wins() {
        let mapping = FakeConn::new().keyboard_mapping().unwrap();
        let config = KeybindingsConfig {
            modifier: ModifierPreference::Super,
            bindings: vec![
                KeyBindingConfig {
                    key: "q".into(),
                    modifiers: vec!["super".into()],
                    action: "minimize".into(),
                    command: None,
                },
                KeyBindingConfig {
                    key: "q".into(),
                    modifiers: vec!["primary".into()],
                    action: "close".into(),
                    command: None,
                },
                KeyBindingConfig {
                    key: "Hyper_L".into(),
                    modifiers: vec![],
                    action: "close".into(),
                    command: None,
                },
            ],
        };
        let keyboard = KeyboardManager::from_config(&config, &mapping);
        assert_eq!(keyboard.bindings().len(), 2);
        assert_eq!(keyboard.lookup(Q, MOD4), Some(&KeyAction::Minimize));
    }

    #[test]
    fn test_grabs_cover_lock_variants() {
        let conn = FakeConn::new();
        let config = KeybindingsConfig::default();
        let keyboard = KeyboardManager::load(&conn, &config).unwrap();
        let grabs = conn
            .take_requests()
            .into_iter()
            .filter(|r| matches!(r, Request::GrabKey { .. }))
            .count();
        assert_eq!(grabs, keyboard.bindings().len() * 4);
        assert!(conn.take_requests().is_empty());
    }

    #[test]
    fn test_spawn_requires_command() {
        assert_eq!(KeyAction::parse("spawn", None), None);
        assert_eq!(
            KeyAction::parse("spawn", Some("xterm")),
            Some(KeyAction::Spawn("xterm".into()))
        );
        assert!(KeyAction::Close.targets_window());
        assert!(!KeyAction::Quit.targets_window());
    }
}
