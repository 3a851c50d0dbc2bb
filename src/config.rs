//! Configuration system for the Area window manager
//!
//! Loads configuration from TOML file at `~/.config/area/wm.toml`
//! Auto-generates default config file on first run if missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::wm::settings::{ButtonSide, Settings};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub decorations: DecorationConfig,
    pub colors: WindowColors,
    pub behavior: BehaviorConfig,
    pub keybindings: KeybindingsConfig,
    pub wallpaper: WallpaperConfig,
}

impl Config {
    /// Load configuration from file, or use defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load from an explicit path, writing defaults there when it is missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            if let Err(e) = Self::save_default(config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {:?}", config_path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", config_path))?;

        info!("Configuration loaded from {:?}", config_path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Get the path to the config file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("area");

        Ok(config_dir.join("wm.toml"))
    }

    /// Save default configuration to file
    fn save_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default config")?;

        fs::write(path, toml_string).context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }
}

/// Window decoration geometry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecorationConfig {
    /// Titlebar height in pixels (before output scaling)
    pub titlebar_height: u16,
    /// Border width in pixels
    pub border_width: u16,
    /// Button size in pixels
    pub button_size: u16,
    /// Button padding in pixels
    pub button_padding: u16,
    /// Which end of the title bar holds the controls
    pub button_side: ButtonSide,
}

impl Default for DecorationConfig {
    fn default() -> Self {
        Self {
            titlebar_height: 32,
            border_width: 2,
            button_size: 16,
            button_padding: 8,
            button_side: ButtonSide::Right,
        }
    }
}

impl Settings for DecorationConfig {
    fn border_width(&self) -> u32 {
        self.border_width as u32
    }

    fn title_height(&self) -> u32 {
        self.titlebar_height as u32
    }

    fn decoration_button_side(&self) -> ButtonSide {
        self.button_side
    }

    fn button_size(&self) -> u32 {
        self.button_size as u32
    }

    fn button_padding(&self) -> u32 {
        self.button_padding as u32
    }
}

/// Window colors configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowColors {
    /// Frame background (hex: 0xRRGGBB)
    pub background: u32,
    /// Titlebar of the focused window
    pub titlebar_focused: u32,
    /// Titlebar of unfocused windows
    pub titlebar: u32,
    /// Border color
    pub border: u32,
    /// Title text and glyphs
    pub foreground: u32,
    pub close_button: u32,
    pub maximize_button: u32,
    pub minimize_button: u32,
}

impl Default for WindowColors {
    fn default() -> Self {
        // Nord
        Self {
            background: 0x2e3440,
            titlebar_focused: 0x434c5e,
            titlebar: 0x3b4252,
            border: 0x5e81ac,
            foreground: 0xeceff4,
            close_button: 0xbf616a,
            maximize_button: 0xa3be8c,
            minimize_button: 0xebcb8b,
        }
    }
}

/// Window behavior configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Window for a second title bar release to count as a double click
    pub double_click_ms: u64,
    /// Maximum pointer travel between the two clicks
    pub double_click_distance: u32,
    /// How long shutdown waits for clients to close
    pub shutdown_timeout_ms: u64,
    /// Capacity of the pending client geometry queue
    pub geometry_queue_depth: usize,
    /// Give focus to newly mapped windows
    pub focus_new_windows: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            double_click_ms: 300,
            double_click_distance: 6,
            shutdown_timeout_ms: 5000,
            geometry_queue_depth: 64,
            focus_new_windows: true,
        }
    }
}

/// Which physical modifier the `primary` binding modifier means
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierPreference {
    Super,
    Alt,
}

/// One keyboard shortcut
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBindingConfig {
    /// Key name, e.g. "q", "F4", "Tab", "Return"
    pub key: String,
    /// Modifier names: "primary", "shift", "control", "alt", "super"
    #[serde(default)]
    pub modifiers: Vec<String>,
    /// close, toggle_maximize, minimize, toggle_fullscreen,
    /// toggle_decorations, cycle_windows, quit or spawn
    pub action: String,
    /// Command line for `spawn`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl KeyBindingConfig {
    fn new(key: &str, modifiers: &[&str], action: &str) -> Self {
        Self {
            key: key.to_string(),
            modifiers: modifiers.iter().map(|m| m.to_string()).collect(),
            action: action.to_string(),
            command: None,
        }
    }
}

/// Keyboard shortcuts configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeybindingsConfig {
    pub modifier: ModifierPreference,
    pub bindings: Vec<KeyBindingConfig>,
}

impl Default for KeybindingsConfig {
    fn default() -> Self {
        let mut terminal = KeyBindingConfig::new("Return", &["primary"], "spawn");
        terminal.command = Some("xterm".to_string());
        Self {
            modifier: ModifierPreference::Super,
            bindings: vec![
                KeyBindingConfig::new("q", &["primary"], "close"),
                KeyBindingConfig::new("Up", &["primary"], "toggle_maximize"),
                KeyBindingConfig::new("Down", &["primary"], "minimize"),
                KeyBindingConfig::new("F11", &[], "toggle_fullscreen"),
                KeyBindingConfig::new("d", &["primary", "shift"], "toggle_decorations"),
                KeyBindingConfig::new("Tab", &["alt"], "cycle_windows"),
                KeyBindingConfig::new("Escape", &["primary", "shift"], "quit"),
                terminal,
            ],
        }
    }
}

/// Root background gradient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallpaperConfig {
    pub enabled: bool,
    /// Color at the top edge (hex: 0xRRGGBB)
    pub top: u32,
    /// Color at the bottom edge
    pub bottom: u32,
}

impl Default for WallpaperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top: 0x2e3440,
            bottom: 0x4c566a,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("area").join("wm.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        // The generated file parses back to the same values
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wm.toml");
        fs::write(
            &path,
            "[decorations]\ntitlebar_height = 24\nbutton_side = \"left\"\n\n[keybindings]\nmodifier = \"alt\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.decorations.titlebar_height, 24);
        assert_eq!(config.decorations.border_width, 2);
        assert_eq!(config.decorations.button_side, ButtonSide::Left);
        assert_eq!(config.keybindings.modifier, ModifierPreference::Alt);
        assert_eq!(
            config.keybindings.bindings,
            KeybindingsConfig::default().bindings
        );
        assert_eq!(config.behavior.double_click_ms, 300);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wm.toml");
        fs::write(&path, "[decorations\ntitlebar_height = ").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_settings_view() {
        let decorations = DecorationConfig::default();
        assert_eq!(decorations.border_width(), 2);
        assert_eq!(decorations.title_height(), 32);
        assert_eq!(decorations.decoration_button_side(), ButtonSide::Right);
    }
}
