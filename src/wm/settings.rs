//! Settings Module
//!
//! The decoration settings the frame compositor reads. The user config
//! implements [`Settings`]; tests supply fixed values.

use serde::{Deserialize, Serialize};

/// End of the title bar that holds the window controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonSide {
    Left,
    #[default]
    Right,
}

/// Decoration metrics, in unscaled pixels
pub trait Settings: Send + Sync {
    fn border_width(&self) -> u32;

    fn title_height(&self) -> u32;

    fn decoration_button_side(&self) -> ButtonSide;

    fn button_size(&self) -> u32 {
        16
    }

    fn button_padding(&self) -> u32 {
        8
    }
}

/// Width of the fixed control strip: three buttons with padding around each
pub fn controls_width(settings: &dyn Settings, scale: u32) -> u32 {
    (3 * (settings.button_size() + settings.button_padding()) + settings.button_padding())
        * scale.max(1)
}
