//! Area Window Manager
//!
//! A reparenting X11 window manager core: output topology, client records,
//! frame decorations, stacking, and pointer/keyboard interaction.

pub mod config;
pub mod error;
pub mod shared;
pub mod wm;
pub mod x11_async;
