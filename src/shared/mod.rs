//! Shared types used across the window manager

pub mod window_state;

pub use window_state::{clamp_coord, clamp_extent, Geometry, Insets, MAX_EXTENT};
