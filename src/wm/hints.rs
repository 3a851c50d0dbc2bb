//! Hints Module
//!
//! ICCCM size and WM hints, Motif decoration hints, `_NET_WM_ICON` and
//! struts. Parsing is pure; the `read` helpers fetch through [`XConn`] and
//! fall back to conservative defaults when a property is missing or short.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;
use x11rb::protocol::xproto::{AtomEnum, Window};

use crate::shared::{clamp_coord, clamp_extent};
use crate::wm::conn::XConn;
use crate::wm::ewmh::Atoms;
use crate::wm::render::Icon;

// WM_SIZE_HINTS flags
const US_POSITION: u32 = 1 << 0;
const P_POSITION: u32 = 1 << 2;
const P_MIN_SIZE: u32 = 1 << 4;
const P_MAX_SIZE: u32 = 1 << 5;
const P_RESIZE_INC: u32 = 1 << 6;
const P_BASE_SIZE: u32 = 1 << 8;

// WM_HINTS flags
const INPUT_HINT: u32 = 1 << 0;
const STATE_HINT: u32 = 1 << 1;

// _MOTIF_WM_HINTS
const MWM_HINTS_DECORATIONS: u32 = 1 << 1;
const MWM_DECOR_ALL: u32 = 1 << 0;
const MWM_DECOR_TITLE: u32 = 1 << 3;

/// Size hints (WM_NORMAL_HINTS)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeHints {
    pub flags: u32,
    pub x: i32,
    pub y: i32,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub width_inc: u32,
    pub height_inc: u32,
    pub base_width: u32,
    pub base_height: u32,
}

impl SizeHints {
    /// Parse the 18-value WM_SIZE_HINTS structure; shorter data is ignored.
    /// Sizes and positions are clamped to what the protocol can carry.
    pub fn parse(values: &[u32]) -> Option<Self> {
        if values.len() < 15 {
            return None;
        }
        let (base_width, base_height) = if values.len() >= 17 {
            (values[15], values[16])
        } else {
            (0, 0)
        };
        Some(Self {
            flags: values[0],
            x: clamp_coord(values[1] as i32),
            y: clamp_coord(values[2] as i32),
            min_width: clamp_extent(values[5]),
            min_height: clamp_extent(values[6]),
            max_width: clamp_extent(values[7]),
            max_height: clamp_extent(values[8]),
            width_inc: clamp_extent(values[9]),
            height_inc: clamp_extent(values[10]),
            base_width: clamp_extent(base_width),
            base_height: clamp_extent(base_height),
        })
    }

    pub fn read(conn: &dyn XConn, atoms: &Atoms, window: Window) -> Result<Self> {
        let values = conn.property32(window, atoms.wm_normal_hints, AtomEnum::WM_SIZE_HINTS.into())?;
        Ok(Self::parse(&values).unwrap_or_default())
    }

    /// The client asked for its own position (user-specified, or a
    /// program-specified one other than the origin)
    pub fn requested_position(&self) -> Option<(i32, i32)> {
        if self.flags & US_POSITION != 0 {
            return Some((self.x, self.y));
        }
        if self.flags & P_POSITION != 0 && (self.x != 0 || self.y != 0) {
            return Some((self.x, self.y));
        }
        None
    }

    fn min_size(&self) -> (u32, u32) {
        if self.flags & P_MIN_SIZE != 0 {
            (self.min_width, self.min_height)
        } else if self.flags & P_BASE_SIZE != 0 {
            (self.base_width, self.base_height)
        } else {
            (0, 0)
        }
    }

    fn base_size(&self) -> (u32, u32) {
        if self.flags & P_BASE_SIZE != 0 {
            (self.base_width, self.base_height)
        } else if self.flags & P_MIN_SIZE != 0 {
            (self.min_width, self.min_height)
        } else {
            (0, 0)
        }
    }

    fn max_size(&self) -> (u32, u32) {
        if self.flags & P_MAX_SIZE != 0 {
            (
                if self.max_width > 0 { self.max_width } else { u32::MAX },
                if self.max_height > 0 { self.max_height } else { u32::MAX },
            )
        } else {
            (u32::MAX, u32::MAX)
        }
    }

    /// Min and max are both set and equal in each dimension
    pub fn is_fixed_size(&self) -> bool {
        self.flags & P_MIN_SIZE != 0
            && self.flags & P_MAX_SIZE != 0
            && self.min_width > 0
            && self.min_height > 0
            && self.min_width == self.max_width
            && self.min_height == self.max_height
    }

    /// Apply min/max/increment/base constraints to a client size
    pub fn constrain(&self, width: u32, height: u32) -> (u32, u32) {
        let (min_w, min_h) = self.min_size();
        let (max_w, max_h) = self.max_size();
        let (base_w, base_h) = self.base_size();
        let increments = self.flags & P_RESIZE_INC != 0;

        let fit = |size: u32, min: u32, max: u32, base: u32, inc: u32| -> u32 {
            let mut size = size.max(min).min(max.max(min));
            if increments && inc > 1 && size > base {
                size = base.saturating_add((size - base) / inc * inc);
                if size < min {
                    size = size.saturating_add(inc);
                }
            }
            size.max(1)
        };

        (
            fit(width, min_w, max_w, base_w, self.width_inc),
            fit(height, min_h, max_h, base_h, self.height_inc),
        )
    }
}

/// WM hints (WM_HINTS)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WmHints {
    pub flags: u32,
    pub input: bool,
    pub initial_state: u32,
    pub window_group: Option<Window>,
}

impl Default for WmHints {
    fn default() -> Self {
        Self {
            flags: 0,
            input: true,
            initial_state: 1,
            window_group: None,
        }
    }
}

impl WmHints {
    pub fn parse(values: &[u32]) -> Option<Self> {
        if values.len() < 3 {
            return None;
        }
        let flags = values[0];
        Some(Self {
            flags,
            // Clients that omit the input hint still get focus
            input: flags & INPUT_HINT == 0 || values[1] != 0,
            initial_state: if flags & STATE_HINT != 0 { values[2] } else { 1 },
            window_group: values.get(8).copied().filter(|&group| group != 0),
        })
    }

    pub fn read(conn: &dyn XConn, atoms: &Atoms, window: Window) -> Result<Self> {
        let values = conn.property32(window, atoms.wm_hints, AtomEnum::WM_HINTS.into())?;
        Ok(Self::parse(&values).unwrap_or_default())
    }

    /// Client wants to start iconified
    pub fn starts_iconic(&self) -> bool {
        self.initial_state == 3
    }
}

/// Decoration preference from `_MOTIF_WM_HINTS`, `None` when unspecified
pub fn motif_decorations(values: &[u32]) -> Option<bool> {
    if values.len() < 3 || values[0] & MWM_HINTS_DECORATIONS == 0 {
        return None;
    }
    Some(values[2] & (MWM_DECOR_ALL | MWM_DECOR_TITLE) != 0)
}

pub fn read_motif_decorations(conn: &dyn XConn, atoms: &Atoms, window: Window) -> Result<Option<bool>> {
    let values = conn.property32(window, atoms.motif_wm_hints, atoms.motif_wm_hints)?;
    Ok(motif_decorations(&values))
}

/// Split `_NET_WM_ICON` data (width, height, pixels...) into images,
/// stopping at the first truncated entry
pub fn parse_icons(values: &[u32]) -> Vec<Icon> {
    let mut icons = Vec::new();
    let mut rest = values;
    while rest.len() >= 2 {
        let (width, height) = (rest[0], rest[1]);
        let Some(len) = width.checked_mul(height).map(|n| n as usize) else {
            break;
        };
        if width == 0 || height == 0 || rest.len() - 2 < len {
            break;
        }
        icons.push(Icon {
            width,
            height,
            pixels: rest[2..2 + len].to_vec(),
        });
        rest = &rest[2 + len..];
    }
    icons
}

/// The icon whose size is closest to `size`, preferring larger ones on ties
pub fn closest_icon(icons: Vec<Icon>, size: u32) -> Option<Icon> {
    icons.into_iter().min_by_key(|icon| {
        let edge = icon.width.max(icon.height);
        (edge.abs_diff(size), u32::MAX - edge)
    })
}

pub fn read_icon(conn: &dyn XConn, atoms: &Atoms, window: Window, size: u32) -> Result<Option<Arc<Icon>>> {
    let values = conn.property32(window, atoms.net_wm_icon, AtomEnum::CARDINAL.into())?;
    let icon = closest_icon(parse_icons(&values), size);
    if let Some(icon) = &icon {
        debug!(
            "Window 0x{:x} icon {}x{} for size {}",
            window, icon.width, icon.height, size
        );
    }
    Ok(icon.map(Arc::new))
}

/// Space reserved at the screen edges by a dock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Strut {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl Strut {
    pub fn parse(values: &[u32]) -> Option<Self> {
        if values.len() < 4 {
            return None;
        }
        Some(Self {
            left: clamp_extent(values[0]),
            right: clamp_extent(values[1]),
            top: clamp_extent(values[2]),
            bottom: clamp_extent(values[3]),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.left == 0 && self.right == 0 && self.top == 0 && self.bottom == 0
    }

    /// `_NET_WM_STRUT_PARTIAL` wins over `_NET_WM_STRUT`
    pub fn read(conn: &dyn XConn, atoms: &Atoms, window: Window) -> Result<Option<Self>> {
        let partial = conn.property32(window, atoms.net_wm_strut_partial, AtomEnum::CARDINAL.into())?;
        if let Some(strut) = Self::parse(&partial) {
            return Ok(Some(strut));
        }
        let legacy = conn.property32(window, atoms.net_wm_strut, AtomEnum::CARDINAL.into())?;
        Ok(Self::parse(&legacy))
    }
}
