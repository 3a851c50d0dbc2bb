//! MoveResize Module
//!
//! Interactive move and resize as an explicit state machine: `Idle` or
//! `Dragging` a single session. Geometry math is pure so drags can be
//! tested without a display.

use tracing::debug;
use x11rb::protocol::xproto::Window;

use crate::shared::Geometry;

/// Resize direction (compass edge or corner being dragged)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeDirection {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

impl ResizeDirection {
    /// `_NET_WM_MOVERESIZE` direction codes 0..=7
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::TopLeft,
            1 => Self::Top,
            2 => Self::TopRight,
            3 => Self::Right,
            4 => Self::BottomRight,
            5 => Self::Bottom,
            6 => Self::BottomLeft,
            7 => Self::Left,
            _ => return None,
        })
    }

    pub fn moves_left_edge(&self) -> bool {
        matches!(self, Self::TopLeft | Self::Left | Self::BottomLeft)
    }

    pub fn moves_right_edge(&self) -> bool {
        matches!(self, Self::TopRight | Self::Right | Self::BottomRight)
    }

    pub fn moves_top_edge(&self) -> bool {
        matches!(self, Self::TopLeft | Self::Top | Self::TopRight)
    }

    pub fn moves_bottom_edge(&self) -> bool {
        matches!(self, Self::BottomLeft | Self::Bottom | Self::BottomRight)
    }
}

/// What a drag changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Move,
    Resize(ResizeDirection),
}

/// Decoded `_NET_WM_MOVERESIZE` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResizeRequest {
    Start(DragKind),
    Cancel,
    /// Keyboard-driven variants, not supported
    Unsupported,
}

impl MoveResizeRequest {
    pub fn from_code(code: u32) -> Self {
        match code {
            8 => Self::Start(DragKind::Move),
            11 => Self::Cancel,
            code => match ResizeDirection::from_code(code) {
                Some(direction) => Self::Start(DragKind::Resize(direction)),
                None => Self::Unsupported,
            },
        }
    }
}

/// One drag in progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    pub target: Window,
    pub kind: DragKind,
    /// Pointer position (root coordinates) at drag start
    pub anchor: (i32, i32),
    /// Frame geometry at drag start
    pub anchor_geometry: Geometry,
    /// The title bar was grabbed while maximized; the first motion restores
    pub unmaximize_on_motion: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragSession),
}

/// Move/resize manager
#[derive(Debug, Default)]
pub struct MoveResizeManager {
    state: DragState,
}

impl MoveResizeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `Dragging`. Refused while another drag is active.
    pub fn start(&mut self, session: DragSession) -> bool {
        if self.is_dragging() {
            debug!("Drag already active, ignoring start for 0x{:x}", session.target);
            return false;
        }
        debug!(
            "Drag start on 0x{:x}: {:?} from {:?}",
            session.target, session.kind, session.anchor
        );
        self.state = DragState::Dragging(session);
        true
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.state {
            DragState::Dragging(session) => Some(session),
            DragState::Idle => None,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    /// Target geometry for a pointer position, before size constraints
    pub fn motion(&self, x: i32, y: i32) -> Option<(Window, Geometry)> {
        let session = self.session()?;
        let (ax, ay) = session.anchor;
        Some((
            session.target,
            drag_geometry(session.kind, session.anchor_geometry, x - ax, y - ay),
        ))
    }

    /// Restart the deltas from a new anchor (after unmaximizing mid-drag)
    pub fn rebase(&mut self, anchor: (i32, i32), geometry: Geometry) {
        if let DragState::Dragging(session) = &mut self.state {
            session.anchor = anchor;
            session.anchor_geometry = geometry;
            session.unmaximize_on_motion = false;
        }
    }

    /// Pointer release: leave `Dragging`, returning the finished session
    pub fn finish(&mut self) -> Option<DragSession> {
        match std::mem::take(&mut self.state) {
            DragState::Dragging(session) => Some(session),
            DragState::Idle => None,
        }
    }

    /// Abort the drag; safe when idle
    pub fn cancel(&mut self) -> Option<DragSession> {
        let session = self.finish();
        if let Some(session) = &session {
            debug!("Drag on 0x{:x} cancelled", session.target);
        }
        session
    }

    /// Drop the session if its window went away
    pub fn forget(&mut self, window: Window) -> bool {
        if self.session().is_some_and(|s| s.target == window) {
            self.state = DragState::Idle;
            return true;
        }
        false
    }
}

/// Apply a pointer delta to the anchor geometry. Width and height are
/// clamped at zero; a left or top edge never crosses the opposite edge.
pub fn drag_geometry(kind: DragKind, anchor: Geometry, dx: i32, dy: i32) -> Geometry {
    let direction = match kind {
        DragKind::Move => {
            return Geometry::new(anchor.x + dx, anchor.y + dy, anchor.width, anchor.height);
        }
        DragKind::Resize(direction) => direction,
    };

    let (mut x, mut y) = (anchor.x as i64, anchor.y as i64);
    let (mut w, mut h) = (anchor.width as i64, anchor.height as i64);
    let (dx, dy) = (dx as i64, dy as i64);

    if direction.moves_left_edge() {
        let right = x + w;
        w = (w - dx).max(0);
        x = right - w;
    } else if direction.moves_right_edge() {
        w = (w + dx).max(0);
    }
    if direction.moves_top_edge() {
        let bottom = y + h;
        h = (h - dy).max(0);
        y = bottom - h;
    } else if direction.moves_bottom_edge() {
        h = (h + dy).max(0);
    }

    Geometry::new(x as i32, y as i32, w as u32, h as u32)
}

/// After size constraints changed a resize result, keep the edge opposite
/// the dragged one where the pointer left it.
pub fn reanchor(kind: DragKind, requested: Geometry, width: u32, height: u32) -> Geometry {
    let mut result = Geometry::new(requested.x, requested.y, width, height);
    if let DragKind::Resize(direction) = kind {
        if direction.moves_left_edge() {
            result.x = requested.right() - width as i32;
        }
        if direction.moves_top_edge() {
            result.y = requested.bottom() - height as i32;
        }
    }
    result
}

/// Place a restored geometry under the pointer so the pointer keeps its
/// proportional position across the title bar.
pub fn unmaximize_anchor(pointer: (i32, i32), maximized: Geometry, restored: Geometry) -> Geometry {
    let (px, py) = pointer;
    let ratio = if maximized.width == 0 {
        0.5
    } else {
        ((px - maximized.x) as f64 / maximized.width as f64).clamp(0.0, 1.0)
    };
    let x = px - (ratio * restored.width as f64).round() as i32;
    let y = py - (py - maximized.y).min(restored.height as i32);
    Geometry::new(x, y, restored.width, restored.height)
}
