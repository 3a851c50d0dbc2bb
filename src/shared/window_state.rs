//! Geometry primitives shared by every window manager component
//!
//! Frame geometry, client geometry, output bounds and decoration insets are
//! all expressed with these types so conversions happen in one place.

/// Largest width or height a window can take on the wire (CARD16)
pub const MAX_EXTENT: u32 = u16::MAX as u32;

/// Pull a client-supplied coordinate into the wire's INT16 range
pub fn clamp_coord(value: i32) -> i32 {
    value.clamp(i16::MIN as i32, i16::MAX as i32)
}

/// Pull a client-supplied width or height into the wire's CARD16 range
pub fn clamp_extent(value: u32) -> u32 {
    value.min(MAX_EXTENT)
}

/// Rectangle in root coordinates (or frame-relative for child geometry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Right edge (exclusive)
    pub fn right(&self) -> i32 {
        self.x.saturating_add_unsigned(self.width)
    }

    /// Bottom edge (exclusive)
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add_unsigned(self.height)
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.x.saturating_add_unsigned(self.width / 2),
            self.y.saturating_add_unsigned(self.height / 2),
        )
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Area of the overlap between two rectangles (0 when disjoint)
    pub fn overlap_area(&self, other: &Geometry) -> u64 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return 0;
        }
        (i64::from(right) - i64::from(left)) as u64 * (i64::from(bottom) - i64::from(top)) as u64
    }

    pub fn intersects(&self, other: &Geometry) -> bool {
        self.overlap_area(other) > 0
    }

    /// Center a rectangle of the given size inside `self`
    pub fn centered(&self, width: u32, height: u32) -> Geometry {
        let (cx, cy) = self.center();
        Geometry {
            x: cx.saturating_sub_unsigned(width / 2),
            y: cy.saturating_sub_unsigned(height / 2),
            width,
            height,
        }
    }

    /// Grow by the given insets (client geometry to frame geometry)
    pub fn outset(&self, insets: Insets) -> Geometry {
        Geometry {
            x: self.x.saturating_sub_unsigned(insets.left),
            y: self.y.saturating_sub_unsigned(insets.top),
            width: self.width.saturating_add(insets.horizontal()),
            height: self.height.saturating_add(insets.vertical()),
        }
    }

    /// Shrink by the given insets (frame geometry to client geometry)
    pub fn inset(&self, insets: Insets) -> Geometry {
        Geometry {
            x: self.x.saturating_add_unsigned(insets.left),
            y: self.y.saturating_add_unsigned(insets.top),
            width: self.width.saturating_sub(insets.horizontal()),
            height: self.height.saturating_sub(insets.vertical()),
        }
    }
}

/// Decoration insets: how far the frame extends past the client on each side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Insets {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl Insets {
    pub const NONE: Insets = Insets {
        left: 0,
        right: 0,
        top: 0,
        bottom: 0,
    };

    /// Border on every side plus a title bar on top
    pub fn decorated(border: u32, title: u32) -> Self {
        Self {
            left: border,
            right: border,
            top: border.saturating_add(title),
            bottom: border,
        }
    }

    pub fn horizontal(&self) -> u32 {
        self.left.saturating_add(self.right)
    }

    pub fn vertical(&self) -> u32 {
        self.top.saturating_add(self.bottom)
    }

    /// Order used by `_NET_FRAME_EXTENTS`
    pub fn as_extents(&self) -> [u32; 4] {
        [self.left, self.right, self.top, self.bottom]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outset_inset_are_inverse() {
        let client = Geometry::new(100, 100, 400, 300);
        let insets = Insets::decorated(2, 28);
        let frame = client.outset(insets);
        assert_eq!(frame, Geometry::new(98, 70, 404, 332));
        assert_eq!(frame.inset(insets), client);
    }

    #[test]
    fn test_overlap_area() {
        let a = Geometry::new(0, 0, 100, 100);
        let b = Geometry::new(50, 50, 100, 100);
        let c = Geometry::new(100, 0, 10, 10);
        assert_eq!(a.overlap_area(&b), 2500);
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_centered() {
        let area = Geometry::new(0, 0, 1920, 1040);
        assert_eq!(area.centered(400, 300), Geometry::new(760, 370, 400, 300));
    }

    #[test]
    fn test_edges_saturate() {
        let huge = Geometry::new(i32::MAX - 10, 0, u32::MAX, 100);
        assert_eq!(huge.right(), i32::MAX);
        let frame = Geometry::new(i32::MIN, 0, u32::MAX, 10).outset(Insets::decorated(2, 32));
        assert_eq!(frame.x, i32::MIN);
        assert_eq!(frame.width, u32::MAX);
        assert_eq!(clamp_coord(0x7fff_fff0), i16::MAX as i32);
        assert_eq!(clamp_extent(u32::MAX), MAX_EXTENT);
    }
}
