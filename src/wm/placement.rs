//! Placement Module
//!
//! Initial position for a newly managed window: where the client asked to
//! be, otherwise centered in the content bounds of its output.

use tracing::debug;

use crate::shared::Geometry;

/// Outer geometry for a new window of `width` x `height`.
///
/// A requested position is honored as is. Otherwise the window is shrunk
/// to fit `bounds` and centered inside them.
pub fn initial_geometry(
    width: u32,
    height: u32,
    requested: Option<(i32, i32)>,
    bounds: Geometry,
) -> Geometry {
    if let Some((x, y)) = requested {
        debug!("Placing at requested position {},{}", x, y);
        return Geometry::new(x, y, width.max(1), height.max(1));
    }
    let width = width.clamp(1, bounds.width.max(1));
    let height = height.clamp(1, bounds.height.max(1));
    bounds.centered(width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: Geometry = Geometry {
        x: 1920,
        y: 0,
        width: 1920,
        height: 1040,
    };

    #[test]
    fn test_centered_on_bounds() {
        assert_eq!(
            initial_geometry(400, 300, None, BOUNDS),
            Geometry::new(2680, 370, 400, 300)
        );
    }

    #[test]
    fn test_requested_position_kept() {
        assert_eq!(
            initial_geometry(400, 300, Some((10, 20)), BOUNDS),
            Geometry::new(10, 20, 400, 300)
        );
    }

    #[test]
    fn test_oversized_window_shrinks() {
        assert_eq!(
            initial_geometry(4000, 300, None, BOUNDS),
            Geometry::new(1920, 370, 1920, 300)
        );
    }
}
