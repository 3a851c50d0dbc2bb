//! Surface Renderer
//!
//! Title bar pixels are produced by a [`SurfaceRenderer`] collaborator. The
//! shell normally supplies one; [`SolidRenderer`] draws flat colors so the
//! window manager is usable on its own.

use std::sync::Arc;

use crate::config::WindowColors;
use crate::wm::settings::ButtonSide;

/// ARGB32 pixel buffer, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u16,
    pub height: u16,
    pub pixels: Vec<u32>,
}

impl Bitmap {
    pub fn new(width: u16, height: u16, fill: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill; width as usize * height as usize],
        }
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Fill a rectangle, clipped to the bitmap
    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: u32) {
        let x0 = (x.max(0) as usize).min(self.width as usize);
        let y0 = (y.max(0) as usize).min(self.height as usize);
        let x1 = (x + width as i32).clamp(0, self.width as i32) as usize;
        let y1 = (y + height as i32).clamp(0, self.height as i32) as usize;
        for row in y0..y1 {
            let start = row * self.width as usize;
            for px in &mut self.pixels[start + x0..start + x1.max(x0)] {
                *px = color;
            }
        }
    }

    /// Nearest-neighbour blit of an icon into a `size`x`size` square
    pub fn blit_scaled(&mut self, icon: &Icon, x: i32, y: i32, size: u32) {
        if icon.width == 0 || icon.height == 0 || size == 0 {
            return;
        }
        for dy in 0..size {
            let ty = y + dy as i32;
            if ty < 0 || ty >= self.height as i32 {
                continue;
            }
            let sy = dy * icon.height / size;
            for dx in 0..size {
                let tx = x + dx as i32;
                if tx < 0 || tx >= self.width as i32 {
                    continue;
                }
                let sx = dx * icon.width / size;
                let src = icon.pixels[(sy * icon.width + sx) as usize];
                // Fully transparent icon pixels keep the title background
                if src >> 24 == 0 {
                    continue;
                }
                self.pixels[ty as usize * self.width as usize + tx as usize] = src;
            }
        }
    }

    /// Little-endian byte stream for a 32bpp ZPixmap upload
    pub fn to_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|p| p.to_le_bytes()).collect()
    }
}

/// One `_NET_WM_ICON` image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icon {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

/// Everything the renderer may draw into a title bar
#[derive(Debug, Clone, PartialEq)]
pub struct TitleContent {
    pub title: String,
    pub icon: Option<Arc<Icon>>,
    pub maximizable: bool,
    pub focused: bool,
    /// Integer output scale
    pub scale: u32,
}

/// A title bar control button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlButton {
    Close,
    Maximize,
    Minimize,
}

/// Left-to-right order of the controls inside their strip; the close
/// button always sits at the outer edge of the title bar.
pub fn control_order(side: ButtonSide) -> [ControlButton; 3] {
    match side {
        ButtonSide::Right => [
            ControlButton::Minimize,
            ControlButton::Maximize,
            ControlButton::Close,
        ],
        ButtonSide::Left => [
            ControlButton::Close,
            ControlButton::Maximize,
            ControlButton::Minimize,
        ],
    }
}

/// Horizontal span of control slot `index` within the strip
pub fn control_span(index: usize, button_size: u32, padding: u32, scale: u32) -> (u32, u32) {
    let scale = scale.max(1);
    let start = (padding + index as u32 * (button_size + padding)) * scale;
    (start, start + button_size * scale)
}

/// Which control (if any) lies under strip-relative `x`
pub fn control_at(
    x: i32,
    side: ButtonSide,
    button_size: u32,
    padding: u32,
    scale: u32,
) -> Option<ControlButton> {
    if x < 0 {
        return None;
    }
    let x = x as u32;
    control_order(side)
        .into_iter()
        .enumerate()
        .find(|(index, _)| {
            let (start, end) = control_span(*index, button_size, padding, scale);
            x >= start && x < end
        })
        .map(|(_, button)| button)
}

/// Produces title bar bitmaps from window metadata.
///
/// The title segment has a variable width; the controls segment is fixed
/// and only re-rendered when focus, scale or maximize capability change.
pub trait SurfaceRenderer: Send + Sync {
    fn render_title(&self, content: &TitleContent, width: u16, height: u16) -> Bitmap;

    fn render_controls(&self, content: &TitleContent, width: u16, height: u16) -> Bitmap;
}

/// Flat-color renderer: icon, a block rendition of the title, and
/// colored button swatches.
pub struct SolidRenderer {
    colors: WindowColors,
    button_size: u32,
    button_padding: u32,
    side: ButtonSide,
}

impl SolidRenderer {
    pub fn new(colors: WindowColors, button_size: u32, button_padding: u32, side: ButtonSide) -> Self {
        Self {
            colors,
            button_size,
            button_padding,
            side,
        }
    }

    fn titlebar_color(&self, focused: bool) -> u32 {
        opaque(if focused {
            self.colors.titlebar_focused
        } else {
            self.colors.titlebar
        })
    }
}

fn opaque(rgb: u32) -> u32 {
    0xff00_0000 | (rgb & 0x00ff_ffff)
}

/// Halve each channel, used for disabled controls
fn dim(argb: u32) -> u32 {
    0xff00_0000 | ((argb >> 1) & 0x007f_7f7f)
}

impl SurfaceRenderer for SolidRenderer {
    fn render_title(&self, content: &TitleContent, width: u16, height: u16) -> Bitmap {
        let scale = content.scale.max(1);
        let mut bitmap = Bitmap::new(width, height, self.titlebar_color(content.focused));
        let pad = self.button_padding * scale;
        let mut cursor = pad as i32;

        if let Some(icon) = &content.icon {
            let size = (height as u32).saturating_sub(pad).max(1);
            bitmap.blit_scaled(icon, cursor, (height as i32 - size as i32) / 2, size);
            cursor += (size + pad) as i32;
        }

        let glyph_w = 6 * scale;
        let glyph_gap = 2 * scale;
        let glyph_h = (height as u32 / 3).max(1);
        let glyph_y = (height as i32 - glyph_h as i32) / 2;
        let foreground = if content.focused {
            opaque(self.colors.foreground)
        } else {
            dim(opaque(self.colors.foreground))
        };
        for ch in content.title.chars() {
            if cursor + glyph_w as i32 > width as i32 - pad as i32 {
                break;
            }
            if !ch.is_whitespace() {
                bitmap.fill_rect(cursor, glyph_y, glyph_w, glyph_h, foreground);
            }
            cursor += (glyph_w + glyph_gap) as i32;
        }
        bitmap
    }

    fn render_controls(&self, content: &TitleContent, width: u16, height: u16) -> Bitmap {
        let scale = content.scale.max(1);
        let mut bitmap = Bitmap::new(width, height, self.titlebar_color(content.focused));
        let size = self.button_size * scale;
        let y = (height as i32 - size as i32) / 2;

        for (index, button) in control_order(self.side).into_iter().enumerate() {
            let color = match button {
                ControlButton::Close => opaque(self.colors.close_button),
                ControlButton::Maximize if content.maximizable => {
                    opaque(self.colors.maximize_button)
                }
                ControlButton::Maximize => dim(opaque(self.colors.maximize_button)),
                ControlButton::Minimize => opaque(self.colors.minimize_button),
            };
            let (start, _) = control_span(index, self.button_size, self.button_padding, scale);
            bitmap.fill_rect(start as i32, y, size, size, color);
        }
        bitmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(title: &str) -> TitleContent {
        TitleContent {
            title: title.to_string(),
            icon: None,
            maximizable: true,
            focused: true,
            scale: 1,
        }
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut bitmap = Bitmap::new(4, 4, 0);
        bitmap.fill_rect(-2, 2, 10, 10, 7);
        assert_eq!(bitmap.pixel(0, 1), Some(0));
        assert_eq!(bitmap.pixel(0, 2), Some(7));
        assert_eq!(bitmap.pixel(3, 3), Some(7));
        assert_eq!(bitmap.pixel(4, 0), None);
    }

    #[test]
    fn test_control_layout_right() {
        assert_eq!(
            control_at(8, ButtonSide::Right, 16, 8, 1),
            Some(ControlButton::Minimize)
        );
        assert_eq!(control_at(24, ButtonSide::Right, 16, 8, 1), None);
        assert_eq!(
            control_at(56, ButtonSide::Right, 16, 8, 1),
            Some(ControlButton::Close)
        );
        assert_eq!(
            control_at(8, ButtonSide::Left, 16, 8, 1),
            Some(ControlButton::Close)
        );
    }

    #[test]
    fn test_unmaximizable_button_is_dimmed() {
        let renderer = SolidRenderer::new(WindowColors::default(), 16, 8, ButtonSide::Right);
        let mut fixed = content("dialog");
        fixed.maximizable = false;

        let enabled = renderer.render_controls(&content("dialog"), 80, 32);
        let disabled = renderer.render_controls(&fixed, 80, 32);
        let (start, _) = control_span(1, 16, 8, 1);
        assert_ne!(
            enabled.pixel(start as u16, 16),
            disabled.pixel(start as u16, 16)
        );
        // Close button is unaffected
        let (close, _) = control_span(2, 16, 8, 1);
        assert_eq!(
            enabled.pixel(close as u16, 16),
            disabled.pixel(close as u16, 16)
        );
    }

    #[test]
    fn test_title_glyphs_follow_text() {
        let renderer = SolidRenderer::new(WindowColors::default(), 16, 8, ButtonSide::Right);
        let background = renderer.render_title(&content(""), 200, 30);
        let titled = renderer.render_title(&content("ab"), 200, 30);
        assert!(background.pixels.iter().all(|&p| p == background.pixels[0]));
        assert_ne!(titled, background);
        assert_eq!(titled.width, 200);
        assert_eq!(titled.pixels.len(), 200 * 30);
    }

    #[test]
    fn test_icon_blit_skips_transparent_pixels() {
        let mut bitmap = Bitmap::new(4, 4, 1);
        let icon = Icon {
            width: 2,
            height: 1,
            pixels: vec![0xff00_00ff, 0x0000_0000],
        };
        bitmap.blit_scaled(&icon, 0, 0, 2);
        assert_eq!(bitmap.pixel(0, 0), Some(0xff00_00ff));
        assert_eq!(bitmap.pixel(1, 0), Some(1));
    }
}
