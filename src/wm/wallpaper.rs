//! Root background
//!
//! The gradient is rendered on a blocking worker and handed back to the
//! event loop, which uploads it as the root background pixmap.

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use x11rb::protocol::xproto::Pixmap;

use crate::config::WallpaperConfig;
use crate::wm::conn::XConn;
use crate::wm::render::Bitmap;

/// Vertical gradient from `top` to `bottom` (0xRRGGBB)
pub fn gradient(width: u16, height: u16, top: u32, bottom: u32) -> Bitmap {
    let mut bitmap = Bitmap::new(width, height, 0);
    let span = height.saturating_sub(1).max(1) as u32;
    for row in 0..height {
        let color = blend(top, bottom, row as u32, span);
        bitmap.fill_rect(0, row as i32, width as u32, 1, color);
    }
    bitmap
}

fn blend(from: u32, to: u32, step: u32, span: u32) -> u32 {
    let channel = |shift: u32| {
        let a = (from >> shift) & 0xff;
        let b = (to >> shift) & 0xff;
        let value = (a * (span - step) + b * step) / span;
        value << shift
    };
    0xff00_0000 | channel(16) | channel(8) | channel(0)
}

/// Render off the event loop and send the result back
pub fn spawn_render(
    config: &WallpaperConfig,
    width: u32,
    height: u32,
    tx: mpsc::UnboundedSender<Bitmap>,
) {
    if !config.enabled {
        return;
    }
    let (top, bottom) = (config.top, config.bottom);
    let width = width.clamp(1, u16::MAX as u32) as u16;
    let height = height.clamp(1, u16::MAX as u32) as u16;
    tokio::spawn(async move {
        match tokio::task::spawn_blocking(move || gradient(width, height, top, bottom)).await {
            Ok(bitmap) => {
                if tx.send(bitmap).is_err() {
                    debug!("Wallpaper receiver gone");
                }
            }
            Err(e) => warn!("Wallpaper render failed: {}", e),
        }
    });
}

/// Owner of the current root background pixmap
#[derive(Debug, Default)]
pub struct Wallpaper {
    pixmap: Option<Pixmap>,
}

impl Wallpaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload a rendered bitmap and install it on the root window,
    /// freeing the previous pixmap
    pub fn apply(&mut self, conn: &dyn XConn, bitmap: &Bitmap) -> Result<()> {
        let root = conn.root();
        let pixmap = conn.create_pixmap(root, bitmap.width, bitmap.height)?;
        let gc = match conn.create_gc(pixmap) {
            Ok(gc) => gc,
            Err(e) => {
                conn.free_pixmap(pixmap)?;
                return Err(e);
            }
        };
        let upload = conn.put_image(pixmap, gc, bitmap, 0, 0);
        conn.free_gc(gc)?;
        if let Err(e) = upload {
            conn.free_pixmap(pixmap)?;
            return Err(e);
        }
        conn.set_background_pixmap(root, pixmap)?;
        if let Some(old) = self.pixmap.replace(pixmap) {
            conn.free_pixmap(old)?;
        }
        info!("Wallpaper set ({}x{})", bitmap.width, bitmap.height);
        Ok(())
    }

    pub fn release(&mut self, conn: &dyn XConn) -> Result<()> {
        if let Some(pixmap) = self.pixmap.take() {
            conn.free_pixmap(pixmap)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::testing::{FakeConn, ROOT, Request};

    #[test]
    fn test_gradient_endpoints() {
        let bitmap = gradient(4, 11, 0x000000, 0xff8040);
        assert_eq!(bitmap.pixel(0, 0), Some(0xff00_0000));
        assert_eq!(bitmap.pixel(3, 10), Some(0xffff_8040));
        assert_eq!(bitmap.pixel(2, 5), Some(0xff7f_4020));
    }

    #[test]
    fn test_single_row_gradient() {
        let bitmap = gradient(2, 1, 0x102030, 0xffffff);
        assert_eq!(bitmap.pixel(1, 0), Some(0xff10_2030));
    }

    #[test]
    fn test_apply_replaces_previous_pixmap() {
        let conn = FakeConn::new();
        let mut wallpaper = Wallpaper::new();
        let bitmap = gradient(8, 8, 0, 0xffffff);
        wallpaper.apply(&conn, &bitmap).unwrap();
        wallpaper.apply(&conn, &bitmap).unwrap();

        let requests = conn.take_requests();
        let first = requests
            .iter()
            .find_map(|r| match r {
                Request::SetBackground { window: ROOT, pixmap } => Some(*pixmap),
                _ => None,
            })
            .unwrap();
        assert!(requests.contains(&Request::FreePixmap(first)));
        wallpaper.release(&conn).unwrap();
        assert_eq!(
            conn.take_requests()
                .iter()
                .filter(|r| matches!(r, Request::FreePixmap(_)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_render_runs_in_background() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_render(&WallpaperConfig::default(), 16, 9, tx);
        let bitmap = rx.recv().await.unwrap();
        assert_eq!((bitmap.width, bitmap.height), (16, 9));
    }
}
