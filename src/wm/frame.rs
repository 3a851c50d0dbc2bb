//! Frame Compositor
//!
//! Owns every frame window and the off-screen staging pixmaps its title
//! bar is drawn from. The title strip is split in two: a variable-width
//! title segment and a fixed-width controls segment, each cached against
//! the inputs that produced it so a resize re-renders only the title.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};
use x11rb::protocol::xproto::{EventMask, Gcontext, Pixmap, Window};

use crate::error::WmError;
use crate::shared::{clamp_coord, clamp_extent, Geometry};
use crate::wm::client::{Client, FrameMetrics, Visibility};
use crate::wm::conn::{WindowChanges, XConn};
use crate::wm::moveresize::ResizeDirection;
use crate::wm::render::{Bitmap, ControlButton, SurfaceRenderer, TitleContent, control_at};
use crate::wm::settings::{ButtonSide, Settings, controls_width};

/// Events selected on framed client windows. Structure events arrive
/// through the frame's substructure mask.
pub fn client_event_mask() -> EventMask {
    EventMask::PROPERTY_CHANGE | EventMask::FOCUS_CHANGE
}

/// Part of a frame under the pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRegion {
    Control(ControlButton),
    Title,
    Edge(ResizeDirection),
    Client,
}

#[derive(Debug, Clone, PartialEq)]
struct TitleKey {
    title: String,
    icon: Option<usize>,
    focused: bool,
    scale: u32,
    width: u16,
    height: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ControlsKey {
    maximizable: bool,
    focused: bool,
    scale: u32,
    width: u16,
    height: u16,
}

#[derive(Debug, Clone, Copy)]
struct Staging {
    pixmap: Pixmap,
    width: u16,
    height: u16,
}

/// Per-frame render resources
#[derive(Debug, Default)]
struct FrameSurfaces {
    gc: Option<Gcontext>,
    title: Option<Staging>,
    controls: Option<Staging>,
    title_key: Option<TitleKey>,
    controls_key: Option<ControlsKey>,
    /// Where each segment was last copied onto the frame
    title_at: Option<(i32, i32)>,
    controls_at: Option<(i32, i32)>,
    /// Allocation failed; the frame shows its background only
    passthrough: bool,
}

/// Render counters, exposed for diagnostics and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub title_renders: u64,
    pub control_renders: u64,
}

/// Title strip layout inside a frame, frame-relative
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StripLayout {
    title_x: i32,
    title_width: u32,
    controls_x: i32,
    controls_width: u32,
    y: i32,
    height: u32,
}

pub struct FrameCompositor {
    conn: Arc<dyn XConn>,
    settings: Arc<dyn Settings>,
    renderer: Arc<dyn SurfaceRenderer>,
    background: u32,
    surfaces: HashMap<Window, FrameSurfaces>,
    stats: RenderStats,
}

impl FrameCompositor {
    pub fn new(
        conn: Arc<dyn XConn>,
        settings: Arc<dyn Settings>,
        renderer: Arc<dyn SurfaceRenderer>,
        background: u32,
    ) -> Self {
        Self {
            conn,
            settings,
            renderer,
            background,
            surfaces: HashMap::new(),
            stats: RenderStats::default(),
        }
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn button_side(&self) -> ButtonSide {
        self.settings.decoration_button_side()
    }

    /// Border and title thickness at an output scale
    pub fn metrics(&self, scale: u32) -> FrameMetrics {
        let scale = scale.max(1);
        FrameMetrics {
            border: self.settings.border_width() * scale,
            title: self.settings.title_height() * scale,
        }
    }

    fn decorations_visible(client: &Client) -> bool {
        client.decorated && client.visibility != Visibility::Fullscreen
    }

    /// Create the frame window around `client` and reparent the client
    /// into it. `None` when the server cannot allocate the frame; the
    /// caller must not manage the window then.
    pub fn frame(&mut self, client: &mut Client, scale: u32) -> Result<Option<Window>> {
        let insets = client.insets(self.metrics(scale));
        let frame = match self.conn.create_frame(client.geometry, self.background) {
            Ok(frame) => frame,
            Err(e) if WmError::is_resource_exhausted(&e) => {
                warn!("Cannot frame 0x{:x}: {:#}", client.window, e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        client.frame = frame;
        client.child_geometry = Geometry::new(
            insets.left as i32,
            insets.top as i32,
            client.geometry.width.saturating_sub(insets.horizontal()).max(1),
            client.geometry.height.saturating_sub(insets.vertical()).max(1),
        );

        self.conn.set_save_set(client.window, true)?;
        self.conn.reparent(
            client.window,
            frame,
            client.child_geometry.x,
            client.child_geometry.y,
        )?;
        self.conn.configure(
            client.window,
            &WindowChanges {
                width: Some(client.child_geometry.width),
                height: Some(client.child_geometry.height),
                border_width: Some(0),
                ..Default::default()
            },
        )?;
        self.conn.select_input(client.window, client_event_mask())?;
        self.conn.grab_focus_click(client.window)?;
        self.surfaces.insert(client.window, FrameSurfaces::default());
        debug!("Framed 0x{:x} in 0x{:x}", client.window, frame);
        Ok(Some(frame))
    }

    fn layout(&self, client: &Client, scale: u32) -> StripLayout {
        let metrics = self.metrics(scale);
        let controls = controls_width(self.settings.as_ref(), scale)
            .min(client.geometry.width.saturating_sub(2 * metrics.border));
        let title = client
            .geometry
            .width
            .saturating_sub(2 * metrics.border + controls)
            .max(1);
        let border = metrics.border as i32;
        let (title_x, controls_x) = match self.settings.decoration_button_side() {
            ButtonSide::Right => (border, border + title as i32),
            ButtonSide::Left => (border + controls as i32, border),
        };
        StripLayout {
            title_x,
            title_width: title,
            controls_x,
            controls_width: controls.max(1),
            y: border,
            height: metrics.title.max(1),
        }
    }

    /// Allocate the GC and both staging pixmaps, resizing a stale one.
    /// Allocation failure switches the frame to passthrough.
    pub fn ensure(&mut self, client: &Client, scale: u32) -> Result<()> {
        if !client.is_framed() || !Self::decorations_visible(client) {
            return Ok(());
        }
        let layout = self.layout(client, scale);
        let conn = Arc::clone(&self.conn);
        let surfaces = self.surfaces.entry(client.window).or_default();
        if surfaces.passthrough {
            return Ok(());
        }

        let result = (|| -> Result<()> {
            if surfaces.gc.is_none() {
                surfaces.gc = Some(conn.create_gc(client.frame)?);
            }
            let title_size = (clamp16(layout.title_width), clamp16(layout.height));
            if surfaces.title.is_none_or(|s| (s.width, s.height) != title_size) {
                if let Some(old) = surfaces.title.take() {
                    conn.free_pixmap(old.pixmap)?;
                }
                surfaces.title_key = None;
                surfaces.title = Some(Staging {
                    pixmap: conn.create_pixmap(client.frame, title_size.0, title_size.1)?,
                    width: title_size.0,
                    height: title_size.1,
                });
            }
            let controls_size = (clamp16(layout.controls_width), clamp16(layout.height));
            if surfaces
                .controls
                .is_none_or(|s| (s.width, s.height) != controls_size)
            {
                if let Some(old) = surfaces.controls.take() {
                    conn.free_pixmap(old.pixmap)?;
                }
                surfaces.controls_key = None;
                surfaces.controls = Some(Staging {
                    pixmap: conn.create_pixmap(client.frame, controls_size.0, controls_size.1)?,
                    width: controls_size.0,
                    height: controls_size.1,
                });
            }
            Ok(())
        })();

        match result {
            Ok(()) => Ok(()),
            Err(e) if WmError::is_fatal(&e) => Err(e),
            Err(e) => {
                warn!(
                    "Decoration resources for 0x{:x} unavailable, using passthrough: {:#}",
                    client.window, e
                );
                release_surfaces(conn.as_ref(), surfaces);
                surfaces.passthrough = true;
                Ok(())
            }
        }
    }

    /// Re-render stale segments (or all of them when `force` is set) and
    /// blit the segments whose frame pixels are out of date
    pub fn repaint(&mut self, client: &Client, force: bool, scale: u32) -> Result<()> {
        if !client.is_framed() || !Self::decorations_visible(client) {
            return Ok(());
        }
        self.ensure(client, scale)?;
        let layout = self.layout(client, scale);
        let Some(surfaces) = self.surfaces.get_mut(&client.window) else {
            return Ok(());
        };
        let (Some(gc), Some(title), Some(controls)) =
            (surfaces.gc, surfaces.title, surfaces.controls)
        else {
            return Ok(());
        };

        let content = TitleContent {
            title: client.properties.title.clone(),
            icon: client.properties.icon.clone(),
            maximizable: client.maximizable(),
            focused: client.focused,
            scale: scale.max(1),
        };

        let title_key = TitleKey {
            title: content.title.clone(),
            icon: content.icon.as_ref().map(|icon| Arc::as_ptr(icon) as usize),
            focused: content.focused,
            scale: content.scale,
            width: title.width,
            height: title.height,
        };
        if force || surfaces.title_key.as_ref() != Some(&title_key) {
            let bitmap = self
                .renderer
                .render_title(&content, title.width, title.height);
            upload(self.conn.as_ref(), title.pixmap, gc, &bitmap)?;
            surfaces.title_key = Some(title_key);
            surfaces.title_at = None;
            self.stats.title_renders += 1;
        }

        let controls_key = ControlsKey {
            maximizable: content.maximizable,
            focused: content.focused,
            scale: content.scale,
            width: controls.width,
            height: controls.height,
        };
        if force || surfaces.controls_key != Some(controls_key) {
            let bitmap = self
                .renderer
                .render_controls(&content, controls.width, controls.height);
            upload(self.conn.as_ref(), controls.pixmap, gc, &bitmap)?;
            surfaces.controls_key = Some(controls_key);
            surfaces.controls_at = None;
            self.stats.control_renders += 1;
        }

        let title_at = (layout.title_x, layout.y);
        if surfaces.title_at != Some(title_at) {
            self.conn.copy_area(
                title.pixmap,
                client.frame,
                gc,
                0,
                0,
                title_at.0 as i16,
                title_at.1 as i16,
                title.width,
                title.height,
            )?;
            surfaces.title_at = Some(title_at);
        }
        let controls_at = (layout.controls_x, layout.y);
        if surfaces.controls_at != Some(controls_at) {
            self.conn.copy_area(
                controls.pixmap,
                client.frame,
                gc,
                0,
                0,
                controls_at.0 as i16,
                controls_at.1 as i16,
                controls.width,
                controls.height,
            )?;
            surfaces.controls_at = Some(controls_at);
        }
        Ok(())
    }

    /// The server dropped the frame's contents; copy both segments again
    /// on the next repaint
    pub fn expose(&mut self, window: Window) {
        if let Some(surfaces) = self.surfaces.get_mut(&window) {
            surfaces.title_at = None;
            surfaces.controls_at = None;
        }
    }

    /// Outer size after applying the client's size hints to the inner
    /// area. Maximized and fullscreen windows fill their area exactly.
    pub fn constrained_size(&self, client: &Client, width: u32, height: u32, scale: u32) -> (u32, u32) {
        let insets = client.insets(self.metrics(scale));
        if client.visibility != Visibility::Normal {
            return (
                width.max(insets.horizontal().saturating_add(1)),
                height.max(insets.vertical().saturating_add(1)),
            );
        }
        let inner_w = width.saturating_sub(insets.horizontal());
        let inner_h = height.saturating_sub(insets.vertical());
        let (inner_w, inner_h) = client.size_hints.constrain(inner_w, inner_h);
        (
            inner_w.saturating_add(insets.horizontal()),
            inner_h.saturating_add(insets.vertical()),
        )
    }

    /// Move/resize a frame to outer geometry (x, y, w, h). Without `force`
    /// an unchanged geometry issues no requests at all. Returns whether
    /// anything was applied.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_geometry(
        &mut self,
        client: &mut Client,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        force: bool,
        scale: u32,
    ) -> Result<bool> {
        let (width, height) = self.constrained_size(client, width, height, scale);
        let target = Geometry::new(
            clamp_coord(x),
            clamp_coord(y),
            clamp_extent(width),
            clamp_extent(height),
        );
        if target == client.geometry && !force {
            return Ok(false);
        }

        let insets = client.insets(self.metrics(scale));
        let resized = (target.width, target.height) != (client.geometry.width, client.geometry.height);
        client.geometry = target;
        client.child_geometry = Geometry::new(
            insets.left as i32,
            insets.top as i32,
            target.width.saturating_sub(insets.horizontal()).max(1),
            target.height.saturating_sub(insets.vertical()).max(1),
        );

        if client.is_framed() {
            self.conn
                .configure(client.frame, &WindowChanges::geometry(target))?;
            self.conn
                .configure(client.window, &WindowChanges::geometry(client.child_geometry))?;
        } else {
            self.conn
                .configure(client.window, &WindowChanges::geometry(target))?;
        }
        self.conn
            .send_configure_notify(client.window, client.client_geometry())?;

        if resized || force {
            self.repaint(client, false, scale)?;
        }
        Ok(true)
    }

    /// Toggle decoration, keeping the client area for normal windows
    pub fn set_decorated(&mut self, client: &mut Client, decorated: bool, scale: u32) -> Result<bool> {
        let Some(outer) = client.set_decorated(decorated, self.metrics(scale)) else {
            return Ok(false);
        };
        if !decorated {
            self.release(client.window);
            self.surfaces.insert(client.window, FrameSurfaces::default());
        }
        self.apply_geometry(client, outer.x, outer.y, outer.width, outer.height, true, scale)?;
        Ok(true)
    }

    /// Drop cached renders so the next repaint redraws everything
    pub fn invalidate(&mut self, window: Window) {
        if let Some(surfaces) = self.surfaces.get_mut(&window) {
            surfaces.title_key = None;
            surfaces.controls_key = None;
            surfaces.title_at = None;
            surfaces.controls_at = None;
        }
    }

    /// Free staging pixmaps and GC for a client
    pub fn release(&mut self, window: Window) {
        if let Some(mut surfaces) = self.surfaces.remove(&window) {
            release_surfaces(self.conn.as_ref(), &mut surfaces);
        }
    }

    /// Tear the frame down: free render resources, optionally hand the
    /// client back to the root at its current position, and destroy the
    /// frame window. Runs at most once per frame.
    pub fn destroy(&mut self, client: &mut Client, reparent_to_root: bool) -> Result<()> {
        self.release(client.window);
        if !client.is_framed() {
            return Ok(());
        }
        let frame = std::mem::replace(&mut client.frame, 0);
        if reparent_to_root {
            let inner = Geometry::new(
                client.geometry.x + client.child_geometry.x,
                client.geometry.y + client.child_geometry.y,
                client.child_geometry.width,
                client.child_geometry.height,
            );
            self.conn
                .reparent(client.window, self.conn.root(), inner.x, inner.y)?;
            self.conn.set_save_set(client.window, false)?;
            client.geometry = inner;
            client.child_geometry = Geometry::new(0, 0, inner.width, inner.height);
        }
        self.conn.destroy(frame)?;
        debug!("Destroyed frame 0x{:x} of 0x{:x}", frame, client.window);
        Ok(())
    }

    pub fn is_passthrough(&self, window: Window) -> bool {
        self.surfaces.get(&window).is_some_and(|s| s.passthrough)
    }

    /// Classify a frame-relative point
    pub fn hit_test(&self, client: &Client, x: i32, y: i32, scale: u32) -> FrameRegion {
        let scale = scale.max(1);
        let metrics = self.metrics(scale);
        let w = client.geometry.width as i32;
        let h = client.geometry.height as i32;

        if client.visibility == Visibility::Normal {
            let edge = (metrics.border as i32).max(4 * scale as i32);
            let corner = 16 * scale as i32;
            let left = x < edge;
            let right = x >= w - edge;
            let top = y < edge;
            let bottom = y >= h - edge;
            let near_left = x < corner;
            let near_right = x >= w - corner;
            let near_top = y < corner;
            let near_bottom = y >= h - corner;

            let direction = if (top && near_left) || (left && near_top) {
                Some(ResizeDirection::TopLeft)
            } else if (top && near_right) || (right && near_top) {
                Some(ResizeDirection::TopRight)
            } else if (bottom && near_left) || (left && near_bottom) {
                Some(ResizeDirection::BottomLeft)
            } else if (bottom && near_right) || (right && near_bottom) {
                Some(ResizeDirection::BottomRight)
            } else if top {
                Some(ResizeDirection::Top)
            } else if bottom {
                Some(ResizeDirection::Bottom)
            } else if left {
                Some(ResizeDirection::Left)
            } else if right {
                Some(ResizeDirection::Right)
            } else {
                None
            };
            if let Some(direction) = direction {
                // Decorated windows keep their top edge for the title bar
                // except at the corners
                let corner_hit = matches!(
                    direction,
                    ResizeDirection::TopLeft | ResizeDirection::TopRight
                );
                if direction != ResizeDirection::Top || corner_hit || !Self::decorations_visible(client) || y < metrics.border as i32 {
                    return FrameRegion::Edge(direction);
                }
            }
        }

        if !Self::decorations_visible(client) {
            return FrameRegion::Client;
        }
        let layout = self.layout(client, scale);
        if y >= layout.y && y < layout.y + layout.height as i32 {
            let strip_x = x - layout.controls_x;
            if strip_x >= 0 && strip_x < layout.controls_width as i32 {
                if let Some(button) = control_at(
                    strip_x,
                    self.settings.decoration_button_side(),
                    self.settings.button_size(),
                    self.settings.button_padding(),
                    scale,
                ) {
                    return FrameRegion::Control(button);
                }
            }
            return FrameRegion::Title;
        }
        if y < layout.y + layout.height as i32 {
            return FrameRegion::Title;
        }
        FrameRegion::Client
    }
}

fn clamp16(value: u32) -> u16 {
    value.clamp(1, u16::MAX as u32) as u16
}

fn upload(conn: &dyn XConn, pixmap: Pixmap, gc: Gcontext, bitmap: &Bitmap) -> Result<()> {
    conn.put_image(pixmap, gc, bitmap, 0, 0)
}

fn release_surfaces(conn: &dyn XConn, surfaces: &mut FrameSurfaces) {
    for staging in [surfaces.title.take(), surfaces.controls.take()]
        .into_iter()
        .flatten()
    {
        if let Err(e) = conn.free_pixmap(staging.pixmap) {
            debug!("Failed to free staging pixmap: {:#}", e);
        }
    }
    if let Some(gc) = surfaces.gc.take() {
        if let Err(e) = conn.free_gc(gc) {
            debug!("Failed to free GC: {:#}", e);
        }
    }
    surfaces.title_key = None;
    surfaces.controls_key = None;
    surfaces.title_at = None;
    surfaces.controls_at = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DecorationConfig, WindowColors};
    use crate::wm::render::SolidRenderer;
    use crate::wm::testing::{FakeConn, Request};

    fn setup() -> (Arc<FakeConn>, FrameCompositor) {
        let conn = Arc::new(FakeConn::new());
        let settings = DecorationConfig {
            titlebar_height: 28,
            ..Default::default()
        };
        let renderer = SolidRenderer::new(WindowColors::default(), 16, 8, ButtonSide::Right);
        let compositor = FrameCompositor::new(
            conn.clone(),
            Arc::new(settings),
            Arc::new(renderer),
            0x2e3440,
        );
        (conn, compositor)
    }

    fn framed(conn: &FakeConn, compositor: &mut FrameCompositor) -> Client {
        conn.add_window(0x200, Geometry::new(0, 0, 396, 270));
        let mut client = Client::new(0x200, Geometry::new(0, 0, 396, 270));
        client.geometry = Geometry::new(100, 100, 400, 300);
        compositor.frame(&mut client, 1).unwrap().unwrap();
        client
    }

    #[test]
    fn test_frame_reparents_client_inside_insets() {
        let (conn, mut compositor) = setup();
        let client = framed(&conn, &mut compositor);
        assert_eq!(client.child_geometry, Geometry::new(2, 30, 396, 268));
        let requests = conn.take_requests();
        assert!(requests.contains(&Request::Reparent {
            window: 0x200,
            parent: client.frame,
            x: 2,
            y: 30,
        }));
        assert!(requests.contains(&Request::SaveSet {
            window: 0x200,
            insert: true,
        }));
    }

    #[test]
    fn test_frame_failure_returns_none() {
        let (conn, mut compositor) = setup();
        conn.fail_frames(true);
        let mut client = Client::new(0x200, Geometry::new(0, 0, 100, 100));
        assert_eq!(compositor.frame(&mut client, 1).unwrap(), None);
        assert!(!client.is_framed());
    }

    #[test]
    fn test_unchanged_geometry_is_a_no_op() {
        let (conn, mut compositor) = setup();
        let mut client = framed(&conn, &mut compositor);
        compositor
            .apply_geometry(&mut client, 100, 100, 400, 300, true, 1)
            .unwrap();
        conn.take_requests();

        let applied = compositor
            .apply_geometry(&mut client, 100, 100, 400, 300, false, 1)
            .unwrap();
        assert!(!applied);
        assert_eq!(conn.request_count(), 0);
    }

    #[test]
    fn test_resize_rerenders_title_only() {
        let (conn, mut compositor) = setup();
        let mut client = framed(&conn, &mut compositor);
        compositor.repaint(&client, false, 1).unwrap();
        assert_eq!(
            compositor.stats(),
            RenderStats {
                title_renders: 1,
                control_renders: 1
            }
        );

        for width in [420, 440, 460] {
            compositor
                .apply_geometry(&mut client, 100, 100, width, 300, false, 1)
                .unwrap();
        }
        assert_eq!(compositor.stats().title_renders, 4);
        assert_eq!(compositor.stats().control_renders, 1);

        // Pure moves reuse both segments
        compositor
            .apply_geometry(&mut client, 150, 120, 460, 300, false, 1)
            .unwrap();
        assert_eq!(compositor.stats().title_renders, 4);
    }

    fn copies(requests: &[Request]) -> usize {
        requests
            .iter()
            .filter(|r| matches!(r, Request::CopyArea { .. }))
            .count()
    }

    #[test]
    fn test_repaint_copies_only_stale_segments() {
        let (conn, mut compositor) = setup();
        let mut client = framed(&conn, &mut compositor);
        compositor.repaint(&client, false, 1).unwrap();
        assert_eq!(copies(&conn.take_requests()), 2);

        compositor.repaint(&client, false, 1).unwrap();
        assert_eq!(copies(&conn.take_requests()), 0);

        client.properties.title = "Renamed".to_string();
        compositor.repaint(&client, false, 1).unwrap();
        let requests = conn.take_requests();
        assert_eq!(copies(&requests), 1);
        let title = compositor.surfaces[&0x200].title.unwrap().pixmap;
        assert!(requests
            .iter()
            .any(|r| matches!(r, Request::CopyArea { src, .. } if *src == title)));

        compositor.expose(0x200);
        compositor.repaint(&client, false, 1).unwrap();
        assert_eq!(copies(&conn.take_requests()), 2);
        assert_eq!(compositor.stats().control_renders, 1);
    }

    #[test]
    fn test_focus_change_rerenders_both() {
        let (conn, mut compositor) = setup();
        let mut client = framed(&conn, &mut compositor);
        compositor.repaint(&client, false, 1).unwrap();
        compositor.repaint(&client, false, 1).unwrap();
        assert_eq!(compositor.stats().title_renders, 1);

        client.focused = true;
        compositor.repaint(&client, false, 1).unwrap();
        assert_eq!(
            compositor.stats(),
            RenderStats {
                title_renders: 2,
                control_renders: 2
            }
        );
        compositor.repaint(&client, true, 1).unwrap();
        assert_eq!(compositor.stats().control_renders, 3);
    }

    #[test]
    fn test_size_hints_constrain_inner_size() {
        let (conn, mut compositor) = setup();
        let mut client = framed(&conn, &mut compositor);
        let mut hints = vec![0u32; 18];
        hints[0] = 1 << 4;
        hints[5] = 300;
        hints[6] = 200;
        client.size_hints = crate::wm::hints::SizeHints::parse(&hints).unwrap();

        compositor
            .apply_geometry(&mut client, 0, 0, 100, 100, false, 1)
            .unwrap();
        assert_eq!(client.child_geometry.width, 300);
        assert_eq!(client.child_geometry.height, 200);
        assert_eq!(client.geometry, Geometry::new(0, 0, 304, 232));
    }

    #[test]
    fn test_pixmap_failure_degrades_to_passthrough() {
        let (conn, mut compositor) = setup();
        let client = framed(&conn, &mut compositor);
        conn.fail_pixmaps(true);
        compositor.repaint(&client, true, 1).unwrap();
        assert!(compositor.is_passthrough(0x200));
        assert_eq!(compositor.stats().title_renders, 0);
        // The GC allocated before the failure was released again
        let requests = conn.take_requests();
        assert!(requests.iter().any(|r| matches!(r, Request::FreeGc(_))));
    }

    #[test]
    fn test_toggle_decoration_keeps_client_geometry() {
        let (conn, mut compositor) = setup();
        let mut client = framed(&conn, &mut compositor);
        let before = client.client_geometry();

        assert!(compositor.set_decorated(&mut client, false, 1).unwrap());
        assert_eq!(client.client_geometry(), before);
        assert_eq!(client.geometry, before);

        assert!(compositor.set_decorated(&mut client, true, 1).unwrap());
        assert_eq!(client.client_geometry(), before);
        assert_eq!(client.geometry, Geometry::new(100, 100, 400, 300));
    }

    #[test]
    fn test_destroy_frees_once() {
        let (conn, mut compositor) = setup();
        let mut client = framed(&conn, &mut compositor);
        let frame = client.frame;
        compositor.repaint(&client, false, 1).unwrap();
        conn.take_requests();

        compositor.destroy(&mut client, true).unwrap();
        compositor.destroy(&mut client, true).unwrap();
        let requests = conn.take_requests();
        let destroys = requests
            .iter()
            .filter(|r| **r == Request::Destroy(frame))
            .count();
        let frees = requests
            .iter()
            .filter(|r| matches!(r, Request::FreePixmap(_)))
            .count();
        assert_eq!(destroys, 1);
        assert_eq!(frees, 2);
        assert!(!client.is_framed());
        assert_eq!(client.geometry, Geometry::new(102, 130, 396, 268));
    }

    #[test]
    fn test_hit_test_regions() {
        let (conn, mut compositor) = setup();
        let client = framed(&conn, &mut compositor);
        // Frame is 400x300, border 2, title 28, controls 80 wide at x=318
        assert_eq!(
            compositor.hit_test(&client, 0, 0, 1),
            FrameRegion::Edge(ResizeDirection::TopLeft)
        );
        assert_eq!(
            compositor.hit_test(&client, 399, 150, 1),
            FrameRegion::Edge(ResizeDirection::Right)
        );
        assert_eq!(
            compositor.hit_test(&client, 5, 299, 1),
            FrameRegion::Edge(ResizeDirection::BottomLeft)
        );
        assert_eq!(compositor.hit_test(&client, 150, 15, 1), FrameRegion::Title);
        assert_eq!(
            compositor.hit_test(&client, 318 + 56 + 4, 15, 1),
            FrameRegion::Control(ControlButton::Close)
        );
        assert_eq!(compositor.hit_test(&client, 200, 200, 1), FrameRegion::Client);
    }
}
