//! Connection Module
//!
//! The protocol seam between the window manager core and the X server.
//! Every request the core makes goes through [`XConn`], so the core never
//! touches a socket directly and can be driven by a recording connection in
//! tests.

use anyhow::Result;
use x11rb::protocol::xproto::{Atom, EventMask, Gcontext, Pixmap, Window};

use crate::shared::Geometry;
use crate::wm::render::Bitmap;

/// Attributes the core needs to decide whether a window is manageable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAttributes {
    pub override_redirect: bool,
    pub mapped: bool,
}

/// Raw output description as reported by RandR
#[derive(Debug, Clone, PartialEq)]
pub struct OutputInfo {
    pub name: String,
    pub geometry: Geometry,
    /// Physical width in millimetres (0 when unknown)
    pub width_mm: u32,
    pub primary: bool,
}

/// Root screen dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
    pub width_mm: u32,
    pub height_mm: u32,
}

/// Stacking request attached to a configure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restack {
    /// Directly above `sibling`, or top of the stack when `None`
    Above(Option<Window>),
    /// Directly below `sibling`, or bottom of the stack when `None`
    Below(Option<Window>),
}

/// A ConfigureWindow request; `None` fields are left untouched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowChanges {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub border_width: Option<u32>,
    pub restack: Option<Restack>,
}

impl WindowChanges {
    pub fn geometry(geometry: Geometry) -> Self {
        Self {
            x: Some(geometry.x),
            y: Some(geometry.y),
            width: Some(geometry.width.max(1)),
            height: Some(geometry.height.max(1)),
            ..Default::default()
        }
    }

    pub fn position(x: i32, y: i32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }

    pub fn restack(restack: Restack) -> Self {
        Self {
            restack: Some(restack),
            ..Default::default()
        }
    }
}

/// Keysym table for the keyboard, as returned by GetKeyboardMapping
#[derive(Debug, Clone, Default)]
pub struct KeyboardMapping {
    pub min_keycode: u8,
    pub keysyms_per_keycode: u8,
    pub keysyms: Vec<u32>,
}

impl KeyboardMapping {
    /// First keycode producing `keysym` in any column
    pub fn keycode_for(&self, keysym: u32) -> Option<u8> {
        let per = self.keysyms_per_keycode.max(1) as usize;
        self.keysyms
            .chunks(per)
            .position(|syms| syms.contains(&keysym))
            .and_then(|index| u8::try_from(index + self.min_keycode as usize).ok())
    }
}

/// Requests the window manager core issues to the display server.
///
/// Query methods return `Ok(None)` or empty values when the target window
/// has already disappeared; only connection-level failures are errors.
pub trait XConn: Send + Sync {
    /// Root window of the managed screen
    fn root(&self) -> Window;

    fn screen_size(&self) -> ScreenSize;

    fn intern_atom(&self, name: &str) -> Result<Atom>;

    /// Enumerate connected outputs with an active CRTC
    fn outputs(&self) -> Result<Vec<OutputInfo>>;

    fn window_attributes(&self, window: Window) -> Result<Option<WindowAttributes>>;

    fn geometry(&self, window: Window) -> Result<Option<Geometry>>;

    /// Read a format-32 property; empty when absent or of the wrong type
    fn property32(&self, window: Window, property: Atom, type_: Atom) -> Result<Vec<u32>>;

    /// Read a text property (UTF8_STRING or STRING), NUL separators kept
    fn text_property(&self, window: Window, property: Atom) -> Result<Option<String>>;

    fn set_property32(&self, window: Window, property: Atom, type_: Atom, data: &[u32]) -> Result<()>;

    fn set_text_property(&self, window: Window, property: Atom, type_: Atom, value: &str) -> Result<()>;

    fn delete_property(&self, window: Window, property: Atom) -> Result<()>;

    fn configure(&self, window: Window, changes: &WindowChanges) -> Result<()>;

    fn map(&self, window: Window) -> Result<()>;

    fn unmap(&self, window: Window) -> Result<()>;

    fn reparent(&self, window: Window, parent: Window, x: i32, y: i32) -> Result<()>;

    /// Add to (or remove from) the save-set so clients survive a WM crash
    fn set_save_set(&self, window: Window, insert: bool) -> Result<()>;

    fn select_input(&self, window: Window, mask: EventMask) -> Result<()>;

    /// Create an override-redirect frame window on the root
    fn create_frame(&self, geometry: Geometry, background: u32) -> Result<Window>;

    fn destroy(&self, window: Window) -> Result<()>;

    fn create_pixmap(&self, drawable: Window, width: u16, height: u16) -> Result<Pixmap>;

    fn free_pixmap(&self, pixmap: Pixmap) -> Result<()>;

    fn create_gc(&self, drawable: Window) -> Result<Gcontext>;

    fn free_gc(&self, gc: Gcontext) -> Result<()>;

    /// Upload ARGB pixels into a drawable at (x, y)
    fn put_image(&self, drawable: u32, gc: Gcontext, bitmap: &Bitmap, x: i16, y: i16) -> Result<()>;

    #[allow(clippy::too_many_arguments)]
    fn copy_area(
        &self,
        src: u32,
        dst: u32,
        gc: Gcontext,
        src_x: i16,
        src_y: i16,
        dst_x: i16,
        dst_y: i16,
        width: u16,
        height: u16,
    ) -> Result<()>;

    /// Set a window's background to a pixmap and repaint it
    fn set_background_pixmap(&self, window: Window, pixmap: Pixmap) -> Result<()>;

    fn send_client_message(
        &self,
        window: Window,
        message_type: Atom,
        data: [u32; 5],
        mask: EventMask,
    ) -> Result<()>;

    /// Synthetic ConfigureNotify telling a client its root-relative geometry
    fn send_configure_notify(&self, window: Window, geometry: Geometry) -> Result<()>;

    fn set_input_focus(&self, window: Window, time: u32) -> Result<()>;

    /// Grab the pointer on the root for a drag; false when already grabbed
    fn grab_pointer(&self, time: u32) -> Result<bool>;

    fn ungrab_pointer(&self, time: u32) -> Result<()>;

    /// Synchronous button grab used for click-to-focus on client windows
    fn grab_focus_click(&self, window: Window) -> Result<()>;

    /// Release a frozen pointer after a click-to-focus grab
    fn replay_pointer(&self, time: u32) -> Result<()>;

    fn grab_key(&self, keycode: u8, modifiers: u16) -> Result<()>;

    fn ungrab_all_keys(&self) -> Result<()>;

    fn keyboard_mapping(&self) -> Result<KeyboardMapping>;

    fn kill_client(&self, window: Window) -> Result<()>;

    /// Top-level children of the root, bottom to top
    fn query_tree(&self) -> Result<Vec<Window>>;

    /// Pointer position in root coordinates
    fn query_pointer(&self) -> Result<(i32, i32)>;

    fn flush(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keycode_lookup() {
        let mapping = KeyboardMapping {
            min_keycode: 8,
            keysyms_per_keycode: 2,
            keysyms: vec![0, 0, 0x61, 0x41, 0xff0d, 0],
        };
        assert_eq!(mapping.keycode_for(0x41), Some(9));
        assert_eq!(mapping.keycode_for(0xff0d), Some(10));
        assert_eq!(mapping.keycode_for(0x7a), None);
    }

    #[test]
    fn test_geometry_changes_clamp_zero_size() {
        let changes = WindowChanges::geometry(Geometry::new(0, 0, 0, 10));
        assert_eq!(changes.width, Some(1));
        assert_eq!(changes.height, Some(10));
    }
}
