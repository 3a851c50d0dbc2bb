//! Recording X connection for unit tests
//!
//! Serves canned windows, properties and outputs, and records every write
//! request so tests can assert on protocol traffic.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use x11rb::protocol::xproto::{Atom, EventMask, Gcontext, Pixmap, Window};

use crate::error::WmError;
use crate::shared::Geometry;
use crate::wm::conn::{
    KeyboardMapping, OutputInfo, ScreenSize, WindowAttributes, WindowChanges, XConn,
};
use crate::wm::render::Bitmap;

pub const ROOT: Window = 0x1;

/// A write request issued through the seam
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    SetProperty { window: Window, property: Atom, data: Vec<u32> },
    SetText { window: Window, property: Atom, value: String },
    DeleteProperty { window: Window, property: Atom },
    Configure { window: Window, changes: WindowChanges },
    Map(Window),
    Unmap(Window),
    Reparent { window: Window, parent: Window, x: i32, y: i32 },
    SaveSet { window: Window, insert: bool },
    SelectInput(Window),
    CreateFrame { frame: Window, geometry: Geometry },
    Destroy(Window),
    CreatePixmap { pixmap: Pixmap, width: u16, height: u16 },
    FreePixmap(Pixmap),
    CreateGc(Gcontext),
    FreeGc(Gcontext),
    PutImage { drawable: u32, width: u16, height: u16, x: i16, y: i16 },
    CopyArea { src: u32, dst: u32, dst_x: i16, dst_y: i16, width: u16, height: u16 },
    SetBackground { window: Window, pixmap: Pixmap },
    ClientMessage { window: Window, message_type: Atom, data: [u32; 5] },
    ConfigureNotify { window: Window, geometry: Geometry },
    SetFocus(Window),
    GrabPointer,
    UngrabPointer,
    GrabFocusClick(Window),
    ReplayPointer,
    GrabKey { keycode: u8, modifiers: u16 },
    UngrabKeys,
    KillClient(Window),
}

#[derive(Default)]
struct FakeState {
    atoms: HashMap<String, Atom>,
    next_id: u32,
    requests: Vec<Request>,
    properties: HashMap<(Window, Atom), Vec<u32>>,
    texts: HashMap<(Window, Atom), String>,
    attributes: HashMap<Window, WindowAttributes>,
    geometries: HashMap<Window, Geometry>,
    outputs: Vec<OutputInfo>,
    tree: Vec<Window>,
    pointer: (i32, i32),
    fail_pixmaps: bool,
    fail_frames: bool,
    pointer_grabbable: bool,
}

pub struct FakeConn {
    state: Mutex<FakeState>,
}

impl FakeConn {
    /// One 1920x1080 output of roughly 96 dpi
    pub fn new() -> Self {
        let state = FakeState {
            next_id: 0x1000,
            outputs: vec![OutputInfo {
                name: "eDP-1".to_string(),
                geometry: Geometry::new(0, 0, 1920, 1080),
                width_mm: 508,
                primary: true,
            }],
            pointer_grabbable: true,
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    fn record(&self, request: Request) {
        self.with(|state| state.requests.push(request));
    }

    /// Atom for `name`, interning it if needed
    pub fn atom(&self, name: &str) -> Atom {
        self.intern_atom(name).unwrap()
    }

    /// Register a top-level client window
    pub fn add_window(&self, window: Window, geometry: Geometry) {
        self.with(|state| {
            state.attributes.insert(
                window,
                WindowAttributes {
                    override_redirect: false,
                    mapped: false,
                },
            );
            state.geometries.insert(window, geometry);
            state.tree.push(window);
        });
    }

    pub fn set_attributes(&self, window: Window, attributes: WindowAttributes) {
        self.with(|state| {
            state.attributes.insert(window, attributes);
        });
    }

    pub fn remove_window(&self, window: Window) {
        self.with(|state| {
            state.attributes.remove(&window);
            state.geometries.remove(&window);
            state.tree.retain(|&w| w != window);
        });
    }

    pub fn set_prop32(&self, window: Window, property: Atom, data: &[u32]) {
        self.with(|state| {
            state.properties.insert((window, property), data.to_vec());
        });
    }

    pub fn set_text(&self, window: Window, property: Atom, value: &str) {
        self.with(|state| {
            state.texts.insert((window, property), value.to_string());
        });
    }

    pub fn prop32(&self, window: Window, property: Atom) -> Vec<u32> {
        self.with(|state| {
            state
                .properties
                .get(&(window, property))
                .cloned()
                .unwrap_or_default()
        })
    }

    pub fn text(&self, window: Window, property: Atom) -> Option<String> {
        self.with(|state| state.texts.get(&(window, property)).cloned())
    }

    pub fn set_outputs(&self, outputs: Vec<OutputInfo>) {
        self.with(|state| state.outputs = outputs);
    }

    pub fn set_pointer(&self, x: i32, y: i32) {
        self.with(|state| state.pointer = (x, y));
    }

    pub fn fail_pixmaps(&self, fail: bool) {
        self.with(|state| state.fail_pixmaps = fail);
    }

    pub fn fail_frames(&self, fail: bool) {
        self.with(|state| state.fail_frames = fail);
    }

    pub fn set_pointer_grabbable(&self, grabbable: bool) {
        self.with(|state| state.pointer_grabbable = grabbable);
    }

    /// Drain recorded requests
    pub fn take_requests(&self) -> Vec<Request> {
        self.with(|state| std::mem::take(&mut state.requests))
    }

    pub fn request_count(&self) -> usize {
        self.with(|state| state.requests.len())
    }

    /// Last geometry configured for `window`
    pub fn configured(&self, window: Window) -> Option<Geometry> {
        self.with(|state| state.geometries.get(&window).copied())
    }

    fn allocate(&self) -> u32 {
        self.with(|state| {
            state.next_id += 1;
            state.next_id
        })
    }
}

impl Default for FakeConn {
    fn default() -> Self {
        Self::new()
    }
}

impl XConn for FakeConn {
    fn root(&self) -> Window {
        ROOT
    }

    /// The root spans every configured output
    fn screen_size(&self) -> ScreenSize {
        self.with(|state| {
            let width = state.outputs.iter().map(|o| o.geometry.right()).max();
            let height = state.outputs.iter().map(|o| o.geometry.bottom()).max();
            ScreenSize {
                width: width.unwrap_or(1920).max(1) as u32,
                height: height.unwrap_or(1080).max(1) as u32,
                width_mm: 508,
                height_mm: 286,
            }
        })
    }

    fn intern_atom(&self, name: &str) -> Result<Atom> {
        Ok(self.with(|state| {
            let next = 100 + state.atoms.len() as Atom;
            *state.atoms.entry(name.to_string()).or_insert(next)
        }))
    }

    fn outputs(&self) -> Result<Vec<OutputInfo>> {
        Ok(self.with(|state| state.outputs.clone()))
    }

    fn window_attributes(&self, window: Window) -> Result<Option<WindowAttributes>> {
        Ok(self.with(|state| state.attributes.get(&window).copied()))
    }

    fn geometry(&self, window: Window) -> Result<Option<Geometry>> {
        Ok(self.configured(window))
    }

    fn property32(&self, window: Window, property: Atom, _type: Atom) -> Result<Vec<u32>> {
        Ok(self.prop32(window, property))
    }

    fn text_property(&self, window: Window, property: Atom) -> Result<Option<String>> {
        Ok(self.text(window, property))
    }

    fn set_property32(&self, window: Window, property: Atom, _type: Atom, data: &[u32]) -> Result<()> {
        self.set_prop32(window, property, data);
        self.record(Request::SetProperty {
            window,
            property,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn set_text_property(&self, window: Window, property: Atom, _type: Atom, value: &str) -> Result<()> {
        self.set_text(window, property, value);
        self.record(Request::SetText {
            window,
            property,
            value: value.to_string(),
        });
        Ok(())
    }

    fn delete_property(&self, window: Window, property: Atom) -> Result<()> {
        self.with(|state| {
            state.properties.remove(&(window, property));
            state.texts.remove(&(window, property));
        });
        self.record(Request::DeleteProperty { window, property });
        Ok(())
    }

    fn configure(&self, window: Window, changes: &WindowChanges) -> Result<()> {
        self.with(|state| {
            let geometry = state.geometries.entry(window).or_default();
            if let Some(x) = changes.x {
                geometry.x = x;
            }
            if let Some(y) = changes.y {
                geometry.y = y;
            }
            if let Some(width) = changes.width {
                geometry.width = width;
            }
            if let Some(height) = changes.height {
                geometry.height = height;
            }
        });
        self.record(Request::Configure {
            window,
            changes: *changes,
        });
        Ok(())
    }

    fn map(&self, window: Window) -> Result<()> {
        self.with(|state| {
            if let Some(attributes) = state.attributes.get_mut(&window) {
                attributes.mapped = true;
            }
        });
        self.record(Request::Map(window));
        Ok(())
    }

    fn unmap(&self, window: Window) -> Result<()> {
        self.with(|state| {
            if let Some(attributes) = state.attributes.get_mut(&window) {
                attributes.mapped = false;
            }
        });
        self.record(Request::Unmap(window));
        Ok(())
    }

    fn reparent(&self, window: Window, parent: Window, x: i32, y: i32) -> Result<()> {
        self.record(Request::Reparent {
            window,
            parent,
            x,
            y,
        });
        Ok(())
    }

    fn set_save_set(&self, window: Window, insert: bool) -> Result<()> {
        self.record(Request::SaveSet { window, insert });
        Ok(())
    }

    fn select_input(&self, window: Window, _mask: EventMask) -> Result<()> {
        self.record(Request::SelectInput(window));
        Ok(())
    }

    fn create_frame(&self, geometry: Geometry, _background: u32) -> Result<Window> {
        if self.with(|state| state.fail_frames) {
            return Err(WmError::ResourceExhausted("frame window".into()).into());
        }
        let frame = self.allocate();
        self.with(|state| {
            state.geometries.insert(frame, geometry);
            state.attributes.insert(
                frame,
                WindowAttributes {
                    override_redirect: true,
                    mapped: false,
                },
            );
        });
        self.record(Request::CreateFrame { frame, geometry });
        Ok(frame)
    }

    fn destroy(&self, window: Window) -> Result<()> {
        self.record(Request::Destroy(window));
        Ok(())
    }

    fn create_pixmap(&self, _drawable: Window, width: u16, height: u16) -> Result<Pixmap> {
        if self.with(|state| state.fail_pixmaps) {
            return Err(WmError::ResourceExhausted("pixmap".into()).into());
        }
        let pixmap = self.allocate();
        self.record(Request::CreatePixmap {
            pixmap,
            width,
            height,
        });
        Ok(pixmap)
    }

    fn free_pixmap(&self, pixmap: Pixmap) -> Result<()> {
        self.record(Request::FreePixmap(pixmap));
        Ok(())
    }

    fn create_gc(&self, _drawable: Window) -> Result<Gcontext> {
        let gc = self.allocate();
        self.record(Request::CreateGc(gc));
        Ok(gc)
    }

    fn free_gc(&self, gc: Gcontext) -> Result<()> {
        self.record(Request::FreeGc(gc));
        Ok(())
    }

    fn put_image(&self, drawable: u32, _gc: Gcontext, bitmap: &Bitmap, x: i16, y: i16) -> Result<()> {
        self.record(Request::PutImage {
            drawable,
            width: bitmap.width,
            height: bitmap.height,
            x,
            y,
        });
        Ok(())
    }

    fn copy_area(
        &self,
        src: u32,
        dst: u32,
        _gc: Gcontext,
        _src_x: i16,
        _src_y: i16,
        dst_x: i16,
        dst_y: i16,
        width: u16,
        height: u16,
    ) -> Result<()> {
        self.record(Request::CopyArea {
            src,
            dst,
            dst_x,
            dst_y,
            width,
            height,
        });
        Ok(())
    }

    fn set_background_pixmap(&self, window: Window, pixmap: Pixmap) -> Result<()> {
        self.record(Request::SetBackground { window, pixmap });
        Ok(())
    }

    fn send_client_message(
        &self,
        window: Window,
        message_type: Atom,
        data: [u32; 5],
        _mask: EventMask,
    ) -> Result<()> {
        self.record(Request::ClientMessage {
            window,
            message_type,
            data,
        });
        Ok(())
    }

    fn send_configure_notify(&self, window: Window, geometry: Geometry) -> Result<()> {
        self.record(Request::ConfigureNotify { window, geometry });
        Ok(())
    }

    fn set_input_focus(&self, window: Window, _time: u32) -> Result<()> {
        self.record(Request::SetFocus(window));
        Ok(())
    }

    fn grab_pointer(&self, _time: u32) -> Result<bool> {
        self.record(Request::GrabPointer);
        Ok(self.with(|state| state.pointer_grabbable))
    }

    fn ungrab_pointer(&self, _time: u32) -> Result<()> {
        self.record(Request::UngrabPointer);
        Ok(())
    }

    fn grab_focus_click(&self, window: Window) -> Result<()> {
        self.record(Request::GrabFocusClick(window));
        Ok(())
    }

    fn replay_pointer(&self, _time: u32) -> Result<()> {
        self.record(Request::ReplayPointer);
        Ok(())
    }

    fn grab_key(&self, keycode: u8, modifiers: u16) -> Result<()> {
        self.record(Request::GrabKey { keycode, modifiers });
        Ok(())
    }

    fn ungrab_all_keys(&self) -> Result<()> {
        self.record(Request::UngrabKeys);
        Ok(())
    }

    /// Keycode 8 + n maps to the n-th entry: a..z, Return, Tab, Escape,
    /// Up, Down, F4, F11, space
    fn keyboard_mapping(&self) -> Result<KeyboardMapping> {
        let mut keysyms: Vec<u32> = (0x61..=0x7a).collect();
        keysyms.extend([0xff0d, 0xff09, 0xff1b, 0xff52, 0xff54, 0xffc1, 0xffc8, 0x20]);
        Ok(KeyboardMapping {
            min_keycode: 8,
            keysyms_per_keycode: 1,
            keysyms,
        })
    }

    fn kill_client(&self, window: Window) -> Result<()> {
        self.record(Request::KillClient(window));
        Ok(())
    }

    fn query_tree(&self) -> Result<Vec<Window>> {
        Ok(self.with(|state| state.tree.clone()))
    }

    fn query_pointer(&self) -> Result<(i32, i32)> {
        Ok(self.with(|state| state.pointer))
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

