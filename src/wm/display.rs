//! Display Module
//!
//! Owns the X11 connection: acquires the ICCCM `WM_S{n}` selection, selects
//! SubstructureRedirect on the root and implements [`XConn`] on top of
//! x11rb's `RustConnection`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::errors::ReplyError;
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::{COPY_DEPTH_FROM_PARENT, COPY_FROM_PARENT, NONE};

use crate::error::{allocation_failed, WmError};
use crate::shared::Geometry;
use crate::wm::conn::{
    KeyboardMapping, OutputInfo, Restack, ScreenSize, WindowAttributes, WindowChanges, XConn,
};
use crate::wm::render::Bitmap;

/// Fixed part of a PutImage request
const PUT_IMAGE_HEADER: usize = 24;

/// Live connection to the X server for one screen
pub struct X11Conn {
    conn: Arc<RustConnection>,
    screen_num: usize,
    root: Window,
    root_depth: u8,
    screen_size: ScreenSize,
    /// Owns the WM_S{n} selection and doubles as the EWMH check window
    check_window: Window,
    have_randr: bool,
}

impl X11Conn {
    /// Connect to `$DISPLAY` and become the window manager of its default screen
    ///
    /// With `replace` set, an existing window manager is asked to exit by
    /// taking its selection and waiting for its owner window to disappear.
    pub fn connect(replace: bool) -> Result<Self> {
        let (conn, screen_num) =
            RustConnection::connect(None).context("Failed to connect to X server")?;
        let conn = Arc::new(conn);

        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let root_depth = screen.root_depth;
        let screen_size = ScreenSize {
            width: screen.width_in_pixels as u32,
            height: screen.height_in_pixels as u32,
            width_mm: screen.width_in_millimeters as u32,
            height_mm: screen.height_in_millimeters as u32,
        };
        info!(
            "Connected to X server, screen {}, root 0x{:x}, {}x{}",
            screen_num, root, screen_size.width, screen_size.height
        );

        let check_window = Self::acquire_selection(&conn, screen_num, root, replace)?;

        let mask = EventMask::SUBSTRUCTURE_REDIRECT
            | EventMask::SUBSTRUCTURE_NOTIFY
            | EventMask::STRUCTURE_NOTIFY
            | EventMask::PROPERTY_CHANGE;
        conn.change_window_attributes(root, &ChangeWindowAttributesAux::new().event_mask(mask))?
            .check()
            .map_err(|_| WmError::AnotherWmRunning)?;
        info!("Registered as window manager");

        let have_randr = conn
            .extension_information(randr::X11_EXTENSION_NAME)?
            .is_some();
        if have_randr {
            conn.randr_select_input(
                root,
                randr::NotifyMask::SCREEN_CHANGE
                    | randr::NotifyMask::OUTPUT_CHANGE
                    | randr::NotifyMask::CRTC_CHANGE,
            )?;
        } else {
            warn!("RandR unavailable, treating the root window as a single output");
        }
        conn.flush()?;

        Ok(Self {
            conn,
            screen_num,
            root,
            root_depth,
            screen_size,
            check_window,
            have_randr,
        })
    }

    /// Shared handle for the async event stream
    pub fn connection(&self) -> Arc<RustConnection> {
        Arc::clone(&self.conn)
    }

    pub fn screen_num(&self) -> usize {
        self.screen_num
    }

    pub fn check_window(&self) -> Window {
        self.check_window
    }

    fn acquire_selection(
        conn: &RustConnection,
        screen_num: usize,
        root: Window,
        replace: bool,
    ) -> Result<Window> {
        let selection_name = format!("WM_S{}", screen_num);
        let selection = conn
            .intern_atom(false, selection_name.as_bytes())?
            .reply()
            .context("Failed to intern WM selection atom")?
            .atom;

        let previous_owner = conn
            .get_selection_owner(selection)?
            .reply()
            .context("Failed to get current WM selection owner")?
            .owner;

        if previous_owner != NONE {
            if !replace {
                return Err(WmError::AnotherWmRunning.into());
            }
            info!(
                "Existing WM detected (window 0x{:x}), attempting replace",
                previous_owner
            );
            // Watch the old owner so its destruction is observable
            let _ = conn.change_window_attributes(
                previous_owner,
                &ChangeWindowAttributesAux::new().event_mask(EventMask::STRUCTURE_NOTIFY),
            );
        }

        let owner = conn.generate_id()?;
        conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            owner,
            root,
            -100,
            -100,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            COPY_FROM_PARENT,
            &CreateWindowAux::new().override_redirect(1),
        )?;
        conn.set_selection_owner(owner, selection, x11rb::CURRENT_TIME)?
            .check()
            .context("Failed to set WM selection owner")?;

        let current = conn.get_selection_owner(selection)?.reply()?.owner;
        if current != owner {
            anyhow::bail!(
                "Failed to acquire WM selection ownership (expected 0x{:x}, got 0x{:x})",
                owner,
                current
            );
        }
        debug!("Acquired {} with owner window 0x{:x}", selection_name, owner);

        if previous_owner != NONE {
            let timeout = Duration::from_secs(15);
            let start = Instant::now();
            while start.elapsed() < timeout {
                if conn.get_window_attributes(previous_owner)?.reply().is_err() {
                    info!("Previous WM exited");
                    break;
                }
                std::thread::sleep(Duration::from_millis(100));
            }
        }

        Ok(owner)
    }

    fn fallback_output(&self) -> OutputInfo {
        OutputInfo {
            name: "default".to_string(),
            geometry: Geometry::new(0, 0, self.screen_size.width, self.screen_size.height),
            width_mm: self.screen_size.width_mm,
            primary: true,
        }
    }

    fn randr_outputs(&self) -> Result<Option<Vec<OutputInfo>>> {
        let Some(resources) =
            optional_reply(self.conn.randr_get_screen_resources_current(self.root)?.reply())?
        else {
            return Ok(None);
        };
        let primary = optional_reply(self.conn.randr_get_output_primary(self.root)?.reply())?
            .map(|reply| reply.output)
            .unwrap_or(NONE);

        let mut outputs = Vec::new();
        for &output in &resources.outputs {
            let Some(info) = optional_reply(
                self.conn
                    .randr_get_output_info(output, resources.config_timestamp)?
                    .reply(),
            )?
            else {
                continue;
            };
            if info.connection != randr::Connection::CONNECTED || info.crtc == NONE {
                continue;
            }
            let Some(crtc) = optional_reply(
                self.conn
                    .randr_get_crtc_info(info.crtc, resources.config_timestamp)?
                    .reply(),
            )?
            else {
                continue;
            };
            if crtc.width == 0 || crtc.height == 0 {
                continue;
            }
            outputs.push(OutputInfo {
                name: String::from_utf8_lossy(&info.name).into_owned(),
                geometry: Geometry::new(
                    crtc.x as i32,
                    crtc.y as i32,
                    crtc.width as u32,
                    crtc.height as u32,
                ),
                width_mm: info.mm_width,
                primary: output == primary,
            });
        }
        Ok(Some(outputs))
    }
}

/// Treat protocol errors (window gone, bad config timestamp) as "no value"
/// while still propagating connection failures.
fn optional_reply<T>(result: std::result::Result<T, ReplyError>) -> Result<Option<T>> {
    match result {
        Ok(reply) => Ok(Some(reply)),
        Err(ReplyError::X11Error(error)) => {
            debug!("X11 error on request: {:?}", error.error_kind);
            Ok(None)
        }
        Err(ReplyError::ConnectionError(error)) => Err(error.into()),
    }
}

fn to_i16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn to_u16(value: u32) -> u16 {
    value.clamp(1, u16::MAX as u32) as u16
}

impl XConn for X11Conn {
    fn root(&self) -> Window {
        self.root
    }

    fn screen_size(&self) -> ScreenSize {
        self.screen_size
    }

    fn intern_atom(&self, name: &str) -> Result<Atom> {
        Ok(self.conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
    }

    fn outputs(&self) -> Result<Vec<OutputInfo>> {
        if self.have_randr {
            if let Some(outputs) = self.randr_outputs()? {
                if !outputs.is_empty() {
                    return Ok(outputs);
                }
            }
            debug!("RandR reported no active outputs, using root geometry");
        }
        Ok(vec![self.fallback_output()])
    }

    fn window_attributes(&self, window: Window) -> Result<Option<WindowAttributes>> {
        Ok(
            optional_reply(self.conn.get_window_attributes(window)?.reply())?.map(|attrs| {
                WindowAttributes {
                    override_redirect: attrs.override_redirect,
                    mapped: attrs.map_state != MapState::UNMAPPED,
                }
            }),
        )
    }

    fn geometry(&self, window: Window) -> Result<Option<Geometry>> {
        Ok(
            optional_reply(self.conn.get_geometry(window)?.reply())?.map(|reply| {
                Geometry::new(
                    reply.x as i32,
                    reply.y as i32,
                    reply.width as u32,
                    reply.height as u32,
                )
            }),
        )
    }

    fn property32(&self, window: Window, property: Atom, type_: Atom) -> Result<Vec<u32>> {
        let reply = optional_reply(
            self.conn
                .get_property(false, window, property, type_, 0, u32::MAX)?
                .reply(),
        )?;
        Ok(reply
            .and_then(|reply| reply.value32().map(|values| values.collect()))
            .unwrap_or_default())
    }

    fn text_property(&self, window: Window, property: Atom) -> Result<Option<String>> {
        let Some(reply) = optional_reply(
            self.conn
                .get_property(false, window, property, AtomEnum::ANY, 0, 4096)?
                .reply(),
        )?
        else {
            return Ok(None);
        };
        if reply.type_ == NONE || reply.format != 8 {
            return Ok(None);
        }
        let text = if reply.type_ == u32::from(AtomEnum::STRING) {
            // Latin-1 maps one byte to one code point
            reply.value.iter().map(|&b| b as char).collect()
        } else {
            String::from_utf8_lossy(&reply.value).into_owned()
        };
        Ok(Some(text))
    }

    fn set_property32(&self, window: Window, property: Atom, type_: Atom, data: &[u32]) -> Result<()> {
        self.conn
            .change_property32(PropMode::REPLACE, window, property, type_, data)?;
        Ok(())
    }

    fn set_text_property(&self, window: Window, property: Atom, type_: Atom, value: &str) -> Result<()> {
        self.conn
            .change_property8(PropMode::REPLACE, window, property, type_, value.as_bytes())?;
        Ok(())
    }

    fn delete_property(&self, window: Window, property: Atom) -> Result<()> {
        self.conn.delete_property(window, property)?;
        Ok(())
    }

    fn configure(&self, window: Window, changes: &WindowChanges) -> Result<()> {
        let mut aux = ConfigureWindowAux::new();
        if let Some(x) = changes.x {
            aux = aux.x(x);
        }
        if let Some(y) = changes.y {
            aux = aux.y(y);
        }
        if let Some(width) = changes.width {
            aux = aux.width(width.max(1));
        }
        if let Some(height) = changes.height {
            aux = aux.height(height.max(1));
        }
        if let Some(border) = changes.border_width {
            aux = aux.border_width(border);
        }
        match changes.restack {
            Some(Restack::Above(sibling)) => {
                if let Some(sibling) = sibling {
                    aux = aux.sibling(sibling);
                }
                aux = aux.stack_mode(StackMode::ABOVE);
            }
            Some(Restack::Below(sibling)) => {
                if let Some(sibling) = sibling {
                    aux = aux.sibling(sibling);
                }
                aux = aux.stack_mode(StackMode::BELOW);
            }
            None => {}
        }
        self.conn.configure_window(window, &aux)?;
        Ok(())
    }

    fn map(&self, window: Window) -> Result<()> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap(&self, window: Window) -> Result<()> {
        self.conn.unmap_window(window)?;
        Ok(())
    }

    fn reparent(&self, window: Window, parent: Window, x: i32, y: i32) -> Result<()> {
        self.conn
            .reparent_window(window, parent, to_i16(x), to_i16(y))?;
        Ok(())
    }

    fn set_save_set(&self, window: Window, insert: bool) -> Result<()> {
        let mode = if insert { SetMode::INSERT } else { SetMode::DELETE };
        self.conn.change_save_set(mode, window)?;
        Ok(())
    }

    fn select_input(&self, window: Window, mask: EventMask) -> Result<()> {
        self.conn
            .change_window_attributes(window, &ChangeWindowAttributesAux::new().event_mask(mask))?;
        Ok(())
    }

    fn create_frame(&self, geometry: Geometry, background: u32) -> Result<Window> {
        let frame = self.conn.generate_id()?;
        self.conn
            .create_window(
                COPY_DEPTH_FROM_PARENT,
                frame,
                self.root,
                to_i16(geometry.x),
                to_i16(geometry.y),
                to_u16(geometry.width),
                to_u16(geometry.height),
                0,
                WindowClass::INPUT_OUTPUT,
                COPY_FROM_PARENT,
                &CreateWindowAux::new()
                    .background_pixel(background)
                    .override_redirect(1)
                    .event_mask(
                        EventMask::SUBSTRUCTURE_REDIRECT
                            | EventMask::SUBSTRUCTURE_NOTIFY
                            | EventMask::BUTTON_PRESS
                            | EventMask::BUTTON_RELEASE
                            | EventMask::POINTER_MOTION
                            | EventMask::EXPOSURE,
                    ),
            )?
            .check()
            .map_err(|e| allocation_failed("frame window", e))?;
        Ok(frame)
    }

    fn destroy(&self, window: Window) -> Result<()> {
        self.conn.destroy_window(window)?;
        Ok(())
    }

    fn create_pixmap(&self, drawable: Window, width: u16, height: u16) -> Result<Pixmap> {
        let pixmap = self.conn.generate_id()?;
        self.conn
            .create_pixmap(self.root_depth, pixmap, drawable, width.max(1), height.max(1))?
            .check()
            .map_err(|e| allocation_failed("pixmap", e))?;
        Ok(pixmap)
    }

    fn free_pixmap(&self, pixmap: Pixmap) -> Result<()> {
        self.conn.free_pixmap(pixmap)?;
        Ok(())
    }

    fn create_gc(&self, drawable: Window) -> Result<Gcontext> {
        let gc = self.conn.generate_id()?;
        self.conn
            .create_gc(gc, drawable, &CreateGCAux::new().graphics_exposures(0))?
            .check()
            .map_err(|e| allocation_failed("graphics context", e))?;
        Ok(gc)
    }

    fn free_gc(&self, gc: Gcontext) -> Result<()> {
        self.conn.free_gc(gc)?;
        Ok(())
    }

    fn put_image(&self, drawable: u32, gc: Gcontext, bitmap: &Bitmap, x: i16, y: i16) -> Result<()> {
        if bitmap.width == 0 || bitmap.height == 0 {
            return Ok(());
        }
        let row_bytes = bitmap.width as usize * 4;
        let budget = self
            .conn
            .maximum_request_bytes()
            .saturating_sub(PUT_IMAGE_HEADER);
        let rows_per_request = (budget / row_bytes).max(1);
        let bytes = bitmap.to_bytes();

        for (chunk_index, chunk) in bytes.chunks(rows_per_request * row_bytes).enumerate() {
            let rows = (chunk.len() / row_bytes) as u16;
            let offset = (chunk_index * rows_per_request) as i16;
            self.conn.put_image(
                ImageFormat::Z_PIXMAP,
                drawable,
                gc,
                bitmap.width,
                rows,
                x,
                y.saturating_add(offset),
                0,
                self.root_depth,
                chunk,
            )?;
        }
        Ok(())
    }

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
    ) -> Result<()> {
        self.conn
            .copy_area(src, dst, gc, src_x, src_y, dst_x, dst_y, width, height)?;
        Ok(())
    }

    fn set_background_pixmap(&self, window: Window, pixmap: Pixmap) -> Result<()> {
        self.conn.change_window_attributes(
            window,
            &ChangeWindowAttributesAux::new().background_pixmap(pixmap),
        )?;
        self.conn.clear_area(false, window, 0, 0, 0, 0)?;
        Ok(())
    }

    fn send_client_message(
        &self,
        window: Window,
        message_type: Atom,
        data: [u32; 5],
        mask: EventMask,
    ) -> Result<()> {
        let event = ClientMessageEvent::new(32, window, message_type, data);
        self.conn.send_event(false, window, mask, event)?;
        Ok(())
    }

    fn send_configure_notify(&self, window: Window, geometry: Geometry) -> Result<()> {
        let event = ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: NONE,
            x: to_i16(geometry.x),
            y: to_i16(geometry.y),
            width: to_u16(geometry.width),
            height: to_u16(geometry.height),
            border_width: 0,
            override_redirect: false,
        };
        self.conn
            .send_event(false, window, EventMask::STRUCTURE_NOTIFY, event)?;
        Ok(())
    }

    fn set_input_focus(&self, window: Window, time: u32) -> Result<()> {
        self.conn
            .set_input_focus(InputFocus::POINTER_ROOT, window, time)?;
        Ok(())
    }

    fn grab_pointer(&self, time: u32) -> Result<bool> {
        let reply = self
            .conn
            .grab_pointer(
                false,
                self.root,
                EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                NONE,
                NONE,
                time,
            )?
            .reply()?;
        Ok(reply.status == GrabStatus::SUCCESS)
    }

    fn ungrab_pointer(&self, time: u32) -> Result<()> {
        self.conn.ungrab_pointer(time)?;
        Ok(())
    }

    fn grab_focus_click(&self, window: Window) -> Result<()> {
        self.conn.grab_button(
            true,
            window,
            EventMask::BUTTON_PRESS,
            GrabMode::SYNC,
            GrabMode::ASYNC,
            NONE,
            NONE,
            ButtonIndex::ANY,
            ModMask::ANY,
        )?;
        Ok(())
    }

    fn replay_pointer(&self, time: u32) -> Result<()> {
        self.conn.allow_events(Allow::REPLAY_POINTER, time)?;
        Ok(())
    }

    fn grab_key(&self, keycode: u8, modifiers: u16) -> Result<()> {
        self.conn.grab_key(
            true,
            self.root,
            ModMask::from(modifiers),
            keycode,
            GrabMode::ASYNC,
            GrabMode::ASYNC,
        )?;
        Ok(())
    }

    fn ungrab_all_keys(&self) -> Result<()> {
        self.conn.ungrab_key(Grab::ANY, self.root, ModMask::ANY)?;
        Ok(())
    }

    fn keyboard_mapping(&self) -> Result<KeyboardMapping> {
        let setup = self.conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let reply = self
            .conn
            .get_keyboard_mapping(min, max - min + 1)?
            .reply()?;
        Ok(KeyboardMapping {
            min_keycode: min,
            keysyms_per_keycode: reply.keysyms_per_keycode,
            keysyms: reply.keysyms,
        })
    }

    fn kill_client(&self, window: Window) -> Result<()> {
        self.conn.kill_client(window)?;
        Ok(())
    }

    fn query_tree(&self) -> Result<Vec<Window>> {
        Ok(self.conn.query_tree(self.root)?.reply()?.children)
    }

    fn query_pointer(&self) -> Result<(i32, i32)> {
        let reply = self.conn.query_pointer(self.root)?.reply()?;
        Ok((reply.root_x as i32, reply.root_y as i32))
    }

    fn flush(&self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }
}
