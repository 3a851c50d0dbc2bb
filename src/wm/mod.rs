//! Window Manager Module
//!
//! [`WindowManager`] owns every component (client records, outputs, frames,
//! stacking, focus, drags) and routes translated events to them. There is
//! no global state; the event loop in `main` drives one instance.

pub mod click;
pub mod client;
pub mod client_flags;
pub mod conn;
pub mod display;
pub mod events;
pub mod ewmh;
pub mod focus;
pub mod frame;
pub mod hints;
pub mod keyboard;
pub mod moveresize;
pub mod pending;
pub mod placement;
pub mod render;
pub mod screen;
pub mod settings;
pub mod shutdown;
pub mod stacking;
pub mod transients;
pub mod wallpaper;

#[cfg(test)]
pub mod testing;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use x11rb::protocol::xproto::{AtomEnum, EventMask, Timestamp, Window};

use crate::config::Config;
use crate::error::best_effort;
use crate::shared::{clamp_coord, clamp_extent, Geometry, Insets};
use crate::wm::click::{Click, ClickTracker, Clock};
use crate::wm::client::{Client, ClientTable, ManagedWindow, Transition, Visibility};
use crate::wm::client_flags::{WindowType, WmFlags};
use crate::wm::conn::{WindowChanges, XConn};
use crate::wm::events::{ButtonEvent, ConfigureFields, WmEvent};
use crate::wm::ewmh::{Atoms, IcccmState, StateAction};
use crate::wm::focus::FocusManager;
use crate::wm::frame::{FrameCompositor, FrameRegion};
use crate::wm::hints::{read_icon, read_motif_decorations, SizeHints, Strut, WmHints};
use crate::wm::keyboard::{KeyAction, KeyboardManager};
use crate::wm::moveresize::{
    reanchor, unmaximize_anchor, DragKind, DragSession, MoveResizeManager, MoveResizeRequest,
};
use crate::wm::pending::{GeometryRequest, PendingGeometry};
use crate::wm::render::{Bitmap, ControlButton, SurfaceRenderer};
use crate::wm::screen::OutputTopology;
use crate::wm::shutdown::{ShutdownCoordinator, ShutdownOutcome, ShutdownReason};
use crate::wm::stacking::{StackingManager, WindowEvent};
use crate::wm::transients::TransientGraph;
use crate::wm::wallpaper::Wallpaper;

const BUTTON_LEFT: u8 = 1;

/// `_NET_MOVERESIZE_WINDOW` flag bits for x, y, width, height
const MOVERESIZE_X: u32 = 1 << 8;
const MOVERESIZE_Y: u32 = 1 << 9;
const MOVERESIZE_WIDTH: u32 = 1 << 10;
const MOVERESIZE_HEIGHT: u32 = 1 << 11;

/// A key binding fired; the event loop runs it through
/// [`WindowManager::run_shortcut`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutRequest {
    pub action: KeyAction,
    /// Window focused when the key was pressed
    pub target: Option<Window>,
    pub time: Timestamp,
}

/// Why a client stops being managed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Release {
    Destroyed,
    Withdrawn,
}

#[derive(Debug, Clone, Copy)]
struct ControlPress {
    window: Window,
    button: ControlButton,
}

/// Title bar press that may turn into a click
#[derive(Debug, Clone, Copy)]
struct TitlePress {
    window: Window,
    x: i32,
    y: i32,
}

pub struct WindowManager {
    conn: Arc<dyn XConn>,
    atoms: Arc<Atoms>,
    config: Config,
    clients: ClientTable,
    topology: OutputTopology,
    frames: FrameCompositor,
    stack: StackingManager,
    focus: FocusManager,
    drag: MoveResizeManager,
    clicks: ClickTracker,
    keyboard: KeyboardManager,
    transients: TransientGraph,
    pending: PendingGeometry,
    shortcuts: mpsc::UnboundedSender<ShortcutRequest>,
    wallpaper: Wallpaper,
    wallpaper_requested: bool,
    shutdown: Option<ShutdownCoordinator>,
    /// Unmanaged windows that reserve screen space
    docks: HashSet<Window>,
    control_press: Option<ControlPress>,
    title_press: Option<TitlePress>,
}

impl WindowManager {
    pub fn new(
        conn: Arc<dyn XConn>,
        config: Config,
        renderer: Arc<dyn SurfaceRenderer>,
        clock: Arc<dyn Clock>,
        pending: PendingGeometry,
        shortcuts: mpsc::UnboundedSender<ShortcutRequest>,
    ) -> Result<Self> {
        let atoms = Atoms::new(conn.as_ref()).context("Failed to intern atoms")?;
        let mut topology = OutputTopology::new(conn.screen_size());
        topology
            .refresh(conn.as_ref())
            .context("Failed to query outputs")?;
        let keyboard = KeyboardManager::load(conn.as_ref(), &config.keybindings)
            .context("Failed to set up key bindings")?;
        let frames = FrameCompositor::new(
            Arc::clone(&conn),
            Arc::new(config.decorations.clone()),
            renderer,
            config.colors.background,
        );
        let clicks = ClickTracker::new(
            clock,
            Duration::from_millis(config.behavior.double_click_ms),
            config.behavior.double_click_distance,
        );

        Ok(Self {
            conn,
            atoms: Arc::new(atoms),
            config,
            clients: ClientTable::new(),
            topology,
            frames,
            stack: StackingManager::new(),
            focus: FocusManager::new(),
            drag: MoveResizeManager::new(),
            clicks,
            keyboard,
            transients: TransientGraph::new(),
            pending,
            shortcuts,
            wallpaper: Wallpaper::new(),
            wallpaper_requested: true,
            shutdown: None,
            docks: HashSet::new(),
            control_press: None,
            title_press: None,
        })
    }

    /// Advertise EWMH support and adopt windows that are already mapped
    pub fn start(&mut self, check_window: Window) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let root = conn.root();
        self.atoms
            .setup_supported(conn.as_ref(), root, check_window)
            .context("Failed to publish EWMH support")?;
        self.atoms
            .update_workarea(conn.as_ref(), root, self.topology.work_area())?;
        self.atoms.update_active_window(conn.as_ref(), root, None)?;
        self.stack.publish(conn.as_ref(), &self.atoms)?;
        self.adopt_existing()?;
        info!(
            "Managing {} existing windows on {} outputs",
            self.clients.len(),
            self.topology.outputs().len()
        );
        conn.flush()
    }

    fn adopt_existing(&mut self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        for window in conn.query_tree()? {
            let Some(attributes) = conn.window_attributes(window)? else {
                continue;
            };
            if attributes.override_redirect {
                continue;
            }
            let iconic = conn
                .property32(window, self.atoms.wm_state, self.atoms.wm_state)?
                .first()
                == Some(&(IcccmState::Iconic as u32));
            if attributes.mapped || iconic {
                best_effort("adopt window", self.manage(window, true).map(|_| ()))?;
            }
        }
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WindowEvent> {
        self.stack.subscribe()
    }

    pub fn client(&self, window: Window) -> Option<&Client> {
        self.clients.get(window)
    }

    pub fn stacking(&self) -> &StackingManager {
        &self.stack
    }

    pub fn focused(&self) -> Option<Window> {
        self.focus.focused()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    pub fn flush(&self) -> Result<()> {
        self.conn.flush()
    }

    /// Route one event to the component that owns it
    pub fn handle_event(&mut self, event: WmEvent) -> Result<()> {
        match event {
            WmEvent::MapRequest { window } => self.on_map_request(window),
            WmEvent::UnmapNotify { window, synthetic } => self.on_unmap(window, synthetic),
            WmEvent::DestroyNotify { window } => self.on_destroy(window),
            WmEvent::ConfigureRequest { window, fields } => {
                self.on_configure_request(window, fields)
            }
            WmEvent::PropertyNotify { window, atom, .. } => self.on_property(window, atom),
            WmEvent::ClientMessage {
                window,
                message_type,
                data,
            } => self.on_client_message(window, message_type, data),
            WmEvent::ButtonPress(event) => self.on_button_press(event),
            WmEvent::ButtonRelease(event) => self.on_button_release(event),
            WmEvent::Motion { root_x, root_y, .. } => self.on_motion(root_x, root_y),
            WmEvent::KeyPress {
                keycode,
                state,
                time,
            } => {
                self.on_key_press(keycode, state, time);
                Ok(())
            }
            WmEvent::Expose { window, count } => {
                if count == 0 && self.clients.is_frame(window) {
                    if let Some(id) = self.clients.resolve(window) {
                        self.frames.expose(id);
                        self.repaint(id, false)?;
                    }
                }
                Ok(())
            }
            WmEvent::ScreenChange => self.on_screen_change(),
            WmEvent::KeyboardMapping => {
                self.keyboard = KeyboardManager::load(self.conn.as_ref(), &self.config.keybindings)?;
                info!("Keyboard mapping changed, {} bindings", self.keyboard.bindings().len());
                Ok(())
            }
        }
    }

    // ---- Lifecycle -------------------------------------------------------

    /// Take over a window: classify it, frame it, place it and publish its
    /// state. Returns whether the window is now managed.
    pub fn manage(&mut self, window: Window, adopting: bool) -> Result<bool> {
        if self.clients.contains(window) || self.clients.is_frame(window) {
            return Ok(false);
        }
        let conn = Arc::clone(&self.conn);
        let atoms = Arc::clone(&self.atoms);
        let Some(attributes) = conn.window_attributes(window)? else {
            debug!("0x{:x} vanished before it could be managed", window);
            return Ok(false);
        };
        if attributes.override_redirect {
            return Ok(false);
        }
        let Some(geometry) = conn.geometry(window)? else {
            return Ok(false);
        };

        let transient_for = self.read_transient_for(window)?;
        let types = atoms.get_window_type(conn.as_ref(), window)?;
        let window_type = WindowType::classify(&types, transient_for.is_some(), &atoms);
        if window_type.is_unmanaged() {
            debug!("0x{:x} is {:?}, mapping unmanaged", window, window_type);
            self.track_unmanaged(window)?;
            conn.map(window)?;
            return Ok(false);
        }

        let mut client = Client::new(window, geometry);
        client.window_type = window_type;
        client.transient_for = transient_for;
        let states = self.read_properties(&mut client)?;
        client.decorated = read_motif_decorations(conn.as_ref(), &atoms, window)?
            .unwrap_or_else(|| window_type.decorated_by_default());

        let output = match transient_for.and_then(|leader| self.clients.get(leader)) {
            Some(leader) => self.topology.for_window(leader.geometry).clone(),
            None if adopting => self.topology.for_window(geometry).clone(),
            None => self.topology.active().clone(),
        };
        let insets = client.insets(self.frames.metrics(output.scale));
        let requested = if adopting {
            Some((
                geometry.x.saturating_sub_unsigned(insets.left),
                geometry.y.saturating_sub_unsigned(insets.top),
            ))
        } else {
            client.size_hints.requested_position()
        };
        let (width, height) = client.size_hints.constrain(geometry.width, geometry.height);
        client.geometry = placement::initial_geometry(
            width.saturating_add(insets.horizontal()),
            height.saturating_add(insets.vertical()),
            requested,
            self.topology.content_bounds(&output),
        );

        let starts_iconic = if adopting {
            !attributes.mapped
        } else {
            client.wm_hints.starts_iconic()
        };
        if adopting && attributes.mapped {
            // Reparenting a mapped window unmaps it once
            client.ignore_unmaps += 1;
        }

        let Some(frame) = self.frames.frame(&mut client, output.scale)? else {
            warn!("Leaving 0x{:x} unmanaged", window);
            best_effort("map unframed window", conn.map(window))?;
            return Ok(false);
        };
        let target = client.geometry;
        self.frames.apply_geometry(
            &mut client,
            target.x,
            target.y,
            target.width,
            target.height,
            true,
            output.scale,
        )?;
        if starts_iconic {
            client.resume = Visibility::Normal;
            client.visibility = Visibility::Iconic;
        }

        self.transients.set_transient_for(window, transient_for);
        info!(
            "Managing 0x{:x} in frame 0x{:x}: '{}' ({:?})",
            window, frame, client.properties.title, window_type
        );
        self.clients.insert(client);
        if let Some(client) = self.clients.get(window) {
            self.stack.add(conn.as_ref(), &atoms, client)?;
        }
        best_effort("set desktop", atoms.set_wm_desktop(conn.as_ref(), window, 0))?;
        conn.map(window)?;
        if !starts_iconic {
            conn.map(frame)?;
        }
        self.publish_state(window)?;

        if states.contains(&atoms.net_wm_state_fullscreen) {
            self.transition(window, Transition::Fullscreen)?;
        } else if states.contains(&atoms.net_wm_state_maximized_vert)
            || states.contains(&atoms.net_wm_state_maximized_horz)
        {
            self.transition(window, Transition::Maximize)?;
        }

        if !starts_iconic {
            self.repaint(window, true)?;
            if self.config.behavior.focus_new_windows && !adopting {
                self.activate(window, 0)?;
            }
        }
        Ok(true)
    }

    /// Stop managing a window and drop every reference to it
    fn unmanage(&mut self, window: Window, release: Release) -> Result<()> {
        let Some(mut client) = self.clients.remove(window) else {
            return Ok(());
        };
        let conn = Arc::clone(&self.conn);
        if self.drag.forget(window) {
            best_effort("ungrab pointer", conn.ungrab_pointer(0))?;
        }
        if self.title_press.is_some_and(|p| p.window == window) {
            self.title_press = None;
            self.clicks.reset();
        }
        if self.control_press.is_some_and(|p| p.window == window) {
            self.control_press = None;
        }
        self.transients.remove(window);

        best_effort(
            "destroy frame",
            self.frames.destroy(&mut client, release == Release::Withdrawn),
        )?;
        if release == Release::Withdrawn {
            best_effort(
                "withdraw",
                self.atoms.set_wm_state(conn.as_ref(), window, IcccmState::Withdrawn),
            )?;
            best_effort(
                "clear state",
                conn.delete_property(window, self.atoms.net_wm_state),
            )?;
        }

        let had_focus = self.focus.forget(window);
        let new_top = self.stack.remove(conn.as_ref(), &self.atoms, window)?;
        if let Some(shutdown) = &mut self.shutdown {
            shutdown.closed(window);
        }
        info!("Unmanaged 0x{:x} ({:?})", window, release);

        if had_focus || new_top.is_some() {
            self.focus_top()?;
        }
        Ok(())
    }

    fn track_unmanaged(&mut self, window: Window) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        conn.select_input(window, EventMask::PROPERTY_CHANGE)?;
        self.update_strut(window)
    }

    fn update_strut(&mut self, window: Window) -> Result<()> {
        let changed = match Strut::read(self.conn.as_ref(), &self.atoms, window)? {
            Some(strut) => {
                self.docks.insert(window);
                self.topology.set_strut(window, strut)
            }
            None => self.docks.remove(&window) && self.topology.remove_strut(window),
        };
        if changed {
            self.work_area_changed()?;
        }
        Ok(())
    }

    fn forget_dock(&mut self, window: Window) -> Result<()> {
        if self.docks.remove(&window) && self.topology.remove_strut(window) {
            self.work_area_changed()?;
        }
        Ok(())
    }

    fn work_area_changed(&mut self) -> Result<()> {
        let work_area = self.topology.work_area();
        debug!("Work area now {:?}", work_area);
        best_effort(
            "update workarea",
            self.atoms
                .update_workarea(self.conn.as_ref(), self.conn.root(), work_area),
        )?;
        self.refit_all(false)
    }

    // ---- Properties ------------------------------------------------------

    /// Fill in the client's properties and hints. Returns the initial
    /// `_NET_WM_STATE` the client asked for.
    fn read_properties(&self, client: &mut Client) -> Result<Vec<u32>> {
        let conn = self.conn.as_ref();
        let atoms = self.atoms.as_ref();
        let window = client.window;

        client.properties.title = self.read_title(window)?;
        if let Some(class) = conn.text_property(window, atoms.wm_class)? {
            client.properties.set_class(&class);
        }
        if let Some(command) = conn.text_property(window, atoms.wm_command)? {
            client.properties.set_command(&command);
        }
        client.properties.icon_name = self.read_icon_name(window)?;
        client.size_hints = SizeHints::read(conn, atoms, window)?;
        client.wm_hints = WmHints::read(conn, atoms, window)?;
        client.protocols = WmFlags::from_protocols(
            &atoms.get_protocols(conn, window)?,
            client.wm_hints.input,
            atoms,
        );
        client.properties.icon = read_icon(conn, atoms, window, self.icon_size())?;

        let states = conn.property32(window, atoms.net_wm_state, AtomEnum::ATOM.into())?;
        client.properties.skip_taskbar = states.contains(&atoms.net_wm_state_skip_taskbar);
        client.properties.skip_pager = states.contains(&atoms.net_wm_state_skip_pager);
        Ok(states)
    }

    fn read_title(&self, window: Window) -> Result<String> {
        Ok(match self.conn.text_property(window, self.atoms.net_wm_name)? {
            Some(title) if !title.is_empty() => title,
            _ => self
                .conn
                .text_property(window, self.atoms.wm_name)?
                .unwrap_or_default(),
        })
    }

    fn read_icon_name(&self, window: Window) -> Result<String> {
        Ok(
            match self.conn.text_property(window, self.atoms.net_wm_icon_name)? {
                Some(name) if !name.is_empty() => name,
                _ => self
                    .conn
                    .text_property(window, self.atoms.wm_icon_name)?
                    .unwrap_or_default(),
            },
        )
    }

    /// Leader from WM_TRANSIENT_FOR, if it is a managed window
    fn read_transient_for(&self, window: Window) -> Result<Option<Window>> {
        let leader = self
            .conn
            .property32(window, self.atoms.wm_transient_for, AtomEnum::WINDOW.into())?
            .first()
            .copied()
            .filter(|&leader| leader != 0 && leader != window && leader != self.conn.root());
        Ok(leader.filter(|&leader| self.clients.contains(leader)))
    }

    fn icon_size(&self) -> u32 {
        self.config.decorations.titlebar_height as u32
    }

    fn on_property(&mut self, window: Window, atom: u32) -> Result<()> {
        let atoms = Arc::clone(&self.atoms);
        if !self.clients.contains(window) {
            if atom == atoms.net_wm_strut || atom == atoms.net_wm_strut_partial {
                self.update_strut(window)?;
            }
            return Ok(());
        }
        let conn = Arc::clone(&self.conn);

        if atom == atoms.wm_name || atom == atoms.net_wm_name {
            let title = self.read_title(window)?;
            if let Some(client) = self.clients.get_mut(window) {
                client.properties.title = title;
            }
            self.repaint(window, false)?;
        } else if atom == atoms.wm_icon_name || atom == atoms.net_wm_icon_name {
            let name = self.read_icon_name(window)?;
            if let Some(client) = self.clients.get_mut(window) {
                client.properties.icon_name = name;
            }
        } else if atom == atoms.net_wm_icon {
            let icon = read_icon(conn.as_ref(), &atoms, window, self.icon_size())?;
            if let Some(client) = self.clients.get_mut(window) {
                client.properties.icon = icon;
            }
            self.repaint(window, false)?;
        } else if atom == atoms.wm_normal_hints {
            let hints = SizeHints::read(conn.as_ref(), &atoms, window)?;
            if let Some(client) = self.clients.get_mut(window) {
                client.size_hints = hints;
            }
            self.publish_state(window)?;
            self.repaint(window, false)?;
        } else if atom == atoms.wm_hints {
            let hints = WmHints::read(conn.as_ref(), &atoms, window)?;
            if let Some(client) = self.clients.get_mut(window) {
                client.protocols.set(WmFlags::INPUT, hints.input);
                client.wm_hints = hints;
            }
        } else if atom == atoms.wm_protocols {
            let protocols = atoms.get_protocols(conn.as_ref(), window)?;
            if let Some(client) = self.clients.get_mut(window) {
                client.protocols =
                    WmFlags::from_protocols(&protocols, client.wm_hints.input, &atoms);
            }
        } else if atom == atoms.wm_class {
            let class = conn.text_property(window, atoms.wm_class)?.unwrap_or_default();
            if let Some(client) = self.clients.get_mut(window) {
                client.properties.set_class(&class);
            }
        } else if atom == atoms.wm_command {
            let command = conn.text_property(window, atoms.wm_command)?.unwrap_or_default();
            if let Some(client) = self.clients.get_mut(window) {
                client.properties.set_command(&command);
            }
        } else if atom == atoms.wm_transient_for {
            let leader = self.read_transient_for(window)?;
            self.transients.set_transient_for(window, leader);
            let accepted = self.transients.leader_of(window);
            if let Some(client) = self.clients.get_mut(window) {
                client.transient_for = accepted;
            }
        }
        Ok(())
    }

    // ---- Geometry --------------------------------------------------------

    fn scale_of(&self, window: Window) -> u32 {
        self.clients
            .get(window)
            .map(|client| self.topology.for_window(client.geometry).scale)
            .unwrap_or(1)
    }

    /// Apply an outer geometry through the frame compositor and announce
    /// the move
    fn apply_outer(&mut self, window: Window, target: Geometry, force: bool) -> Result<bool> {
        let scale = self.scale_of(window);
        let Some(client) = self.clients.get_mut(window) else {
            return Ok(false);
        };
        let changed = self.frames.apply_geometry(
            client,
            target.x,
            target.y,
            target.width,
            target.height,
            force,
            scale,
        )?;
        if changed {
            self.stack.notify(WindowEvent::Moved {
                window,
                geometry: client.geometry,
            });
        }
        Ok(changed)
    }

    fn on_configure_request(&mut self, window: Window, fields: ConfigureFields) -> Result<()> {
        if !self.clients.contains(window) {
            let changes = WindowChanges {
                x: fields.x,
                y: fields.y,
                width: fields.width,
                height: fields.height,
                ..Default::default()
            };
            return self.conn.configure(window, &changes);
        }
        let request = GeometryRequest {
            window,
            x: fields.x,
            y: fields.y,
            width: fields.width,
            height: fields.height,
        };
        if let Err(request) = self.pending.submit(request) {
            debug!("Geometry queue unavailable, applying 0x{:x} now", window);
            self.apply_request(request)?;
        }
        Ok(())
    }

    /// Apply a coalesced batch from the pending geometry queue
    pub fn apply_pending(&mut self, batch: Vec<GeometryRequest>) -> Result<()> {
        for request in batch {
            best_effort("apply geometry request", self.apply_request(request))?;
        }
        Ok(())
    }

    /// Apply a client geometry request, given in root coordinates of the
    /// client area
    fn apply_request(&mut self, request: GeometryRequest) -> Result<()> {
        let window = request.window;
        let metrics = self.frames.metrics(self.scale_of(window));
        let dragged = self.drag.session().is_some_and(|s| s.target == window);
        let Some(client) = self.clients.get(window) else {
            return Ok(());
        };
        let current = client.client_geometry();
        if client.visibility != Visibility::Normal || dragged {
            // The window manager owns this geometry; restate it
            return self.conn.send_configure_notify(window, current);
        }
        let insets = client.insets(metrics);
        let target = Geometry::new(
            request.x.unwrap_or(current.x),
            request.y.unwrap_or(current.y),
            request.width.unwrap_or(current.width),
            request.height.unwrap_or(current.height),
        )
        .outset(insets);
        if !self.apply_outer(window, target, false)? {
            self.conn.send_configure_notify(window, current)?;
        }
        Ok(())
    }

    /// Re-fit windows after the outputs or the reserved space changed
    fn refit_all(&mut self, force: bool) -> Result<()> {
        for window in self.clients.ids() {
            let Some(client) = self.clients.get(window) else {
                continue;
            };
            let output = self.topology.for_window(client.geometry).clone();
            let visible = self
                .topology
                .outputs()
                .iter()
                .any(|o| o.geometry().intersects(&client.geometry));
            let target = match client.visibility {
                Visibility::Maximized => self.topology.content_bounds(&output),
                Visibility::Fullscreen => output.geometry(),
                _ if !visible => {
                    let primary = self.topology.primary().clone();
                    self.topology
                        .content_bounds(&primary)
                        .centered(client.geometry.width, client.geometry.height)
                }
                _ => client.geometry,
            };
            if force {
                self.frames.invalidate(window);
            }
            self.apply_outer(window, target, force)?;
            if force {
                self.publish_state(window)?;
            }
        }
        Ok(())
    }

    fn on_screen_change(&mut self) -> Result<()> {
        if !self.topology.refresh(self.conn.as_ref())? {
            return Ok(());
        }
        info!("Output topology changed: {} outputs", self.topology.outputs().len());
        self.wallpaper_requested = true;
        best_effort(
            "update workarea",
            self.atoms.update_workarea(
                self.conn.as_ref(),
                self.conn.root(),
                self.topology.work_area(),
            ),
        )?;
        self.refit_all(true)
    }

    // ---- State -----------------------------------------------------------

    /// Publish `_NET_WM_STATE`, `WM_STATE`, allowed actions and frame
    /// extents for a client
    fn publish_state(&self, window: Window) -> Result<()> {
        let Some(client) = self.clients.get(window) else {
            return Ok(());
        };
        let conn = self.conn.as_ref();
        let insets = client.insets(self.frames.metrics(self.scale_of(window)));
        let icccm = if client.is_iconic() {
            IcccmState::Iconic
        } else {
            IcccmState::Normal
        };
        best_effort(
            "publish WM_STATE",
            self.atoms.set_wm_state(conn, window, icccm),
        )?;
        best_effort(
            "publish _NET_WM_STATE",
            self.atoms
                .set_net_wm_state(conn, window, &client.net_states(&self.atoms)),
        )?;
        best_effort(
            "publish allowed actions",
            self.atoms
                .update_allowed_actions(conn, window, &client.allowed_actions(&self.atoms)),
        )?;
        best_effort(
            "publish frame extents",
            self.atoms.update_frame_extents(conn, window, insets),
        )
    }

    fn repaint(&mut self, window: Window, force: bool) -> Result<()> {
        let scale = self.scale_of(window);
        if let Some(client) = self.clients.get(window) {
            best_effort("repaint frame", self.frames.repaint(client, force, scale))?;
        }
        Ok(())
    }

    /// Change a window's visibility state. Iconify and uniconify carry the
    /// window's transients along. Returns whether anything changed.
    pub fn transition(&mut self, window: Window, transition: Transition) -> Result<bool> {
        if !self.transition_one(window, transition)? {
            return Ok(false);
        }
        match transition {
            Transition::Iconify | Transition::Uniconify => {
                for child in self.transients.descendants(window) {
                    self.transition_one(child, transition)?;
                }
            }
            _ => {}
        }
        match transition {
            Transition::Iconify => {
                let lost_focus = self.focus.focused().is_some_and(|focused| {
                    self.clients.get(focused).is_none_or(|c| c.is_iconic())
                });
                if lost_focus {
                    self.focus_top()?;
                }
            }
            Transition::Uniconify | Transition::Fullscreen => self.raise(window)?,
            _ => {}
        }
        Ok(true)
    }

    fn transition_one(&mut self, window: Window, transition: Transition) -> Result<bool> {
        let Some(client) = self.clients.get(window) else {
            return Ok(false);
        };
        let output = self.topology.for_window(client.geometry).clone();
        let work_area = self.topology.content_bounds(&output);
        let Some(client) = self.clients.get_mut(window) else {
            return Ok(false);
        };
        let Some(outcome) = client.transition(transition, work_area, output.geometry()) else {
            debug!("0x{:x}: {:?} changes nothing", window, transition);
            return Ok(false);
        };
        let surface = client.stacking_surface();
        debug!("0x{:x}: {:?} -> {:?}", window, transition, client.visibility);

        self.publish_state(window)?;
        if let Some(target) = outcome.geometry {
            self.apply_outer(window, target, true)?;
        }
        match outcome.map {
            Some(true) => self.conn.map(surface)?,
            Some(false) => self.conn.unmap(surface)?,
            None => {}
        }
        self.repaint(window, false)?;
        Ok(true)
    }

    pub fn toggle_maximize(&mut self, window: Window) -> Result<bool> {
        let Some(client) = self.clients.get(window) else {
            return Ok(false);
        };
        let transition = client.toggle_maximize();
        self.transition(window, transition)
    }

    pub fn toggle_fullscreen(&mut self, window: Window) -> Result<bool> {
        let Some(client) = self.clients.get(window) else {
            return Ok(false);
        };
        let transition = client.toggle_fullscreen();
        self.transition(window, transition)
    }

    pub fn set_decorated(&mut self, window: Window, decorated: bool) -> Result<bool> {
        let scale = self.scale_of(window);
        let Some(client) = self.clients.get_mut(window) else {
            return Ok(false);
        };
        if !self.frames.set_decorated(client, decorated, scale)? {
            return Ok(false);
        }
        self.publish_state(window)?;
        self.repaint(window, true)?;
        Ok(true)
    }

    // ---- Focus and stacking ----------------------------------------------

    /// Uniconify, raise and focus
    pub fn activate(&mut self, window: Window, time: Timestamp) -> Result<()> {
        if !self.clients.contains(window) {
            return Ok(());
        }
        self.transition(window, Transition::Uniconify)?;
        self.raise(window)?;
        self.focus_window(window, time)?;
        Ok(())
    }

    /// Raise a window and then its transients above it
    pub fn raise(&mut self, window: Window) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let mut order = vec![window];
        order.extend(self.transients.descendants(window));
        for id in order {
            if let Some(client) = self.clients.get(id) {
                self.stack.raise(conn.as_ref(), &self.atoms, client)?;
            }
        }
        Ok(())
    }

    fn focus_window(&mut self, window: Window, time: Timestamp) -> Result<bool> {
        let conn = Arc::clone(&self.conn);
        let Some(client) = self.clients.get_mut(window) else {
            return Ok(false);
        };
        let Some(previous) = self.focus.focus(conn.as_ref(), &self.atoms, client, time)? else {
            return Ok(false);
        };
        if let Some(previous) = previous.filter(|&p| p != window) {
            if let Some(old) = self.clients.get_mut(previous) {
                old.focused = false;
            }
            self.publish_state(previous)?;
            self.repaint(previous, false)?;
        }
        self.publish_state(window)?;
        self.repaint(window, false)?;
        Ok(true)
    }

    /// Focus the topmost window that can take it, or the root
    fn focus_top(&mut self) -> Result<()> {
        let clients = &self.clients;
        let next = self.stack.topmost(|w| {
            clients
                .get(w)
                .is_some_and(|c| !c.is_iconic() && c.protocols.focusable())
        });
        if let Some(next) = next {
            self.focus_window(next, 0)?;
            return Ok(());
        }
        let previous = self.focus.clear(self.conn.as_ref(), &self.atoms)?;
        if let Some(previous) = previous {
            if let Some(old) = self.clients.get_mut(previous) {
                old.focused = false;
            }
            self.publish_state(previous)?;
            self.repaint(previous, false)?;
        }
        Ok(())
    }

    /// Activate the next window in stacking order
    pub fn cycle(&mut self) -> Result<()> {
        let clients = &self.clients;
        let next = self
            .stack
            .cycle_candidate(|w| clients.get(w).is_some_and(|c| !c.is_iconic()));
        match next {
            Some(next) => self.activate(next, 0),
            None => Ok(()),
        }
    }

    /// Ask a client to close; clients without WM_DELETE_WINDOW are killed
    pub fn close(&mut self, window: Window, time: Timestamp) -> Result<()> {
        let Some(client) = self.clients.get(window) else {
            return Ok(());
        };
        if client.protocols.contains(WmFlags::DELETE) {
            debug!("Asking 0x{:x} to close", window);
            self.atoms
                .send_protocol(self.conn.as_ref(), window, self.atoms.wm_delete_window, time)
        } else {
            info!("0x{:x} does not support WM_DELETE_WINDOW, killing it", window);
            self.conn.kill_client(window)
        }
    }

    // ---- Map, unmap, destroy ---------------------------------------------

    fn on_map_request(&mut self, window: Window) -> Result<()> {
        let iconic = match self.clients.get(window) {
            Some(client) => client.is_iconic(),
            None => return self.manage(window, false).map(|_| ()),
        };
        if iconic {
            self.activate(window, 0)
        } else {
            self.conn.map(window)
        }
    }

    fn on_unmap(&mut self, window: Window, synthetic: bool) -> Result<()> {
        let Some(client) = self.clients.get_mut(window) else {
            return self.forget_dock(window);
        };
        if client.ignore_unmaps > 0 && !synthetic {
            client.ignore_unmaps -= 1;
            return Ok(());
        }
        self.unmanage(window, Release::Withdrawn)
    }

    fn on_destroy(&mut self, window: Window) -> Result<()> {
        if self.clients.contains(window) {
            self.unmanage(window, Release::Destroyed)
        } else {
            self.forget_dock(window)
        }
    }

    // ---- Client messages -------------------------------------------------

    fn on_client_message(&mut self, window: Window, message_type: u32, data: [u32; 5]) -> Result<()> {
        let atoms = Arc::clone(&self.atoms);
        if message_type == atoms.net_request_frame_extents {
            return self.on_request_frame_extents(window);
        }
        if !self.clients.contains(window) {
            debug!("Client message {} for unmanaged 0x{:x}", message_type, window);
            return Ok(());
        }

        if message_type == atoms.net_wm_state {
            self.on_state_message(window, data)
        } else if message_type == atoms.net_active_window {
            let focusable = self
                .clients
                .get(window)
                .is_some_and(|c| c.protocols.focusable());
            if !focusable {
                debug!("Refusing to activate 0x{:x}: it takes no focus", window);
                return Ok(());
            }
            self.activate(window, 0)
        } else if message_type == atoms.net_close_window {
            self.close(window, data[0])
        } else if message_type == atoms.net_wm_moveresize {
            self.on_moveresize_message(window, data)
        } else if message_type == atoms.net_moveresize_window {
            let field = |bit: u32, value: u32| (data[0] & bit != 0).then_some(value);
            self.apply_request(GeometryRequest {
                window,
                x: field(MOVERESIZE_X, data[1]).map(|v| clamp_coord(v as i32)),
                y: field(MOVERESIZE_Y, data[2]).map(|v| clamp_coord(v as i32)),
                width: field(MOVERESIZE_WIDTH, data[3]).map(clamp_extent),
                height: field(MOVERESIZE_HEIGHT, data[4]).map(clamp_extent),
            })
        } else if message_type == atoms.wm_change_state {
            if data[0] == IcccmState::Iconic as u32 {
                self.transition(window, Transition::Iconify)?;
            }
            Ok(())
        } else if message_type == atoms.net_wm_desktop {
            // Single desktop: pin the window back to it
            best_effort(
                "set desktop",
                atoms.set_wm_desktop(self.conn.as_ref(), window, 0),
            )
        } else {
            debug!("Ignoring client message {} for 0x{:x}", message_type, window);
            Ok(())
        }
    }

    fn on_state_message(&mut self, window: Window, data: [u32; 5]) -> Result<()> {
        let Some(action) = StateAction::from_u32(data[0]) else {
            debug!("Bad _NET_WM_STATE action {}", data[0]);
            return Ok(());
        };
        let atoms = Arc::clone(&self.atoms);
        let mut maximize_seen = false;
        for property in [data[1], data[2]].into_iter().filter(|&p| p != 0) {
            let Some(client) = self.clients.get(window) else {
                break;
            };
            if property == atoms.net_wm_state_fullscreen {
                let on = action.apply(client.visibility == Visibility::Fullscreen);
                let transition = if on {
                    Transition::Fullscreen
                } else {
                    Transition::Unfullscreen
                };
                self.transition(window, transition)?;
            } else if property == atoms.net_wm_state_maximized_vert
                || property == atoms.net_wm_state_maximized_horz
            {
                // Both axes move together
                if maximize_seen {
                    continue;
                }
                maximize_seen = true;
                let on = action.apply(client.visibility == Visibility::Maximized);
                let transition = if on {
                    Transition::Maximize
                } else {
                    Transition::Unmaximize
                };
                self.transition(window, transition)?;
            } else if property == atoms.net_wm_state_skip_taskbar {
                let value = action.apply(client.properties.skip_taskbar);
                if let Some(client) = self.clients.get_mut(window) {
                    client.properties.skip_taskbar = value;
                }
                self.publish_state(window)?;
            } else if property == atoms.net_wm_state_skip_pager {
                let value = action.apply(client.properties.skip_pager);
                if let Some(client) = self.clients.get_mut(window) {
                    client.properties.skip_pager = value;
                }
                self.publish_state(window)?;
            } else if property == atoms.net_wm_state_hidden {
                debug!("Ignoring _NET_WM_STATE_HIDDEN request for 0x{:x}", window);
            }
        }
        Ok(())
    }

    fn on_moveresize_message(&mut self, window: Window, data: [u32; 5]) -> Result<()> {
        match MoveResizeRequest::from_code(data[2]) {
            MoveResizeRequest::Start(kind) => {
                let pointer = (data[0] as i32, data[1] as i32);
                self.begin_drag(window, kind, pointer, 0)?;
            }
            MoveResizeRequest::Cancel => self.cancel_drag(0)?,
            MoveResizeRequest::Unsupported => {
                debug!("Unsupported _NET_WM_MOVERESIZE direction {}", data[2]);
            }
        }
        Ok(())
    }

    /// Estimate frame extents for a window before it is mapped
    fn on_request_frame_extents(&mut self, window: Window) -> Result<()> {
        let insets = match self.clients.get(window) {
            Some(client) => client.insets(self.frames.metrics(self.scale_of(window))),
            None => {
                let conn = self.conn.as_ref();
                let transient = self.read_transient_for(window)?.is_some();
                let types = self.atoms.get_window_type(conn, window)?;
                let window_type = WindowType::classify(&types, transient, &self.atoms);
                let decorated = !window_type.is_unmanaged()
                    && read_motif_decorations(conn, &self.atoms, window)?
                        .unwrap_or_else(|| window_type.decorated_by_default());
                if decorated {
                    let metrics = self.frames.metrics(self.topology.active().scale);
                    Insets::decorated(metrics.border, metrics.title)
                } else {
                    Insets::NONE
                }
            }
        };
        best_effort(
            "publish frame extents",
            self.atoms
                .update_frame_extents(self.conn.as_ref(), window, insets),
        )
    }

    // ---- Pointer ---------------------------------------------------------

    /// Start an interactive move or resize. Refused for fullscreen and
    /// iconic windows, for resizing a maximized window, and when the
    /// pointer cannot be grabbed.
    pub fn begin_drag(
        &mut self,
        window: Window,
        kind: DragKind,
        pointer: (i32, i32),
        time: Timestamp,
    ) -> Result<bool> {
        let Some(client) = self.clients.get(window) else {
            return Ok(false);
        };
        if self.drag.is_dragging()
            || client.is_iconic()
            || client.visibility == Visibility::Fullscreen
        {
            return Ok(false);
        }
        let maximized = client.visibility == Visibility::Maximized;
        if maximized && matches!(kind, DragKind::Resize(_)) {
            debug!("Not resizing maximized 0x{:x}", window);
            return Ok(false);
        }
        let session = DragSession {
            target: window,
            kind,
            anchor: pointer,
            anchor_geometry: client.geometry,
            unmaximize_on_motion: maximized,
        };
        if !self.conn.grab_pointer(time)? {
            warn!("Pointer grab failed, not dragging 0x{:x}", window);
            return Ok(false);
        }
        Ok(self.drag.start(session))
    }

    /// Abort the drag, keeping the geometry reached so far
    pub fn cancel_drag(&mut self, time: Timestamp) -> Result<()> {
        if let Some(session) = self.drag.cancel() {
            best_effort("ungrab pointer", self.conn.ungrab_pointer(time))?;
            self.finish_drag(session.target)?;
        }
        Ok(())
    }

    /// Settle the final geometry and tell the client about it
    fn finish_drag(&mut self, window: Window) -> Result<()> {
        let Some(geometry) = self.clients.get(window).map(|c| c.geometry) else {
            return Ok(());
        };
        self.apply_outer(window, geometry, true)?;
        Ok(())
    }

    fn on_motion(&mut self, x: i32, y: i32) -> Result<()> {
        let Some(session) = self.drag.session().cloned() else {
            return Ok(());
        };
        let window = session.target;

        if session.unmaximize_on_motion {
            let threshold = self.config.behavior.double_click_distance;
            let (ax, ay) = session.anchor;
            if ax.abs_diff(x) <= threshold && ay.abs_diff(y) <= threshold {
                return Ok(());
            }
            self.transition(window, Transition::Unmaximize)?;
            let Some(restored) = self.clients.get(window).map(|c| c.geometry) else {
                return Ok(());
            };
            let anchored = unmaximize_anchor((x, y), session.anchor_geometry, restored);
            self.apply_outer(window, anchored, false)?;
            let geometry = self
                .clients
                .get(window)
                .map(|c| c.geometry)
                .unwrap_or(anchored);
            self.drag.rebase((x, y), geometry);
            return Ok(());
        }

        let Some((window, requested)) = self.drag.motion(x, y) else {
            return Ok(());
        };
        let target = match session.kind {
            DragKind::Move => requested,
            kind @ DragKind::Resize(_) => {
                let scale = self.scale_of(window);
                let Some(client) = self.clients.get(window) else {
                    return Ok(());
                };
                let (width, height) =
                    self.frames
                        .constrained_size(client, requested.width, requested.height, scale);
                reanchor(kind, requested, width, height)
            }
        };
        self.apply_outer(window, target, false)?;
        self.topology.set_active_at(x, y);
        Ok(())
    }

    fn on_button_press(&mut self, event: ButtonEvent) -> Result<()> {
        self.topology.set_active_at(event.root_x, event.root_y);
        self.clicks.expire();
        let Some(id) = self.clients.resolve(event.window) else {
            return Ok(());
        };

        if !self.clients.is_frame(event.window) {
            // Click-to-focus inside the client; the click itself goes on
            self.activate(id, event.time)?;
            return self.conn.replay_pointer(event.time);
        }

        self.activate(id, event.time)?;
        if event.button != BUTTON_LEFT {
            return Ok(());
        }
        let scale = self.scale_of(id);
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        let pointer = (event.root_x, event.root_y);
        match self.frames.hit_test(client, event.event_x, event.event_y, scale) {
            FrameRegion::Edge(direction) => {
                self.begin_drag(id, DragKind::Resize(direction), pointer, event.time)?;
            }
            FrameRegion::Title => {
                self.title_press = Some(TitlePress {
                    window: id,
                    x: event.root_x,
                    y: event.root_y,
                });
                self.begin_drag(id, DragKind::Move, pointer, event.time)?;
            }
            FrameRegion::Control(button) => {
                self.control_press = Some(ControlPress { window: id, button });
            }
            FrameRegion::Client => {}
        }
        Ok(())
    }

    fn on_button_release(&mut self, event: ButtonEvent) -> Result<()> {
        if let Some(session) = self.drag.finish() {
            best_effort("ungrab pointer", self.conn.ungrab_pointer(event.time))?;
            self.finish_drag(session.target)?;
        }

        if let Some(press) = self.title_press.take() {
            let distance = self.config.behavior.double_click_distance;
            let still = press.x.abs_diff(event.root_x) <= distance
                && press.y.abs_diff(event.root_y) <= distance;
            if still && event.button == BUTTON_LEFT {
                let click = self.clicks.release(press.window, event.root_x, event.root_y);
                if click == Click::Double {
                    debug!("Double click on title of 0x{:x}", press.window);
                    self.toggle_maximize(press.window)?;
                }
            } else {
                self.clicks.reset();
            }
        }

        if let Some(press) = self.control_press.take() {
            let scale = self.scale_of(press.window);
            let released_on = self
                .clients
                .resolve(event.window)
                .filter(|&id| id == press.window)
                .and_then(|id| self.clients.get(id))
                .map(|client| self.frames.hit_test(client, event.event_x, event.event_y, scale));
            if released_on == Some(FrameRegion::Control(press.button)) {
                self.run_control(press.window, press.button, event.time)?;
            }
        }
        Ok(())
    }

    fn run_control(&mut self, window: Window, button: ControlButton, time: Timestamp) -> Result<()> {
        match button {
            ControlButton::Close => self.close(window, time),
            ControlButton::Maximize => {
                let maximizable = self.clients.get(window).is_some_and(|c| c.maximizable());
                if maximizable {
                    self.toggle_maximize(window)?;
                }
                Ok(())
            }
            ControlButton::Minimize => self.transition(window, Transition::Iconify).map(|_| ()),
        }
    }

    // ---- Keyboard --------------------------------------------------------

    fn on_key_press(&mut self, keycode: u8, state: u16, time: Timestamp) {
        let Some(action) = self.keyboard.lookup(keycode, state).cloned() else {
            return;
        };
        let request = ShortcutRequest {
            action,
            target: self.focus.focused(),
            time,
        };
        if self.shortcuts.send(request).is_err() {
            warn!("Shortcut channel closed");
        }
    }

    /// Run a shortcut the key handler queued
    pub fn run_shortcut(&mut self, request: ShortcutRequest, now: Instant) -> Result<()> {
        let ShortcutRequest {
            action,
            target,
            time,
        } = request;
        let target = target.filter(|&w| self.clients.contains(w));
        if action.targets_window() && target.is_none() {
            debug!("{:?} has no target window", action);
            return Ok(());
        }
        let window = target.unwrap_or_default();

        match action {
            KeyAction::Close => self.close(window, time),
            KeyAction::ToggleMaximize => self.toggle_maximize(window).map(|_| ()),
            KeyAction::Minimize => self.transition(window, Transition::Iconify).map(|_| ()),
            KeyAction::ToggleFullscreen => self.toggle_fullscreen(window).map(|_| ()),
            KeyAction::ToggleDecorations => {
                let decorated = self.clients.get(window).is_some_and(|c| c.decorated);
                self.set_decorated(window, !decorated).map(|_| ())
            }
            KeyAction::CycleWindows => self.cycle(),
            KeyAction::Spawn(command) => {
                spawn_command(command);
                Ok(())
            }
            KeyAction::Quit => self.begin_shutdown(ShutdownReason::Shortcut, now),
        }
    }

    // ---- Shutdown --------------------------------------------------------

    /// Ask every client to close and start the shutdown timer
    pub fn begin_shutdown(&mut self, reason: ShutdownReason, now: Instant) -> Result<()> {
        if self.shutdown.is_some() {
            return Ok(());
        }
        let windows = self.clients.ids();
        for &window in &windows {
            best_effort("close client", self.close(window, 0))?;
        }
        self.shutdown = Some(ShutdownCoordinator::new(
            reason,
            windows,
            Duration::from_millis(self.config.behavior.shutdown_timeout_ms),
            now,
        ));
        Ok(())
    }

    pub fn shutdown_deadline(&self) -> Option<Instant> {
        self.shutdown.as_ref().map(|s| s.deadline())
    }

    /// Decide the shutdown once every client is gone or time ran out.
    /// Clients still around at the deadline are killed.
    pub fn poll_shutdown(&mut self, now: Instant) -> Result<Option<ShutdownOutcome>> {
        let Some(outcome) = self.shutdown.as_ref().and_then(|s| s.poll(now)) else {
            return Ok(None);
        };
        let reason = self.shutdown.take().map(|s| s.reason());
        match &outcome {
            ShutdownOutcome::Clean => info!("All clients closed ({:?})", reason),
            ShutdownOutcome::Forced { blocking } => {
                error!(
                    "Shutdown blocked by {} clients: {:x?}",
                    blocking.len(),
                    blocking
                );
                for &window in blocking {
                    best_effort("kill client", self.conn.kill_client(window))?;
                }
                self.stack.notify(WindowEvent::ShutdownForced {
                    blocking: blocking.clone(),
                });
            }
        }
        Ok(Some(outcome))
    }

    /// Hand every client back to the root window. Used on exit and on a
    /// panic in the event loop, so failures are only logged.
    pub fn release_all(&mut self) {
        let conn = Arc::clone(&self.conn);
        if self.drag.cancel().is_some() {
            if let Err(e) = conn.ungrab_pointer(0) {
                debug!("Ungrab failed: {:#}", e);
            }
        }
        for window in self.clients.ids() {
            let Some(mut client) = self.clients.remove(window) else {
                continue;
            };
            if let Err(e) = self.frames.destroy(&mut client, true) {
                warn!("Failed to release 0x{:x}: {:#}", window, e);
            }
            if let Err(e) = conn.map(window) {
                debug!("Failed to map 0x{:x}: {:#}", window, e);
            }
        }
        if let Err(e) = self.wallpaper.release(conn.as_ref()) {
            debug!("Failed to free wallpaper: {:#}", e);
        }
        if let Err(e) = conn.flush() {
            warn!("Flush failed: {:#}", e);
        }
        info!("Released all windows");
    }

    // ---- Wallpaper -------------------------------------------------------

    /// Screen size to render the background for, once per change
    pub fn take_wallpaper_request(&mut self) -> Option<(u32, u32)> {
        if !std::mem::take(&mut self.wallpaper_requested) {
            return None;
        }
        let screen = self.topology.screen_geometry();
        Some((screen.width, screen.height))
    }

    pub fn apply_wallpaper(&mut self, bitmap: &Bitmap) -> Result<()> {
        best_effort(
            "set wallpaper",
            self.wallpaper.apply(self.conn.as_ref(), bitmap),
        )
    }
}

/// Run a shell command without blocking the event loop
fn spawn_command(command: String) {
    tokio::spawn(async move {
        info!("Spawning: {}", command);
        match tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&command)
            .spawn()
        {
            Ok(mut child) => {
                if let Err(e) = child.wait().await {
                    warn!("'{}' failed: {}", command, e);
                }
            }
            Err(e) => error!("Failed to spawn '{}': {}", command, e),
        }
    });
}
