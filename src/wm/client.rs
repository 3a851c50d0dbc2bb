//! Client Module
//!
//! The per-window record: geometry, visibility state, decoration and the
//! cached metadata read from the client. State transitions are computed
//! here without touching the connection; the window manager applies the
//! returned outcome and republishes hints.

use std::collections::HashMap;
use std::sync::Arc;

use x11rb::protocol::xproto::{Atom, Window};

use crate::shared::{Geometry, Insets};
use crate::wm::client_flags::{WindowType, WmFlags};
use crate::wm::ewmh::Atoms;
use crate::wm::hints::{SizeHints, WmHints};
use crate::wm::render::Icon;

/// Mutually exclusive visibility states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Normal,
    Maximized,
    Fullscreen,
    Iconic,
}

/// Requested state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Iconify,
    Uniconify,
    Maximize,
    Unmaximize,
    Fullscreen,
    Unfullscreen,
}

/// What the window manager has to do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// New outer geometry to apply
    pub geometry: Option<Geometry>,
    /// Map (true) or unmap (false) the frame
    pub map: Option<bool>,
}

/// Border and title bar thickness in output pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMetrics {
    pub border: u32,
    pub title: u32,
}

/// Metadata cached from client properties
#[derive(Debug, Clone, Default)]
pub struct Properties {
    pub title: String,
    /// WM_CLASS class part
    pub class: String,
    /// WM_CLASS instance part
    pub instance: String,
    pub command: String,
    pub icon_name: String,
    pub icon: Option<Arc<Icon>>,
    pub skip_taskbar: bool,
    pub skip_pager: bool,
}

impl Properties {
    /// WM_CLASS holds "instance\0class\0"
    pub fn set_class(&mut self, raw: &str) {
        let mut parts = raw.split('\0');
        self.instance = parts.next().unwrap_or_default().to_string();
        self.class = parts.next().unwrap_or_default().to_string();
    }

    /// WM_COMMAND holds NUL separated arguments
    pub fn set_command(&mut self, raw: &str) {
        self.command = raw
            .split('\0')
            .filter(|arg| !arg.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
    }
}

/// Operations the stacking and interaction layers need from a window,
/// without reaching into its protocol fields.
pub trait ManagedWindow {
    /// Client surface id, the key used everywhere else
    fn id(&self) -> Window;

    /// Surface to restack: the frame, or the client while unframed
    fn stacking_surface(&self) -> Window;

    fn frame_geometry(&self) -> Geometry;

    fn visibility(&self) -> Visibility;

    fn is_iconic(&self) -> bool {
        self.visibility() == Visibility::Iconic
    }

    fn transition(
        &mut self,
        transition: Transition,
        work_area: Geometry,
        output_area: Geometry,
    ) -> Option<TransitionOutcome>;
}

/// Window Manager client state
#[derive(Debug, Clone)]
pub struct Client {
    /// X11 window ID of the client surface
    pub window: Window,

    /// Frame window ID, 0 until framed
    pub frame: Window,

    /// Outer (frame) geometry in root coordinates
    pub geometry: Geometry,

    /// Client geometry relative to the frame
    pub child_geometry: Geometry,

    /// Outer geometry saved before maximize/fullscreen
    pub restore_geometry: Option<Geometry>,

    pub decorated: bool,

    pub visibility: Visibility,

    /// Visibility to return to when uniconified
    pub resume: Visibility,

    pub desktop: u32,

    /// Transient-for leader, looked up by id
    pub transient_for: Option<Window>,

    pub properties: Properties,

    pub size_hints: SizeHints,

    pub wm_hints: WmHints,

    pub protocols: WmFlags,

    pub window_type: WindowType,

    pub focused: bool,

    /// UnmapNotify events generated by the window manager itself
    pub ignore_unmaps: u32,
}

impl Client {
    pub fn new(window: Window, client_geometry: Geometry) -> Self {
        Self {
            window,
            frame: 0,
            geometry: client_geometry,
            child_geometry: Geometry::new(0, 0, client_geometry.width, client_geometry.height),
            restore_geometry: None,
            decorated: true,
            visibility: Visibility::Normal,
            resume: Visibility::Normal,
            desktop: 0,
            transient_for: None,
            properties: Properties::default(),
            size_hints: SizeHints::default(),
            wm_hints: WmHints::default(),
            protocols: WmFlags::INPUT,
            window_type: WindowType::Normal,
            focused: false,
            ignore_unmaps: 0,
        }
    }

    pub fn is_framed(&self) -> bool {
        self.frame != 0
    }

    /// Decoration insets for the current state
    pub fn insets(&self, metrics: FrameMetrics) -> Insets {
        if !self.decorated || self.visibility == Visibility::Fullscreen {
            return Insets::NONE;
        }
        Insets::decorated(metrics.border, metrics.title)
    }

    /// Client geometry in root coordinates
    pub fn client_geometry(&self) -> Geometry {
        Geometry::new(
            self.geometry.x + self.child_geometry.x,
            self.geometry.y + self.child_geometry.y,
            self.child_geometry.width,
            self.child_geometry.height,
        )
    }

    /// Fixed-size clients (min == max) cannot be maximized
    pub fn maximizable(&self) -> bool {
        !self.size_hints.is_fixed_size()
    }

    pub fn toggle_maximize(&self) -> Transition {
        if self.visibility == Visibility::Maximized {
            Transition::Unmaximize
        } else {
            Transition::Maximize
        }
    }

    pub fn toggle_fullscreen(&self) -> Transition {
        if self.visibility == Visibility::Fullscreen {
            Transition::Unfullscreen
        } else {
            Transition::Fullscreen
        }
    }

    fn restored(&mut self, work_area: Geometry, output_area: Geometry) -> Geometry {
        self.restore_geometry
            .take()
            .unwrap_or_else(|| work_area.centered(output_area.width / 2, output_area.height / 2))
    }

    /// Toggle decoration. Returns the outer geometry to apply, keeping the
    /// client size for normal windows and the frame size otherwise.
    pub fn set_decorated(&mut self, decorated: bool, metrics: FrameMetrics) -> Option<Geometry> {
        if self.decorated == decorated {
            return None;
        }
        let old = self.insets(metrics);
        self.decorated = decorated;
        let new = self.insets(metrics);

        if let Some(restore) = self.restore_geometry {
            self.restore_geometry = Some(restore.inset(old).outset(new));
        }
        match self.visibility {
            Visibility::Normal => Some(self.geometry.inset(old).outset(new)),
            _ => Some(self.geometry),
        }
    }

    /// `_NET_WM_STATE` atoms describing this window
    pub fn net_states(&self, atoms: &Atoms) -> Vec<Atom> {
        let mut states = Vec::new();
        let effective = if self.visibility == Visibility::Iconic {
            states.push(atoms.net_wm_state_hidden);
            self.resume
        } else {
            self.visibility
        };
        match effective {
            Visibility::Maximized => {
                states.push(atoms.net_wm_state_maximized_vert);
                states.push(atoms.net_wm_state_maximized_horz);
            }
            Visibility::Fullscreen => states.push(atoms.net_wm_state_fullscreen),
            _ => {}
        }
        if self.properties.skip_taskbar {
            states.push(atoms.net_wm_state_skip_taskbar);
        }
        if self.properties.skip_pager {
            states.push(atoms.net_wm_state_skip_pager);
        }
        if self.focused {
            states.push(atoms.net_wm_state_focused);
        }
        states
    }

    /// `_NET_WM_ALLOWED_ACTIONS` for this window
    pub fn allowed_actions(&self, atoms: &Atoms) -> Vec<Atom> {
        let mut actions = vec![
            atoms.net_wm_action_move,
            atoms.net_wm_action_minimize,
            atoms.net_wm_action_fullscreen,
            atoms.net_wm_action_close,
        ];
        if self.maximizable() {
            actions.push(atoms.net_wm_action_resize);
            actions.push(atoms.net_wm_action_maximize_horz);
            actions.push(atoms.net_wm_action_maximize_vert);
        }
        actions
    }
}

impl ManagedWindow for Client {
    fn id(&self) -> Window {
        self.window
    }

    fn stacking_surface(&self) -> Window {
        if self.is_framed() { self.frame } else { self.window }
    }

    fn frame_geometry(&self) -> Geometry {
        self.geometry
    }

    fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Requesting a state already held is a no-op (`None`). An iconic
    /// window only accepts `Uniconify`.
    fn transition(
        &mut self,
        transition: Transition,
        work_area: Geometry,
        output_area: Geometry,
    ) -> Option<TransitionOutcome> {
        use Transition::*;

        if self.visibility == Visibility::Iconic && transition != Uniconify {
            return None;
        }

        let outcome = match transition {
            Iconify => {
                self.resume = self.visibility;
                self.visibility = Visibility::Iconic;
                TransitionOutcome {
                    geometry: None,
                    map: Some(false),
                }
            }
            Uniconify => {
                if self.visibility != Visibility::Iconic {
                    return None;
                }
                self.visibility = self.resume;
                self.resume = Visibility::Normal;
                TransitionOutcome {
                    geometry: None,
                    map: Some(true),
                }
            }
            Maximize => {
                if self.visibility == Visibility::Maximized || !self.maximizable() {
                    return None;
                }
                if self.visibility == Visibility::Normal {
                    self.restore_geometry = Some(self.geometry);
                }
                self.visibility = Visibility::Maximized;
                TransitionOutcome {
                    geometry: Some(work_area),
                    map: None,
                }
            }
            Unmaximize => {
                if self.visibility != Visibility::Maximized {
                    return None;
                }
                self.visibility = Visibility::Normal;
                TransitionOutcome {
                    geometry: Some(self.restored(work_area, output_area)),
                    map: None,
                }
            }
            Fullscreen => {
                if self.visibility == Visibility::Fullscreen {
                    return None;
                }
                if self.visibility == Visibility::Normal {
                    self.restore_geometry = Some(self.geometry);
                }
                self.visibility = Visibility::Fullscreen;
                TransitionOutcome {
                    geometry: Some(output_area),
                    map: None,
                }
            }
            Unfullscreen => {
                if self.visibility != Visibility::Fullscreen {
                    return None;
                }
                self.visibility = Visibility::Normal;
                TransitionOutcome {
                    geometry: Some(self.restored(work_area, output_area)),
                    map: None,
                }
            }
        };
        Some(outcome)
    }
}

/// Arena of managed clients keyed by client window, with a frame index so
/// events on either surface resolve to the same record.
#[derive(Debug, Default)]
pub struct ClientTable {
    clients: HashMap<Window, Client>,
    frames: HashMap<Window, Window>,
}

impl ClientTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, client: Client) {
        if client.is_framed() {
            self.frames.insert(client.frame, client.window);
        }
        self.clients.insert(client.window, client);
    }

    /// Record a frame created after insertion
    pub fn set_frame(&mut self, window: Window, frame: Window) {
        if let Some(client) = self.clients.get_mut(&window) {
            if client.is_framed() {
                self.frames.remove(&client.frame);
            }
            client.frame = frame;
            if frame != 0 {
                self.frames.insert(frame, window);
            }
        }
    }

    pub fn remove(&mut self, window: Window) -> Option<Client> {
        let client = self.clients.remove(&window)?;
        if client.is_framed() {
            self.frames.remove(&client.frame);
        }
        Some(client)
    }

    pub fn get(&self, window: Window) -> Option<&Client> {
        self.clients.get(&window)
    }

    pub fn get_mut(&mut self, window: Window) -> Option<&mut Client> {
        self.clients.get_mut(&window)
    }

    pub fn contains(&self, window: Window) -> bool {
        self.clients.contains_key(&window)
    }

    /// Client id for a client or frame window
    pub fn resolve(&self, window: Window) -> Option<Window> {
        if self.clients.contains_key(&window) {
            Some(window)
        } else {
            self.frames.get(&window).copied()
        }
    }

    pub fn is_frame(&self, window: Window) -> bool {
        self.frames.contains_key(&window)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    pub fn ids(&self) -> Vec<Window> {
        self.clients.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
