//! EWMH (Extended Window Manager Hints) implementation
//!
//! Atom table plus the root and per-window properties the window manager
//! publishes so panels, pagers and compositors see consistent state.

use anyhow::Result;
use tracing::debug;
use x11rb::protocol::xproto::{Atom, AtomEnum, EventMask, Window};

use crate::shared::{Geometry, Insets};
use crate::wm::conn::XConn;

/// Name advertised on the supporting WM check window
pub const WM_NAME: &str = "area-wm";

/// Holds all interned atoms
#[derive(Debug, Clone)]
pub struct Atoms {
    pub net_supported: Atom,
    pub net_supporting_wm_check: Atom,
    pub net_client_list: Atom,
    pub net_client_list_stacking: Atom,
    pub net_number_of_desktops: Atom,
    pub net_current_desktop: Atom,
    pub net_desktop_viewport: Atom,
    pub net_active_window: Atom,
    pub net_workarea: Atom,
    pub net_close_window: Atom,
    pub net_moveresize_window: Atom,
    pub net_wm_moveresize: Atom,
    pub net_request_frame_extents: Atom,
    pub net_frame_extents: Atom,
    pub net_wm_name: Atom,
    pub net_wm_icon_name: Atom,
    pub net_wm_icon: Atom,
    pub net_wm_desktop: Atom,
    pub net_wm_pid: Atom,
    pub net_wm_strut: Atom,
    pub net_wm_strut_partial: Atom,
    pub net_wm_window_type: Atom,
    pub net_wm_window_type_desktop: Atom,
    pub net_wm_window_type_dock: Atom,
    pub net_wm_window_type_toolbar: Atom,
    pub net_wm_window_type_menu: Atom,
    pub net_wm_window_type_utility: Atom,
    pub net_wm_window_type_splash: Atom,
    pub net_wm_window_type_dialog: Atom,
    pub net_wm_window_type_dropdown_menu: Atom,
    pub net_wm_window_type_popup_menu: Atom,
    pub net_wm_window_type_tooltip: Atom,
    pub net_wm_window_type_notification: Atom,
    pub net_wm_window_type_combo: Atom,
    pub net_wm_window_type_dnd: Atom,
    pub net_wm_window_type_normal: Atom,
    pub net_wm_state: Atom,
    pub net_wm_state_fullscreen: Atom,
    pub net_wm_state_maximized_vert: Atom,
    pub net_wm_state_maximized_horz: Atom,
    pub net_wm_state_hidden: Atom,
    pub net_wm_state_skip_taskbar: Atom,
    pub net_wm_state_skip_pager: Atom,
    pub net_wm_state_focused: Atom,
    pub net_wm_allowed_actions: Atom,
    pub net_wm_action_move: Atom,
    pub net_wm_action_resize: Atom,
    pub net_wm_action_minimize: Atom,
    pub net_wm_action_maximize_horz: Atom,
    pub net_wm_action_maximize_vert: Atom,
    pub net_wm_action_fullscreen: Atom,
    pub net_wm_action_close: Atom,
    // ICCCM
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
    pub wm_take_focus: Atom,
    pub wm_state: Atom,
    pub wm_change_state: Atom,
    pub wm_name: Atom,
    pub wm_icon_name: Atom,
    pub wm_class: Atom,
    pub wm_command: Atom,
    pub wm_hints: Atom,
    pub wm_normal_hints: Atom,
    pub wm_transient_for: Atom,
    pub utf8_string: Atom,
    pub motif_wm_hints: Atom,
}

impl Atoms {
    /// Intern all required atoms
    pub fn new(conn: &dyn XConn) -> Result<Self> {
        let intern = |name: &str| conn.intern_atom(name);

        Ok(Self {
            net_supported: intern("_NET_SUPPORTED")?,
            net_supporting_wm_check: intern("_NET_SUPPORTING_WM_CHECK")?,
            net_client_list: intern("_NET_CLIENT_LIST")?,
            net_client_list_stacking: intern("_NET_CLIENT_LIST_STACKING")?,
            net_number_of_desktops: intern("_NET_NUMBER_OF_DESKTOPS")?,
            net_current_desktop: intern("_NET_CURRENT_DESKTOP")?,
            net_desktop_viewport: intern("_NET_DESKTOP_VIEWPORT")?,
            net_active_window: intern("_NET_ACTIVE_WINDOW")?,
            net_workarea: intern("_NET_WORKAREA")?,
            net_close_window: intern("_NET_CLOSE_WINDOW")?,
            net_moveresize_window: intern("_NET_MOVERESIZE_WINDOW")?,
            net_wm_moveresize: intern("_NET_WM_MOVERESIZE")?,
            net_request_frame_extents: intern("_NET_REQUEST_FRAME_EXTENTS")?,
            net_frame_extents: intern("_NET_FRAME_EXTENTS")?,
            net_wm_name: intern("_NET_WM_NAME")?,
            net_wm_icon_name: intern("_NET_WM_ICON_NAME")?,
            net_wm_icon: intern("_NET_WM_ICON")?,
            net_wm_desktop: intern("_NET_WM_DESKTOP")?,
            net_wm_pid: intern("_NET_WM_PID")?,
            net_wm_strut: intern("_NET_WM_STRUT")?,
            net_wm_strut_partial: intern("_NET_WM_STRUT_PARTIAL")?,
            net_wm_window_type: intern("_NET_WM_WINDOW_TYPE")?,
            net_wm_window_type_desktop: intern("_NET_WM_WINDOW_TYPE_DESKTOP")?,
            net_wm_window_type_dock: intern("_NET_WM_WINDOW_TYPE_DOCK")?,
            net_wm_window_type_toolbar: intern("_NET_WM_WINDOW_TYPE_TOOLBAR")?,
            net_wm_window_type_menu: intern("_NET_WM_WINDOW_TYPE_MENU")?,
            net_wm_window_type_utility: intern("_NET_WM_WINDOW_TYPE_UTILITY")?,
            net_wm_window_type_splash: intern("_NET_WM_WINDOW_TYPE_SPLASH")?,
            net_wm_window_type_dialog: intern("_NET_WM_WINDOW_TYPE_DIALOG")?,
            net_wm_window_type_dropdown_menu: intern("_NET_WM_WINDOW_TYPE_DROPDOWN_MENU")?,
            net_wm_window_type_popup_menu: intern("_NET_WM_WINDOW_TYPE_POPUP_MENU")?,
            net_wm_window_type_tooltip: intern("_NET_WM_WINDOW_TYPE_TOOLTIP")?,
            net_wm_window_type_notification: intern("_NET_WM_WINDOW_TYPE_NOTIFICATION")?,
            net_wm_window_type_combo: intern("_NET_WM_WINDOW_TYPE_COMBO")?,
            net_wm_window_type_dnd: intern("_NET_WM_WINDOW_TYPE_DND")?,
            net_wm_window_type_normal: intern("_NET_WM_WINDOW_TYPE_NORMAL")?,
            net_wm_state: intern("_NET_WM_STATE")?,
            net_wm_state_fullscreen: intern("_NET_WM_STATE_FULLSCREEN")?,
            net_wm_state_maximized_vert: intern("_NET_WM_STATE_MAXIMIZED_VERT")?,
            net_wm_state_maximized_horz: intern("_NET_WM_STATE_MAXIMIZED_HORZ")?,
            net_wm_state_hidden: intern("_NET_WM_STATE_HIDDEN")?,
            net_wm_state_skip_taskbar: intern("_NET_WM_STATE_SKIP_TASKBAR")?,
            net_wm_state_skip_pager: intern("_NET_WM_STATE_SKIP_PAGER")?,
            net_wm_state_focused: intern("_NET_WM_STATE_FOCUSED")?,
            net_wm_allowed_actions: intern("_NET_WM_ALLOWED_ACTIONS")?,
            net_wm_action_move: intern("_NET_WM_ACTION_MOVE")?,
            net_wm_action_resize: intern("_NET_WM_ACTION_RESIZE")?,
            net_wm_action_minimize: intern("_NET_WM_ACTION_MINIMIZE")?,
            net_wm_action_maximize_horz: intern("_NET_WM_ACTION_MAXIMIZE_HORZ")?,
            net_wm_action_maximize_vert: intern("_NET_WM_ACTION_MAXIMIZE_VERT")?,
            net_wm_action_fullscreen: intern("_NET_WM_ACTION_FULLSCREEN")?,
            net_wm_action_close: intern("_NET_WM_ACTION_CLOSE")?,
            wm_protocols: intern("WM_PROTOCOLS")?,
            wm_delete_window: intern("WM_DELETE_WINDOW")?,
            wm_take_focus: intern("WM_TAKE_FOCUS")?,
            wm_state: intern("WM_STATE")?,
            wm_change_state: intern("WM_CHANGE_STATE")?,
            wm_name: AtomEnum::WM_NAME.into(),
            wm_icon_name: AtomEnum::WM_ICON_NAME.into(),
            wm_class: AtomEnum::WM_CLASS.into(),
            wm_command: AtomEnum::WM_COMMAND.into(),
            wm_hints: AtomEnum::WM_HINTS.into(),
            wm_normal_hints: AtomEnum::WM_NORMAL_HINTS.into(),
            wm_transient_for: AtomEnum::WM_TRANSIENT_FOR.into(),
            utf8_string: intern("UTF8_STRING")?,
            motif_wm_hints: intern("_MOTIF_WM_HINTS")?,
        })
    }

    /// Set up _NET_SUPPORTED, the check window and the single desktop
    pub fn setup_supported(&self, conn: &dyn XConn, root: Window, check_window: Window) -> Result<()> {
        let supported = [
            self.net_supported,
            self.net_supporting_wm_check,
            self.net_client_list,
            self.net_client_list_stacking,
            self.net_number_of_desktops,
            self.net_current_desktop,
            self.net_desktop_viewport,
            self.net_active_window,
            self.net_workarea,
            self.net_close_window,
            self.net_wm_moveresize,
            self.net_request_frame_extents,
            self.net_frame_extents,
            self.net_wm_name,
            self.net_wm_icon_name,
            self.net_wm_icon,
            self.net_wm_desktop,
            self.net_wm_strut,
            self.net_wm_strut_partial,
            self.net_wm_window_type,
            self.net_wm_window_type_desktop,
            self.net_wm_window_type_dock,
            self.net_wm_window_type_toolbar,
            self.net_wm_window_type_menu,
            self.net_wm_window_type_utility,
            self.net_wm_window_type_splash,
            self.net_wm_window_type_dialog,
            self.net_wm_window_type_dropdown_menu,
            self.net_wm_window_type_popup_menu,
            self.net_wm_window_type_tooltip,
            self.net_wm_window_type_notification,
            self.net_wm_window_type_combo,
            self.net_wm_window_type_dnd,
            self.net_wm_window_type_normal,
            self.net_wm_state,
            self.net_wm_state_fullscreen,
            self.net_wm_state_maximized_vert,
            self.net_wm_state_maximized_horz,
            self.net_wm_state_hidden,
            self.net_wm_state_skip_taskbar,
            self.net_wm_state_skip_pager,
            self.net_wm_state_focused,
            self.net_wm_allowed_actions,
            self.net_wm_action_move,
            self.net_wm_action_resize,
            self.net_wm_action_minimize,
            self.net_wm_action_maximize_horz,
            self.net_wm_action_maximize_vert,
            self.net_wm_action_fullscreen,
            self.net_wm_action_close,
        ];
        conn.set_property32(root, self.net_supported, AtomEnum::ATOM.into(), &supported)?;

        for window in [root, check_window] {
            conn.set_property32(
                window,
                self.net_supporting_wm_check,
                AtomEnum::WINDOW.into(),
                &[check_window],
            )?;
        }
        conn.set_text_property(check_window, self.net_wm_name, self.utf8_string, WM_NAME)?;

        conn.set_property32(root, self.net_number_of_desktops, AtomEnum::CARDINAL.into(), &[1])?;
        conn.set_property32(root, self.net_current_desktop, AtomEnum::CARDINAL.into(), &[0])?;
        conn.set_property32(root, self.net_desktop_viewport, AtomEnum::CARDINAL.into(), &[0, 0])?;
        debug!("Published {} supported atoms", supported.len());
        Ok(())
    }

    /// Update _NET_ACTIVE_WINDOW
    pub fn update_active_window(&self, conn: &dyn XConn, root: Window, window: Option<Window>) -> Result<()> {
        conn.set_property32(
            root,
            self.net_active_window,
            AtomEnum::WINDOW.into(),
            &[window.unwrap_or(0)],
        )
    }

    /// Update _NET_CLIENT_LIST (mapping order, oldest first)
    pub fn update_client_list(&self, conn: &dyn XConn, root: Window, windows: &[Window]) -> Result<()> {
        conn.set_property32(root, self.net_client_list, AtomEnum::WINDOW.into(), windows)
    }

    /// Update _NET_CLIENT_LIST_STACKING (bottom to top)
    pub fn update_client_list_stacking(
        &self,
        conn: &dyn XConn,
        root: Window,
        bottom_to_top: &[Window],
    ) -> Result<()> {
        conn.set_property32(
            root,
            self.net_client_list_stacking,
            AtomEnum::WINDOW.into(),
            bottom_to_top,
        )
    }

    /// Update _NET_FRAME_EXTENTS for a window
    pub fn update_frame_extents(&self, conn: &dyn XConn, window: Window, insets: Insets) -> Result<()> {
        conn.set_property32(
            window,
            self.net_frame_extents,
            AtomEnum::CARDINAL.into(),
            &insets.as_extents(),
        )
    }

    /// Replace _NET_WM_STATE with the given atoms
    pub fn set_net_wm_state(&self, conn: &dyn XConn, window: Window, states: &[Atom]) -> Result<()> {
        conn.set_property32(window, self.net_wm_state, AtomEnum::ATOM.into(), states)
    }

    /// Set ICCCM WM_STATE
    pub fn set_wm_state(&self, conn: &dyn XConn, window: Window, state: IcccmState) -> Result<()> {
        conn.set_property32(window, self.wm_state, self.wm_state, &[state as u32, 0])
    }

    pub fn update_allowed_actions(&self, conn: &dyn XConn, window: Window, actions: &[Atom]) -> Result<()> {
        conn.set_property32(
            window,
            self.net_wm_allowed_actions,
            AtomEnum::ATOM.into(),
            actions,
        )
    }

    pub fn set_wm_desktop(&self, conn: &dyn XConn, window: Window, desktop: u32) -> Result<()> {
        conn.set_property32(window, self.net_wm_desktop, AtomEnum::CARDINAL.into(), &[desktop])
    }

    /// Update _NET_WORKAREA property on root window
    pub fn update_workarea(&self, conn: &dyn XConn, root: Window, work_area: Geometry) -> Result<()> {
        let data = [
            work_area.x as u32,
            work_area.y as u32,
            work_area.width,
            work_area.height,
        ];
        conn.set_property32(root, self.net_workarea, AtomEnum::CARDINAL.into(), &data)
    }

    /// _NET_WM_WINDOW_TYPE atoms in the client's order of preference
    pub fn get_window_type(&self, conn: &dyn XConn, window: Window) -> Result<Vec<Atom>> {
        conn.property32(window, self.net_wm_window_type, AtomEnum::ATOM.into())
    }

    /// WM_PROTOCOLS atoms
    pub fn get_protocols(&self, conn: &dyn XConn, window: Window) -> Result<Vec<Atom>> {
        conn.property32(window, self.wm_protocols, AtomEnum::ATOM.into())
    }

    /// Send a WM_PROTOCOLS client message (WM_DELETE_WINDOW, WM_TAKE_FOCUS)
    pub fn send_protocol(&self, conn: &dyn XConn, window: Window, protocol: Atom, time: u32) -> Result<()> {
        conn.send_client_message(
            window,
            self.wm_protocols,
            [protocol, time, 0, 0, 0],
            EventMask::NO_EVENT,
        )
    }
}

/// ICCCM WM_STATE values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum IcccmState {
    Withdrawn = 0,
    Normal = 1,
    Iconic = 3,
}

/// `_NET_WM_STATE` client message action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateAction {
    Remove,
    Add,
    Toggle,
}

impl StateAction {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Remove),
            1 => Some(Self::Add),
            2 => Some(Self::Toggle),
            _ => None,
        }
    }

    /// Resolve against the current value of the flag
    pub fn apply(self, current: bool) -> bool {
        match self {
            Self::Remove => false,
            Self::Add => true,
            Self::Toggle => !current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::testing::{FakeConn, Request};

    #[test]
    fn test_state_action() {
        assert_eq!(StateAction::from_u32(0), Some(StateAction::Remove));
        assert_eq!(StateAction::from_u32(2), Some(StateAction::Toggle));
        assert_eq!(StateAction::from_u32(7), None);
        assert!(StateAction::Toggle.apply(false));
        assert!(!StateAction::Toggle.apply(true));
        assert!(StateAction::Add.apply(true));
        assert!(!StateAction::Remove.apply(true));
    }

    #[test]
    fn test_setup_supported_publishes_check_window() {
        let conn = FakeConn::new();
        let atoms = Atoms::new(&conn).unwrap();
        let root = conn.root();
        atoms.setup_supported(&conn, root, 0x500).unwrap();

        assert_eq!(
            conn.prop32(root, atoms.net_supporting_wm_check),
            vec![0x500]
        );
        assert_eq!(
            conn.prop32(0x500, atoms.net_supporting_wm_check),
            vec![0x500]
        );
        assert_eq!(
            conn.text(0x500, atoms.net_wm_name).as_deref(),
            Some(WM_NAME)
        );
        assert_eq!(conn.prop32(root, atoms.net_number_of_desktops), vec![1]);
        assert!(conn
            .prop32(root, atoms.net_supported)
            .contains(&atoms.net_wm_moveresize));
    }

    #[test]
    fn test_wm_state_and_protocol_message() {
        let conn = FakeConn::new();
        let atoms = Atoms::new(&conn).unwrap();
        atoms.set_wm_state(&conn, 0x400, IcccmState::Iconic).unwrap();
        assert_eq!(conn.prop32(0x400, atoms.wm_state), vec![3, 0]);

        atoms
            .send_protocol(&conn, 0x400, atoms.wm_delete_window, 0)
            .unwrap();
        assert!(conn.take_requests().contains(&Request::ClientMessage {
            window: 0x400,
            message_type: atoms.wm_protocols,
            data: [atoms.wm_delete_window, 0, 0, 0, 0],
        }));
    }
}
