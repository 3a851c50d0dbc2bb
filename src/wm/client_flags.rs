//! Client Flags
//!
//! Protocol capability flags and the EWMH window type classification.

use bitflags::bitflags;
use x11rb::protocol::xproto::Atom;

use crate::wm::ewmh::Atoms;

bitflags! {
    /// WM flags - protocols and input model advertised by the client
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WmFlags: u32 {
        const DELETE       = 1 << 0;
        const INPUT        = 1 << 1;
        const TAKEFOCUS    = 1 << 2;
    }
}

impl WmFlags {
    /// Build from WM_PROTOCOLS and the WM_HINTS input field
    pub fn from_protocols(protocols: &[Atom], input: bool, atoms: &Atoms) -> Self {
        let mut flags = Self::empty();
        if protocols.contains(&atoms.wm_delete_window) {
            flags |= Self::DELETE;
        }
        if protocols.contains(&atoms.wm_take_focus) {
            flags |= Self::TAKEFOCUS;
        }
        if input {
            flags |= Self::INPUT;
        }
        flags
    }

    /// Focus may be given: passive input or the take-focus protocol
    pub fn focusable(&self) -> bool {
        self.intersects(Self::INPUT | Self::TAKEFOCUS)
    }
}

/// Window type (EWMH _NET_WM_WINDOW_TYPE)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    Normal,
    Desktop,
    Dock,
    Dialog,
    Toolbar,
    Menu,
    Utility,
    Splashscreen,
    Notification,
    DropdownMenu,
    PopupMenu,
    Tooltip,
    Combo,
    Dnd,
}

impl WindowType {
    pub fn from_atom(atom: Atom, atoms: &Atoms) -> Option<Self> {
        let window_type = if atom == atoms.net_wm_window_type_normal {
            Self::Normal
        } else if atom == atoms.net_wm_window_type_desktop {
            Self::Desktop
        } else if atom == atoms.net_wm_window_type_dock {
            Self::Dock
        } else if atom == atoms.net_wm_window_type_dialog {
            Self::Dialog
        } else if atom == atoms.net_wm_window_type_toolbar {
            Self::Toolbar
        } else if atom == atoms.net_wm_window_type_menu {
            Self::Menu
        } else if atom == atoms.net_wm_window_type_utility {
            Self::Utility
        } else if atom == atoms.net_wm_window_type_splash {
            Self::Splashscreen
        } else if atom == atoms.net_wm_window_type_notification {
            Self::Notification
        } else if atom == atoms.net_wm_window_type_dropdown_menu {
            Self::DropdownMenu
        } else if atom == atoms.net_wm_window_type_popup_menu {
            Self::PopupMenu
        } else if atom == atoms.net_wm_window_type_tooltip {
            Self::Tooltip
        } else if atom == atoms.net_wm_window_type_combo {
            Self::Combo
        } else if atom == atoms.net_wm_window_type_dnd {
            Self::Dnd
        } else {
            return None;
        };
        Some(window_type)
    }

    /// First recognised type in the client's list. Without one, transients
    /// are dialogs and everything else is normal.
    pub fn classify(types: &[Atom], transient: bool, atoms: &Atoms) -> Self {
        types
            .iter()
            .find_map(|&atom| Self::from_atom(atom, atoms))
            .unwrap_or(if transient { Self::Dialog } else { Self::Normal })
    }

    /// Types the window manager never frames or tracks. Docks are not
    /// framed either but their struts are honoured.
    pub fn is_unmanaged(&self) -> bool {
        matches!(
            self,
            Self::Desktop
                | Self::Dock
                | Self::Notification
                | Self::Tooltip
                | Self::PopupMenu
                | Self::DropdownMenu
                | Self::Combo
                | Self::Dnd
        )
    }

    pub fn decorated_by_default(&self) -> bool {
        !matches!(self, Self::Splashscreen) && !self.is_unmanaged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::testing::FakeConn;

    #[test]
    fn test_classify() {
        let conn = FakeConn::new();
        let atoms = Atoms::new(&conn).unwrap();

        assert_eq!(WindowType::classify(&[], false, &atoms), WindowType::Normal);
        assert_eq!(WindowType::classify(&[], true, &atoms), WindowType::Dialog);
        // Unknown atoms are skipped in favour of the next known one
        assert_eq!(
            WindowType::classify(&[9999, atoms.net_wm_window_type_dock], false, &atoms),
            WindowType::Dock
        );
        assert!(WindowType::Tooltip.is_unmanaged());
        assert!(!WindowType::Dialog.is_unmanaged());
        assert!(!WindowType::Splashscreen.decorated_by_default());
        assert!(WindowType::Utility.decorated_by_default());
    }

    #[test]
    fn test_wm_flags() {
        let conn = FakeConn::new();
        let atoms = Atoms::new(&conn).unwrap();
        let flags = WmFlags::from_protocols(&[atoms.wm_take_focus], false, &atoms);
        assert!(flags.contains(WmFlags::TAKEFOCUS));
        assert!(!flags.contains(WmFlags::DELETE));
        assert!(flags.focusable());
        assert!(!WmFlags::from_protocols(&[], false, &atoms).focusable());
    }
}
