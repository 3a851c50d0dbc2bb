//! Focus Module
//!
//! Input focus follows ICCCM: passive-input clients get SetInputFocus,
//! clients speaking WM_TAKE_FOCUS get the protocol message, and clients
//! offering neither are never focused.

use anyhow::Result;
use tracing::debug;
use x11rb::protocol::xproto::Window;

use crate::wm::client::{Client, ManagedWindow};
use crate::wm::client_flags::WmFlags;
use crate::wm::conn::XConn;
use crate::wm::ewmh::Atoms;

/// Focus manager
#[derive(Debug, Default)]
pub struct FocusManager {
    focused: Option<Window>,
}

impl FocusManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focused(&self) -> Option<Window> {
        self.focused
    }

    pub fn is_focused(&self, window: Window) -> bool {
        self.focused == Some(window)
    }

    /// Give focus to `client`. Returns `None` when the client does not
    /// accept focus, otherwise the previously focused window (which may be
    /// the same one) so the caller can repaint it.
    pub fn focus(
        &mut self,
        conn: &dyn XConn,
        atoms: &Atoms,
        client: &mut Client,
        time: u32,
    ) -> Result<Option<Option<Window>>> {
        if !client.protocols.focusable() || client.is_iconic() {
            debug!("0x{:x} does not take focus", client.window);
            return Ok(None);
        }
        if client.protocols.contains(WmFlags::INPUT) {
            conn.set_input_focus(client.window, time)?;
        }
        if client.protocols.contains(WmFlags::TAKEFOCUS) {
            atoms.send_protocol(conn, client.window, atoms.wm_take_focus, time)?;
        }
        atoms.update_active_window(conn, conn.root(), Some(client.window))?;

        client.focused = true;
        let previous = self.focused.replace(client.window);
        debug!("Focus 0x{:x} (was {:?})", client.window, previous);
        Ok(Some(previous))
    }

    /// Drop focus to the root window
    pub fn clear(&mut self, conn: &dyn XConn, atoms: &Atoms) -> Result<Option<Window>> {
        let previous = self.focused.take();
        conn.set_input_focus(conn.root(), 0)?;
        atoms.update_active_window(conn, conn.root(), None)?;
        Ok(previous)
    }

    /// Forget a window that is going away. Returns whether it had focus.
    pub fn forget(&mut self, window: Window) -> bool {
        if self.focused == Some(window) {
            self.focused = None;
            return true;
        }
        false
    }
}
