//! Stacking Module
//!
//! Canonical window order. `stacking` runs top to bottom (index 0 is the
//! top), `mapping` is insertion order; both always hold exactly the live
//! window set. Every change republishes `_NET_CLIENT_LIST` and
//! `_NET_CLIENT_LIST_STACKING`.

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::debug;
use x11rb::protocol::xproto::Window;

use crate::shared::Geometry;
use crate::wm::client::ManagedWindow;
use crate::wm::conn::{Restack, WindowChanges, XConn};
use crate::wm::ewmh::Atoms;

/// Notifications for the shell side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    Added(Window),
    Removed(Window),
    Moved { window: Window, geometry: Geometry },
    /// Shutdown had to kill these clients because they did not close in
    /// time; the shell names them to the user
    ShutdownForced { blocking: Vec<Window> },
}

/// Stacking manager
pub struct StackingManager {
    /// Top to bottom
    stacking: Vec<Window>,
    /// Oldest first
    mapping: Vec<Window>,
    events: broadcast::Sender<WindowEvent>,
}

impl StackingManager {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            stacking: Vec::new(),
            mapping: Vec::new(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WindowEvent> {
        self.events.subscribe()
    }

    /// Broadcast an event; having no listeners is fine
    pub fn notify(&self, event: WindowEvent) {
        let _ = self.events.send(event);
    }

    pub fn top(&self) -> Option<Window> {
        self.stacking.first().copied()
    }

    pub fn contains(&self, window: Window) -> bool {
        self.mapping.contains(&window)
    }

    /// Top to bottom
    pub fn stacking_order(&self) -> &[Window] {
        &self.stacking
    }

    pub fn mapping_order(&self) -> &[Window] {
        &self.mapping
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Track a new window on top of the stack
    pub fn add(&mut self, conn: &dyn XConn, atoms: &Atoms, window: &dyn ManagedWindow) -> Result<()> {
        let id = window.id();
        if self.contains(id) {
            return Ok(());
        }
        self.stacking.insert(0, id);
        self.mapping.push(id);
        debug!("Stacking: added 0x{:x} ({} windows)", id, self.mapping.len());
        self.notify(WindowEvent::Added(id));
        self.publish(conn, atoms)
    }

    /// Restack above the current top and move to the head. Iconic and
    /// untracked windows are left alone.
    pub fn raise(&mut self, conn: &dyn XConn, atoms: &Atoms, window: &dyn ManagedWindow) -> Result<bool> {
        let id = window.id();
        if window.is_iconic() || !self.contains(id) {
            return Ok(false);
        }
        conn.configure(
            window.stacking_surface(),
            &WindowChanges::restack(Restack::Above(None)),
        )?;
        if self.top() != Some(id) {
            self.stacking.retain(|&w| w != id);
            self.stacking.insert(0, id);
            self.publish(conn, atoms)?;
        }
        Ok(true)
    }

    /// Move to the bottom of the stack
    pub fn lower(&mut self, conn: &dyn XConn, atoms: &Atoms, window: &dyn ManagedWindow) -> Result<bool> {
        let id = window.id();
        if !self.contains(id) {
            return Ok(false);
        }
        conn.configure(
            window.stacking_surface(),
            &WindowChanges::restack(Restack::Below(None)),
        )?;
        if self.stacking.last() != Some(&id) {
            self.stacking.retain(|&w| w != id);
            self.stacking.push(id);
            self.publish(conn, atoms)?;
        }
        Ok(true)
    }

    /// Forget a window. Returns the new top when the removed window was
    /// on top, so the caller can move focus there.
    pub fn remove(&mut self, conn: &dyn XConn, atoms: &Atoms, window: Window) -> Result<Option<Window>> {
        if !self.contains(window) {
            return Ok(None);
        }
        let was_top = self.top() == Some(window);
        self.stacking.retain(|&w| w != window);
        self.mapping.retain(|&w| w != window);
        debug!("Stacking: removed 0x{:x} ({} windows)", window, self.mapping.len());
        self.notify(WindowEvent::Removed(window));
        self.publish(conn, atoms)?;
        Ok(if was_top { self.top() } else { None })
    }

    /// Topmost window passing `eligible`
    pub fn topmost(&self, eligible: impl Fn(Window) -> bool) -> Option<Window> {
        self.stacking.iter().copied().find(|&w| eligible(w))
    }

    /// Bottom-most window passing `eligible`, excluding the current top
    pub fn cycle_candidate(&self, eligible: impl Fn(Window) -> bool) -> Option<Window> {
        let top = self.top();
        self.stacking
            .iter()
            .rev()
            .copied()
            .find(|&w| Some(w) != top && eligible(w))
    }

    /// Publish both client lists on the root window
    pub fn publish(&self, conn: &dyn XConn, atoms: &Atoms) -> Result<()> {
        let root = conn.root();
        atoms.update_client_list(conn, root, &self.mapping)?;
        let bottom_to_top: Vec<Window> = self.stacking.iter().rev().copied().collect();
        atoms.update_client_list_stacking(conn, root, &bottom_to_top)
    }
}

impl Default for StackingManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::client::{Client, Transition};
    use crate::wm::testing::FakeConn;

    const A: Window = 0xa;
    const B: Window = 0xb;
    const C: Window = 0xc;

    fn client(window: Window) -> Client {
        Client::new(window, Geometry::new(0, 0, 100, 100))
    }

    fn setup() -> (FakeConn, Atoms, StackingManager) {
        let conn = FakeConn::new();
        let atoms = Atoms::new(&conn).unwrap();
        (conn, atoms, StackingManager::new())
    }

    fn assert_consistent(stack: &StackingManager) {
        assert_eq!(stack.top(), stack.stacking_order().first().copied());
        let mut stacking = stack.stacking_order().to_vec();
        let mut mapping = stack.mapping_order().to_vec();
        stacking.sort_unstable();
        mapping.sort_unstable();
        assert_eq!(stacking, mapping);
    }

    #[test]
    fn test_add_and_raise_orders() {
        let (conn, atoms, mut stack) = setup();
        let clients = [client(A), client(B), client(C)];
        for c in &clients {
            stack.add(&conn, &atoms, c).unwrap();
        }
        assert_eq!(stack.mapping_order(), &[A, B, C]);
        assert_eq!(stack.stacking_order(), &[C, B, A]);

        assert!(stack.raise(&conn, &atoms, &clients[0]).unwrap());
        assert_eq!(stack.stacking_order(), &[A, C, B]);
        assert_eq!(stack.mapping_order(), &[A, B, C]);

        let root = conn.root();
        assert_eq!(conn.prop32(root, atoms.net_client_list), vec![A, B, C]);
        assert_eq!(
            conn.prop32(root, atoms.net_client_list_stacking),
            vec![B, C, A]
        );
        assert_consistent(&stack);
    }

    #[test]
    fn test_raise_ignores_iconic_and_untracked() {
        let (conn, atoms, mut stack) = setup();
        let mut a = client(A);
        stack.add(&conn, &atoms, &a).unwrap();
        stack.add(&conn, &atoms, &client(B)).unwrap();

        let work = Geometry::new(0, 0, 1920, 1080);
        a.transition(Transition::Iconify, work, work).unwrap();
        conn.take_requests();
        assert!(!stack.raise(&conn, &atoms, &a).unwrap());
        assert!(!stack.raise(&conn, &atoms, &client(C)).unwrap());
        assert_eq!(conn.request_count(), 0);
        assert_eq!(stack.stacking_order(), &[B, A]);
    }

    #[test]
    fn test_remove_top_reports_new_top() {
        let (conn, atoms, mut stack) = setup();
        for w in [A, B, C] {
            stack.add(&conn, &atoms, &client(w)).unwrap();
        }
        assert_eq!(stack.remove(&conn, &atoms, A).unwrap(), None);
        assert_eq!(stack.remove(&conn, &atoms, C).unwrap(), Some(B));
        assert_eq!(stack.remove(&conn, &atoms, B).unwrap(), None);
        assert_eq!(stack.remove(&conn, &atoms, B).unwrap(), None);
        assert!(stack.is_empty());
        assert_eq!(stack.top(), None);
        assert!(conn.prop32(conn.root(), atoms.net_client_list).is_empty());
    }

    #[test]
    fn test_random_sequences_stay_consistent() {
        let (conn, atoms, mut stack) = setup();
        let windows: Vec<Client> = (1..=6).map(client).collect();
        // Deterministic pseudo-random walk over add/raise/lower/remove
        let mut seed = 0x2545_f491u32;
        for _ in 0..400 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let target = &windows[(seed % 6) as usize];
            match (seed >> 8) % 4 {
                0 => stack.add(&conn, &atoms, target).unwrap(),
                1 => {
                    stack.raise(&conn, &atoms, target).unwrap();
                }
                2 => {
                    stack.lower(&conn, &atoms, target).unwrap();
                }
                _ => {
                    stack.remove(&conn, &atoms, target.window).unwrap();
                }
            }
            assert_consistent(&stack);
        }
    }

    #[test]
    fn test_events_broadcast() {
        let (conn, atoms, mut stack) = setup();
        let mut events = stack.subscribe();
        stack.add(&conn, &atoms, &client(A)).unwrap();
        stack.remove(&conn, &atoms, A).unwrap();
        assert_eq!(events.try_recv().unwrap(), WindowEvent::Added(A));
        assert_eq!(events.try_recv().unwrap(), WindowEvent::Removed(A));
    }

    #[test]
    fn test_cycle_candidate_skips_top() {
        let (conn, atoms, mut stack) = setup();
        for w in [A, B, C] {
            stack.add(&conn, &atoms, &client(w)).unwrap();
        }
        assert_eq!(stack.cycle_candidate(|_| true), Some(A));
        assert_eq!(stack.cycle_candidate(|w| w != A), Some(B));
        assert_eq!(stack.topmost(|w| w != C), Some(B));
    }
}
