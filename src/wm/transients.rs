//! Transients Module
//!
//! Leader to children lookup for transient-for relations. Dialogs raise
//! and iconify together with their leader; nothing here owns a window.

use std::collections::{HashMap, HashSet};

use tracing::debug;
use x11rb::protocol::xproto::Window;

/// Transient graph
#[derive(Debug, Default)]
pub struct TransientGraph {
    /// leader -> children
    children: HashMap<Window, HashSet<Window>>,
    /// child -> leader
    leaders: HashMap<Window, Window>,
}

impl TransientGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or clear) the leader of `window`. Self references and links
    /// that would close a cycle are refused.
    pub fn set_transient_for(&mut self, window: Window, leader: Option<Window>) {
        self.unlink(window);
        let Some(leader) = leader else {
            return;
        };
        if leader == window || self.root_leader(leader) == window {
            debug!(
                "Ignoring cyclic transient-for 0x{:x} -> 0x{:x}",
                window, leader
            );
            return;
        }
        self.children.entry(leader).or_default().insert(window);
        self.leaders.insert(window, leader);
        debug!("Window 0x{:x} is transient for 0x{:x}", window, leader);
    }

    pub fn leader_of(&self, window: Window) -> Option<Window> {
        self.leaders.get(&window).copied()
    }

    /// Top of the leader chain (the window itself when it has none)
    pub fn root_leader(&self, window: Window) -> Window {
        let mut current = window;
        let mut seen = HashSet::new();
        while let Some(&leader) = self.leaders.get(&current) {
            if !seen.insert(current) {
                break;
            }
            current = leader;
        }
        current
    }

    /// All transitive children of `leader`, parents before their children
    pub fn descendants(&self, leader: Window) -> Vec<Window> {
        let mut result = Vec::new();
        let mut queue = vec![leader];
        while let Some(current) = queue.pop() {
            if let Some(children) = self.children.get(&current) {
                let mut sorted: Vec<Window> = children.iter().copied().collect();
                sorted.sort_unstable();
                for child in sorted {
                    if child != leader && !result.contains(&child) {
                        result.push(child);
                        queue.push(child);
                    }
                }
            }
        }
        result
    }

    /// Forget a destroyed window in both directions
    pub fn remove(&mut self, window: Window) {
        self.unlink(window);
        if let Some(children) = self.children.remove(&window) {
            for child in children {
                self.leaders.remove(&child);
            }
        }
    }

    fn unlink(&mut self, window: Window) {
        if let Some(leader) = self.leaders.remove(&window) {
            if let Some(children) = self.children.get_mut(&leader) {
                children.remove(&window);
                if children.is_empty() {
                    self.children.remove(&leader);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descendants_and_removal() {
        let mut graph = TransientGraph::new();
        graph.set_transient_for(2, Some(1));
        graph.set_transient_for(3, Some(2));
        graph.set_transient_for(4, Some(1));

        assert_eq!(graph.descendants(1), vec![2, 4, 3]);
        assert_eq!(graph.root_leader(3), 1);
        assert_eq!(graph.leader_of(4), Some(1));

        graph.remove(1);
        assert_eq!(graph.leader_of(2), None);
        assert_eq!(graph.descendants(2), vec![3]);
    }

    #[test]
    fn test_cycles_refused() {
        let mut graph = TransientGraph::new();
        graph.set_transient_for(1, Some(1));
        assert_eq!(graph.leader_of(1), None);

        graph.set_transient_for(2, Some(1));
        graph.set_transient_for(1, Some(2));
        assert_eq!(graph.leader_of(1), None);
        assert_eq!(graph.leader_of(2), Some(1));
    }

    #[test]
    fn test_relink_moves_child() {
        let mut graph = TransientGraph::new();
        graph.set_transient_for(3, Some(1));
        graph.set_transient_for(3, Some(2));
        assert!(graph.descendants(1).is_empty());
        assert_eq!(graph.descendants(2), vec![3]);
    }
}
