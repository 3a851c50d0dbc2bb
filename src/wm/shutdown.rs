//! Two-phase shutdown
//!
//! Phase one asks every client to close; phase two ends either when the
//! last one is gone or when the timeout hits, in which case the remaining
//! clients block the shutdown.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use x11rb::protocol::xproto::Window;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Clean,
    /// These clients did not close in time and were killed
    Forced { blocking: Vec<Window> },
}

/// What triggered the shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal,
    Shortcut,
}

#[derive(Debug)]
pub struct ShutdownCoordinator {
    reason: ShutdownReason,
    waiting: BTreeSet<Window>,
    deadline: Instant,
}

impl ShutdownCoordinator {
    pub fn new(
        reason: ShutdownReason,
        windows: impl IntoIterator<Item = Window>,
        timeout: Duration,
        now: Instant,
    ) -> Self {
        let waiting: BTreeSet<Window> = windows.into_iter().collect();
        info!(
            "Shutdown requested ({:?}), waiting for {} clients",
            reason,
            waiting.len()
        );
        Self {
            reason,
            waiting,
            deadline: now + timeout,
        }
    }

    pub fn reason(&self) -> ShutdownReason {
        self.reason
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// A client went away
    pub fn closed(&mut self, window: Window) {
        if self.waiting.remove(&window) {
            debug!("0x{:x} closed, {} remaining", window, self.waiting.len());
        }
    }

    pub fn waiting(&self) -> impl Iterator<Item = Window> + '_ {
        self.waiting.iter().copied()
    }

    /// Outcome once decided: every client gone, or the deadline passed
    pub fn poll(&self, now: Instant) -> Option<ShutdownOutcome> {
        if self.waiting.is_empty() {
            return Some(ShutdownOutcome::Clean);
        }
        if now >= self.deadline {
            return Some(ShutdownOutcome::Forced {
                blocking: self.waiting.iter().copied().collect(),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_when_all_close() {
        let start = Instant::now();
        let mut shutdown = ShutdownCoordinator::new(
            ShutdownReason::Signal,
            [1, 2],
            Duration::from_secs(5),
            start,
        );
        assert_eq!(shutdown.poll(start), None);
        shutdown.closed(1);
        shutdown.closed(1);
        assert_eq!(shutdown.poll(start), None);
        shutdown.closed(2);
        assert_eq!(shutdown.poll(start), Some(ShutdownOutcome::Clean));
    }

    #[test]
    fn test_timeout_reports_blocking_clients() {
        let start = Instant::now();
        let mut shutdown = ShutdownCoordinator::new(
            ShutdownReason::Shortcut,
            [3, 1, 2],
            Duration::from_millis(500),
            start,
        );
        shutdown.closed(2);
        assert_eq!(shutdown.poll(start + Duration::from_millis(499)), None);
        assert_eq!(
            shutdown.poll(start + Duration::from_millis(500)),
            Some(ShutdownOutcome::Forced {
                blocking: vec![1, 3]
            })
        );
    }

    #[test]
    fn test_nothing_to_wait_for() {
        let start = Instant::now();
        let shutdown =
            ShutdownCoordinator::new(ShutdownReason::Signal, [], Duration::ZERO, start);
        assert_eq!(shutdown.poll(start), Some(ShutdownOutcome::Clean));
    }
}
