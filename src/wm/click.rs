//! Title bar click tracking
//!
//! Double-click detection as explicit deadline state. Time comes from an
//! injected [`Clock`] so tests can step it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use x11rb::protocol::xproto::Window;

/// Source of monotonic time
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<Instant>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: std::sync::Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Click {
    Single,
    Double,
}

#[derive(Debug, Clone, Copy)]
struct PendingClick {
    window: Window,
    x: i32,
    y: i32,
    deadline: Instant,
}

pub struct ClickTracker {
    clock: Arc<dyn Clock>,
    interval: Duration,
    distance: u32,
    pending: Option<PendingClick>,
}

impl ClickTracker {
    pub fn new(clock: Arc<dyn Clock>, interval: Duration, distance: u32) -> Self {
        Self {
            clock,
            interval,
            distance,
            pending: None,
        }
    }

    /// Register a title bar release. A second release on the same window,
    /// close to the first and before the deadline, is a double click and
    /// consumes the pending state.
    pub fn release(&mut self, window: Window, x: i32, y: i32) -> Click {
        let now = self.clock.now();
        if let Some(pending) = self.pending.take() {
            let near = pending.x.abs_diff(x) <= self.distance && pending.y.abs_diff(y) <= self.distance;
            if pending.window == window && near && now <= pending.deadline {
                return Click::Double;
            }
        }
        self.pending = Some(PendingClick {
            window,
            x,
            y,
            deadline: now + self.interval,
        });
        Click::Single
    }

    /// Drop an expired pending click. Returns whether one was dropped.
    pub fn expire(&mut self) -> bool {
        let now = self.clock.now();
        if self.pending.is_some_and(|p| now > p.deadline) {
            self.pending = None;
            return true;
        }
        false
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Forget state for a window that went away or started a drag
    pub fn reset(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> (Arc<ManualClock>, ClickTracker) {
        let clock = Arc::new(ManualClock::new());
        let tracker = ClickTracker::new(clock.clone(), Duration::from_millis(300), 6);
        (clock, tracker)
    }

    #[test]
    fn test_double_click_within_window() {
        let (clock, mut clicks) = tracker();
        assert_eq!(clicks.release(0x10, 100, 10), Click::Single);
        clock.advance(Duration::from_millis(200));
        assert_eq!(clicks.release(0x10, 103, 12), Click::Double);
        assert!(!clicks.is_pending());
    }

    #[test]
    fn test_expired_click_is_single() {
        let (clock, mut clicks) = tracker();
        clicks.release(0x10, 100, 10);
        clock.advance(Duration::from_millis(301));
        assert!(clicks.expire());
        assert!(!clicks.is_pending());
        assert_eq!(clicks.release(0x10, 100, 10), Click::Single);
    }

    #[test]
    fn test_late_second_click_starts_new_sequence() {
        let (clock, mut clicks) = tracker();
        clicks.release(0x10, 100, 10);
        clock.advance(Duration::from_millis(400));
        assert_eq!(clicks.release(0x10, 100, 10), Click::Single);
        clock.advance(Duration::from_millis(100));
        assert_eq!(clicks.release(0x10, 100, 10), Click::Double);
    }

    #[test]
    fn test_other_window_or_far_pointer_is_single() {
        let (_clock, mut clicks) = tracker();
        clicks.release(0x10, 100, 10);
        assert_eq!(clicks.release(0x11, 100, 10), Click::Single);
        assert_eq!(clicks.release(0x11, 120, 10), Click::Single);
        assert!(!clicks.expire());
    }
}
