//! Minimum-interval guard for pipeline steps

use std::time::{Duration, Instant};

/// Remembers when a step body last ran
///
/// `ready` never rearms by itself; the step that qualifies calls
/// [`Throttle::rearm`]. A pipeline may share one throttle across all of its
/// steps so they run on a single pacing clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct Throttle {
    last: Option<Instant>,
}

impl Throttle {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when never armed, or more than `interval` has passed since arming
    pub fn ready(&self, now: Instant, interval: Duration) -> bool {
        match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) > interval,
        }
    }

    pub fn rearm(&mut self, now: Instant) {
        self.last = Some(now);
    }

    /// Forget the last trigger so the next check passes immediately
    pub fn clear(&mut self) {
        self.last = None;
    }

    pub fn last_trigger(&self) -> Option<Instant> {
        self.last
    }
}
