//! Host time adapter.
//!
//! Provides monotonic milliseconds for the control loop via
//! `std::time::Instant`.  Everything downstream takes time as an explicit
//! `u64`, so tests drive their own clock instead.

use std::time::Instant;

use crate::app::ports::Clock;

/// Milliseconds since the adapter was created.
pub struct MonotonicClock {
    start: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    /// Seconds since start.
    pub fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
