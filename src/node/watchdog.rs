//! Safety watchdog.
//!
//! Runs inside the node's cooperative loop.  Any frame that passes the codec
//! (command, keepalive, anything) counts as liveness; garbage does not.
//!
//! ## Trip lifecycle
//!
//! 1. `Armed`: every valid frame restarts the timer.
//! 2. More than `timeout_ms` without one: `Tripped`.  The caller forces all
//!    relays OFF the same iteration.
//! 3. The next valid frame re-arms the watchdog.  Relays stay OFF until a
//!    command turns them on again; nothing is restored.

use log::{error, info};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchdogState {
    Armed,
    Tripped,
}

pub struct SafetyWatchdog {
    timeout_ms: u64,
    last_valid_ms: u64,
    state: WatchdogState,
    trips: u32,
}

impl SafetyWatchdog {
    /// Armed, with the timer starting at `now_ms`.
    pub fn new(timeout_ms: u64, now_ms: u64) -> Self {
        Self {
            timeout_ms,
            last_valid_ms: now_ms,
            state: WatchdogState::Armed,
            trips: 0,
        }
    }

    /// A frame passed the codec.
    pub fn on_valid_frame(&mut self, now_ms: u64) {
        self.last_valid_ms = now_ms;
        if self.state == WatchdogState::Tripped {
            info!("watchdog re-armed, outputs stay OFF until commanded");
            self.state = WatchdogState::Armed;
        }
    }

    /// Check the timer.  Returns `true` on the iteration that trips.
    pub fn service(&mut self, now_ms: u64) -> bool {
        if self.state != WatchdogState::Armed {
            return false;
        }
        let silent_ms = now_ms.saturating_sub(self.last_valid_ms);
        if silent_ms <= self.timeout_ms {
            return false;
        }
        self.state = WatchdogState::Tripped;
        self.trips = self.trips.saturating_add(1);
        error!(
            "SAFETY TRIP: no valid frame for {} ms (limit {} ms), forcing outputs OFF",
            silent_ms, self.timeout_ms
        );
        true
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    pub fn is_tripped(&self) -> bool {
        self.state == WatchdogState::Tripped
    }

    pub fn trip_count(&self) -> u32 {
        self.trips
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }
}
