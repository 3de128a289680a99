//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Orchestrator (domain)
//! ```
//!
//! The orchestrator takes these as generics at each call site, so the
//! domain core never touches the serial port, the clock or the journal
//! directly.

use crate::error::TransportError;
use crate::protocol::Command;

use super::events::CoreEvent;

// ───────────────────────────────────────────────────────────────
// Command port (domain → node)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the orchestrator dispatches actuator commands here.
pub trait CommandPort {
    /// Deliver one command.  Must not block past the transport timeout.
    fn dispatch(&mut self, command: &Command) -> Result<(), TransportError>;

    /// Whether a dispatch has any chance of succeeding right now.
    fn is_connected(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / persistence)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`CoreEvent`]s through this port.  Adapters
/// decide where they go (log lines, the sync channel, a test recorder).
/// Implementations must never block.
pub trait EventSink {
    fn emit(&mut self, event: &CoreEvent);
}

/// Fan one event out to two sinks.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &CoreEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic milliseconds since an arbitrary origin.
pub trait Clock {
    fn now_ms(&self) -> u64;
}
