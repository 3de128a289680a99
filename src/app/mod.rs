//! Application core — host-side automation, zero I/O.
//!
//! The [`Orchestrator`](service::Orchestrator) turns validated telemetry into
//! actuator commands: anomaly filtering, threshold policy, humidifier cycle,
//! manual overrides and priority resolution.  All interaction with the
//! outside world happens through **port traits** defined in [`ports`], so
//! this layer runs unchanged against mock adapters.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
pub mod snapshot;

pub use commands::ControlCommand;
pub use events::{ActuatorState, CoreEvent};
pub use ports::{Clock, CommandPort, EventSink};
pub use service::Orchestrator;
pub use snapshot::{ControlSnapshot, SnapshotBoard};
