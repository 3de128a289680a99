//! Outbound events.
//!
//! The [`Orchestrator`](super::service::Orchestrator) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Together they form the
//! append-only stream the sync worker persists: samples with their trust
//! verdict, actuator changes, alerts, faults and connectivity.

use serde::Serialize;

use crate::control::{Alert, IntentSource, Verdict};
use crate::cycle::CycleTransition;
use crate::error::FaultKind;
use crate::link::LinkEvent;
use crate::protocol::{SwitchState, TelemetrySample, ZoneId};

/// Host's best-known state of one physical actuator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActuatorState {
    pub zone: ZoneId,
    pub name: String,
    pub state: SwitchState,
    pub changed_at_ms: u64,
    /// `None` for host-initiated resets (startup, link restore, shutdown).
    pub source: Option<IntentSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CoreEvent {
    Started { zones: Vec<ZoneId> },
    Sample { sample: TelemetrySample, verdict: Verdict },
    ActuatorChanged { actuator: ActuatorState },
    DispatchFailed { zone: ZoneId, actuator: String, state: SwitchState, reason: String },
    Cycle { zone: ZoneId, transition: CycleTransition },
    Alert { alert: Alert },
    SensorFaultSuspected { zone: ZoneId, consecutive: u32 },
    Fault { kind: FaultKind, zone: Option<ZoneId>, detail: String },
    Link { change: LinkEvent },
    OverrideSet { zone: ZoneId, actuator: String, state: SwitchState, expires_at_ms: u64 },
    OverrideEnded { zone: ZoneId, actuator: String, expired: bool },
    AutoMode { enabled: bool },
    Shutdown,
}
