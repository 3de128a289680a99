//! Immutable snapshots for dashboard readers.
//!
//! The orchestrator builds a fresh [`ControlSnapshot`] and publishes it on a
//! [`SnapshotBoard`]; readers get an `Arc` to a frozen value and can never
//! reach live control state.

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::control::Verdict;
use crate::cycle::CycleState;
use crate::link::LinkStatus;
use crate::protocol::{SwitchState, TelemetrySample, ZoneId};

use super::events::ActuatorState;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneSnapshot {
    pub zone: ZoneId,
    pub latest: Option<TelemetrySample>,
    pub verdict: Option<Verdict>,
    pub cycle: Option<CycleState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideView {
    pub zone: ZoneId,
    pub actuator: String,
    pub state: SwitchState,
    pub expires_at_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControlSnapshot {
    pub taken_at_ms: u64,
    pub auto_mode: bool,
    pub in_grace: bool,
    pub link: LinkStatus,
    pub actuators: Vec<ActuatorState>,
    pub zones: Vec<ZoneSnapshot>,
    pub overrides: Vec<OverrideView>,
}

/// Latest published snapshot, shareable across threads.
#[derive(Debug, Clone, Default)]
pub struct SnapshotBoard {
    inner: Arc<RwLock<Arc<ControlSnapshot>>>,
}

impl SnapshotBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: ControlSnapshot) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Arc::new(snapshot);
    }

    pub fn latest(&self) -> Arc<ControlSnapshot> {
        Arc::clone(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }
}
