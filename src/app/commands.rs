//! Inbound commands to the orchestrator.
//!
//! These represent operator actions from the dashboard or CLI that the
//! [`Orchestrator`](super::service::Orchestrator) interprets and acts upon.

use serde::{Deserialize, Serialize};

use crate::protocol::{SwitchState, ZoneId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Force an actuator, outranking all automation until it expires.
    ManualOverride {
        zone: ZoneId,
        actuator: String,
        state: SwitchState,
    },

    /// Drop a manual override early and hand control back to automation.
    ClearOverride { zone: ZoneId, actuator: String },

    /// Enable or suspend automated control.  Manual overrides still apply.
    SetAutoMode { enabled: bool },
}
