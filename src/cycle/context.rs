//! Blackboard threaded through every cycle state handler.

use serde::Serialize;

use super::trend::TrendWindow;
use crate::config::CycleConfig;
use crate::protocol::SwitchState;

/// What woke the machine up.  Stop conditions are only checked on samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Sample,
    Timer,
}

/// Why a running cycle returned to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Humidity reached the critical maximum.
    Emergency,
    /// The trend projects past `target + safety_margin`.
    Predictive,
    TargetReached,
    /// Stopped from outside (auto mode off, shutdown).
    Disabled,
}

/// Desired states of the two phase actuators.  Never both ON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseOutputs {
    pub primary: SwitchState,
    pub secondary: SwitchState,
}

impl PhaseOutputs {
    pub const OFF: Self = Self {
        primary: SwitchState::Off,
        secondary: SwitchState::Off,
    };
    pub const PRIMARY: Self = Self {
        primary: SwitchState::On,
        secondary: SwitchState::Off,
    };
    pub const SECONDARY: Self = Self {
        primary: SwitchState::Off,
        secondary: SwitchState::On,
    };
}

pub struct CycleContext {
    pub config: CycleConfig,
    pub trend: TrendWindow,
    /// Latest trusted humidity, if any has arrived.
    pub humidity: Option<f32>,
    pub now_ms: u64,
    pub trigger: Trigger,
    /// Set by the engine on every transition.
    pub phase_entered_ms: u64,
    pub outputs: PhaseOutputs,
    /// Written by a handler just before it returns to Idle.
    pub stop_reason: Option<StopReason>,
}

impl CycleContext {
    pub fn new(config: CycleConfig) -> Self {
        let trend = TrendWindow::new(config.trend_window);
        Self {
            config,
            trend,
            humidity: None,
            now_ms: 0,
            trigger: Trigger::Timer,
            phase_entered_ms: 0,
            outputs: PhaseOutputs::OFF,
            stop_reason: None,
        }
    }

    pub fn elapsed_in_phase_ms(&self) -> u64 {
        self.now_ms.saturating_sub(self.phase_entered_ms)
    }
}
