//! Humidifier cycle controller on a function-pointer state machine.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │  StateTable                                           │
//! │  ┌─────────┬──────────┬────────────┬───────────────┐  │
//! │  │ Phase   │ on_enter │ on_exit    │ on_update     │  │
//! │  ├─────────┼──────────┼────────────┼───────────────┤  │
//! │  │ Idle    │ all OFF  │ —          │ start check   │  │
//! │  │ PhaseA  │ primary  │ all OFF    │ stop / Da     │  │
//! │  │ PhaseB  │ second.  │ all OFF    │ stop / Db     │  │
//! │  └─────────┴──────────┴────────────┴───────────────┘  │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! The machine is stepped by two events: a trusted sample (which also feeds
//! the trend window and is the only point where stop conditions run) and a
//! timer tick (which only advances phases).

pub mod context;
pub mod states;
pub mod trend;

use log::info;
use serde::Serialize;

pub use context::{CycleContext, PhaseOutputs, StopReason, Trigger};
pub use trend::{MAX_TREND_WINDOW, TrendWindow};

use crate::config::CycleConfig;
use crate::control::{ActuatorIntent, IntentSource};
use crate::protocol::ZoneId;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum CyclePhase {
    Idle = 0,
    PhaseA = 1,
    PhaseB = 2,
}

impl CyclePhase {
    pub const COUNT: usize = 3;

    pub fn from_index(idx: usize) -> Self {
        match idx {
            1 => Self::PhaseA,
            2 => Self::PhaseB,
            _ => {
                debug_assert!(idx == 0, "invalid phase index: {idx}");
                Self::Idle
            }
        }
    }

    pub fn is_running(self) -> bool {
        self != Self::Idle
    }
}

pub type StateActionFn = fn(&mut CycleContext);
pub type StateUpdateFn = fn(&mut CycleContext) -> Option<CyclePhase>;

/// One row of the state table.
pub struct StateDescriptor {
    pub id: CyclePhase,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

/// A phase change, reported to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleTransition {
    pub from: CyclePhase,
    pub to: CyclePhase,
    pub reason: Option<StopReason>,
    pub at_ms: u64,
}

/// Read-only view of the controller for snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleState {
    pub phase: CyclePhase,
    pub phase_entered_at_ms: u64,
    pub trend_points: usize,
    pub last_stop: Option<StopReason>,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct CycleController {
    table: [StateDescriptor; CyclePhase::COUNT],
    current: usize,
    ctx: CycleContext,
}

impl CycleController {
    pub fn new(config: CycleConfig) -> Self {
        let mut ctx = CycleContext::new(config);
        let table = states::build_state_table();
        if let Some(enter) = table[CyclePhase::Idle as usize].on_enter {
            enter(&mut ctx);
        }
        Self {
            table,
            current: CyclePhase::Idle as usize,
            ctx,
        }
    }

    pub fn phase(&self) -> CyclePhase {
        CyclePhase::from_index(self.current)
    }

    pub fn outputs(&self) -> PhaseOutputs {
        self.ctx.outputs
    }

    pub fn config(&self) -> &CycleConfig {
        &self.ctx.config
    }

    pub fn state(&self) -> CycleState {
        CycleState {
            phase: self.phase(),
            phase_entered_at_ms: self.ctx.phase_entered_ms,
            trend_points: self.ctx.trend.len(),
            last_stop: self.ctx.stop_reason,
        }
    }

    /// Record a trusted humidity reading without evaluating the machine.
    pub fn observe(&mut self, humidity: f32, at_ms: u64) {
        self.ctx.trend.push(at_ms, humidity);
        self.ctx.humidity = Some(humidity);
    }

    /// Feed a trusted reading and evaluate start/stop/phase conditions.
    pub fn on_sample(&mut self, humidity: f32, at_ms: u64) -> Option<CycleTransition> {
        self.observe(humidity, at_ms);
        self.step(Trigger::Sample, at_ms)
    }

    /// Advance phases whose duration has elapsed.
    pub fn on_timer(&mut self, now_ms: u64) -> Option<CycleTransition> {
        self.step(Trigger::Timer, now_ms)
    }

    /// Force the machine back to Idle.
    pub fn stop(&mut self, reason: StopReason, now_ms: u64) -> Option<CycleTransition> {
        if !self.phase().is_running() {
            return None;
        }
        self.ctx.now_ms = now_ms;
        self.ctx.stop_reason = Some(reason);
        Some(self.transition(CyclePhase::Idle))
    }

    /// One intent per phase actuator reflecting the current outputs.
    pub fn intents(&self, zone: &ZoneId) -> [ActuatorIntent; 2] {
        let cfg = &self.ctx.config;
        let out = self.ctx.outputs;
        [
            ActuatorIntent::new(
                zone.clone(),
                cfg.primary_actuator.clone(),
                out.primary,
                IntentSource::CycleController,
            ),
            ActuatorIntent::new(
                zone.clone(),
                cfg.secondary_actuator.clone(),
                out.secondary,
                IntentSource::CycleController,
            ),
        ]
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn step(&mut self, trigger: Trigger, now_ms: u64) -> Option<CycleTransition> {
        self.ctx.trigger = trigger;
        self.ctx.now_ms = now_ms.max(self.ctx.now_ms);
        let next = (self.table[self.current].on_update)(&mut self.ctx)?;
        Some(self.transition(next))
    }

    fn transition(&mut self, next: CyclePhase) -> CycleTransition {
        let from = self.phase();
        let next_idx = next as usize;
        info!(
            "cycle: {} -> {}{}",
            self.table[self.current].name,
            self.table[next_idx].name,
            match (next, self.ctx.stop_reason) {
                (CyclePhase::Idle, Some(r)) => format!(" ({r:?})"),
                _ => String::new(),
            }
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(&mut self.ctx);
        }
        self.current = next_idx;
        self.ctx.phase_entered_ms = self.ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(&mut self.ctx);
        }

        CycleTransition {
            from,
            to: next,
            reason: if next == CyclePhase::Idle { self.ctx.stop_reason } else { None },
            at_ms: self.ctx.now_ms,
        }
    }
}
