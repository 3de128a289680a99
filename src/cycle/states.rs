//! Humidifier state handlers and table builder.
//!
//! ```text
//!  IDLE ──[humidity < target - hysteresis]──▶ PHASE_A (mist)
//!    ▲                                          │   ▲
//!    │                                   [Da]   │   │ [Db]
//!    │                                          ▼   │
//!    └──[critical │ predictive │ target]──── PHASE_B (fan)
//!                 (from either phase, samples only)
//! ```

use log::{info, warn};

use super::context::{CycleContext, PhaseOutputs, StopReason, Trigger};
use super::{CyclePhase, StateDescriptor};

/// Build the static state table.
pub fn build_state_table() -> [StateDescriptor; CyclePhase::COUNT] {
    [
        StateDescriptor {
            id: CyclePhase::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: CyclePhase::PhaseA,
            name: "PhaseA",
            on_enter: Some(phase_a_enter),
            on_exit: Some(phase_exit),
            on_update: phase_a_update,
        },
        StateDescriptor {
            id: CyclePhase::PhaseB,
            name: "PhaseB",
            on_enter: Some(phase_b_enter),
            on_exit: Some(phase_exit),
            on_update: phase_b_update,
        },
    ]
}

// ── Idle ──────────────────────────────────────────────────────

fn idle_enter(ctx: &mut CycleContext) {
    ctx.outputs = PhaseOutputs::OFF;
}

fn idle_update(ctx: &mut CycleContext) -> Option<CyclePhase> {
    if ctx.trigger != Trigger::Sample {
        return None;
    }
    let humidity = ctx.humidity?;
    if humidity < ctx.config.target - ctx.config.hysteresis {
        info!(
            "cycle: humidity {:.1} below {:.1}, starting",
            humidity,
            ctx.config.target - ctx.config.hysteresis
        );
        ctx.stop_reason = None;
        return Some(CyclePhase::PhaseA);
    }
    None
}

// ── Running phases ────────────────────────────────────────────

fn phase_a_enter(ctx: &mut CycleContext) {
    ctx.outputs = PhaseOutputs::PRIMARY;
}

fn phase_b_enter(ctx: &mut CycleContext) {
    ctx.outputs = PhaseOutputs::SECONDARY;
}

/// Both outputs drop before the next phase raises its own.
fn phase_exit(ctx: &mut CycleContext) {
    ctx.outputs = PhaseOutputs::OFF;
}

fn phase_a_update(ctx: &mut CycleContext) -> Option<CyclePhase> {
    running_update(ctx, u64::from(ctx.config.phase_a_secs) * 1000, CyclePhase::PhaseB)
}

fn phase_b_update(ctx: &mut CycleContext) -> Option<CyclePhase> {
    running_update(ctx, u64::from(ctx.config.phase_b_secs) * 1000, CyclePhase::PhaseA)
}

fn running_update(ctx: &mut CycleContext, duration_ms: u64, next: CyclePhase) -> Option<CyclePhase> {
    if ctx.trigger == Trigger::Sample {
        if let Some(reason) = stop_condition(ctx) {
            ctx.stop_reason = Some(reason);
            return Some(CyclePhase::Idle);
        }
    }
    if ctx.elapsed_in_phase_ms() >= duration_ms {
        return Some(next);
    }
    None
}

/// Highest-priority stop condition for the current humidity, if any.
///
/// The predictive check only runs once humidity is back inside the band
/// (`>= target - hysteresis`), so a predictive stop never lands where Idle
/// would immediately restart the cycle.
pub fn stop_condition(ctx: &CycleContext) -> Option<StopReason> {
    let humidity = ctx.humidity?;
    let cfg = &ctx.config;

    if humidity >= cfg.critical_max {
        warn!("cycle: humidity {:.1} at critical max {:.1}", humidity, cfg.critical_max);
        return Some(StopReason::Emergency);
    }
    let in_band = humidity >= cfg.target - cfg.hysteresis;
    if let Some(predicted) = ctx.trend.predict_rising(cfg.lookahead_secs).filter(|_| in_band) {
        if predicted > cfg.target + cfg.safety_margin {
            info!(
                "cycle: predicted {:.1} in {:.0}s exceeds {:.1}",
                predicted,
                cfg.lookahead_secs,
                cfg.target + cfg.safety_margin
            );
            return Some(StopReason::Predictive);
        }
    }
    if humidity >= cfg.target {
        return Some(StopReason::TargetReached);
    }
    None
}
