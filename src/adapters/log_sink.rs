//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one line per [`CoreEvent`] through the
//! `log` facade.  The journal worker persists the same stream as JSON; this
//! is the human-readable view.

use log::{info, warn};

use crate::app::events::CoreEvent;
use crate::app::ports::EventSink;
use crate::link::LinkEvent;

/// Adapter that logs every [`CoreEvent`] to the console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &CoreEvent) {
        match event {
            CoreEvent::Started { zones } => {
                info!("START | zones={:?}", zones);
            }
            CoreEvent::Sample { sample, verdict } => {
                if sample.valid {
                    info!(
                        "TELEM | {} | T={:.1}\u{00b0}C RH={:.1}% CO2={}ppm | {:?}",
                        sample.zone, sample.temperature, sample.humidity, sample.co2, verdict,
                    );
                } else {
                    warn!("TELEM | {} | sensor fault | {:?}", sample.zone, verdict);
                }
            }
            CoreEvent::ActuatorChanged { actuator } => {
                info!(
                    "CMD   | {}/{} -> {} ({:?})",
                    actuator.zone, actuator.name, actuator.state, actuator.source,
                );
            }
            CoreEvent::DispatchFailed { zone, actuator, state, reason } => {
                warn!("CMD   | {}/{} -> {} failed: {}", zone, actuator, state, reason);
            }
            CoreEvent::Cycle { zone, transition } => {
                info!(
                    "CYCLE | {} | {:?} -> {:?} ({:?})",
                    zone, transition.from, transition.to, transition.reason,
                );
            }
            CoreEvent::Alert { alert } => {
                if alert.active {
                    warn!(
                        "ALERT | {} | {:?} value={:.1} limit={:.1}",
                        alert.zone, alert.kind, alert.value, alert.limit,
                    );
                } else {
                    info!("ALERT | {} | {:?} cleared", alert.zone, alert.kind);
                }
            }
            CoreEvent::SensorFaultSuspected { zone, consecutive } => {
                warn!("FAULT | {} | sensor suspect after {} anomalous samples", zone, consecutive);
            }
            CoreEvent::Fault { kind, zone, detail } => {
                warn!("FAULT | {:?} | zone={:?} | {}", kind, zone, detail);
            }
            CoreEvent::Link { change } => match change {
                LinkEvent::Connected { endpoint } => info!("LINK  | connected {}", endpoint),
                LinkEvent::Disconnected { reason } => warn!("LINK  | lost: {}", reason),
                LinkEvent::RetryFailed { attempt, reason } => {
                    warn!("LINK  | retry {} failed: {}", attempt, reason);
                }
            },
            CoreEvent::OverrideSet { zone, actuator, state, expires_at_ms } => {
                info!("OVRD  | {}/{} -> {} until {}ms", zone, actuator, state, expires_at_ms);
            }
            CoreEvent::OverrideEnded { zone, actuator, expired } => {
                info!(
                    "OVRD  | {}/{} released ({})",
                    zone,
                    actuator,
                    if *expired { "expired" } else { "cleared" },
                );
            }
            CoreEvent::AutoMode { enabled } => {
                info!("MODE  | auto={}", enabled);
            }
            CoreEvent::Shutdown => {
                info!("STOP  | all actuators released");
            }
        }
    }
}
