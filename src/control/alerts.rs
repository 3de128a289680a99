//! Edge-triggered advisory alerts.  Alerts are reported, never acted on.

use std::collections::BTreeSet;

use log::{info, warn};
use serde::Serialize;

use crate::config::AlertPolicy;
use crate::protocol::{TelemetrySample, ZoneId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    TemperatureHigh,
    TemperatureLow,
    HumidityLow,
    Co2High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub zone: ZoneId,
    pub kind: AlertKind,
    pub value: f32,
    pub limit: f32,
    /// `true` when raised, `false` when cleared.
    pub active: bool,
}

fn violations(sample: &TelemetrySample, policy: &AlertPolicy) -> Vec<(AlertKind, f32, f32)> {
    let mut out = Vec::new();
    let t_high = policy.temp_target + policy.temp_tolerance;
    let t_low = policy.temp_target - policy.temp_tolerance;
    let h_low = policy.humidity_target - policy.humidity_tolerance;
    let co2_max = policy.co2_max as f32;

    if sample.temperature > t_high {
        out.push((AlertKind::TemperatureHigh, sample.temperature, t_high));
    }
    if sample.temperature < t_low {
        out.push((AlertKind::TemperatureLow, sample.temperature, t_low));
    }
    if sample.humidity < h_low {
        out.push((AlertKind::HumidityLow, sample.humidity, h_low));
    }
    if sample.co2 as f32 > co2_max {
        out.push((AlertKind::Co2High, sample.co2 as f32, co2_max));
    }
    out
}

/// Remembers which alerts are raised so each is reported once per episode.
#[derive(Debug, Default)]
pub struct AlertTracker {
    active: BTreeSet<(ZoneId, AlertKind)>,
}

impl AlertTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a trusted sample; returns raised and cleared transitions.
    pub fn evaluate(&mut self, sample: &TelemetrySample, policy: &AlertPolicy) -> Vec<Alert> {
        let now = violations(sample, policy);
        let mut out = Vec::new();

        for &(kind, value, limit) in &now {
            if self.active.insert((sample.zone.clone(), kind)) {
                warn!("alert: {} {:?} value={:.1} limit={:.1}", sample.zone, kind, value, limit);
                out.push(Alert {
                    zone: sample.zone.clone(),
                    kind,
                    value,
                    limit,
                    active: true,
                });
            }
        }

        let cleared: Vec<AlertKind> = self
            .active
            .iter()
            .filter(|(zone, kind)| *zone == sample.zone && !now.iter().any(|(k, _, _)| k == kind))
            .map(|(_, kind)| *kind)
            .collect();
        for kind in cleared {
            self.active.remove(&(sample.zone.clone(), kind));
            info!("alert cleared: {} {:?}", sample.zone, kind);
            out.push(Alert {
                zone: sample.zone.clone(),
                kind,
                value: match kind {
                    AlertKind::TemperatureHigh | AlertKind::TemperatureLow => sample.temperature,
                    AlertKind::HumidityLow => sample.humidity,
                    AlertKind::Co2High => sample.co2 as f32,
                },
                limit: 0.0,
                active: false,
            });
        }
        out
    }

    pub fn is_active(&self, zone: &str, kind: AlertKind) -> bool {
        self.active.iter().any(|(z, k)| z == zone && *k == kind)
    }
}
