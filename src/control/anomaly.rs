//! Anomaly filter: hard range guard in front of a pluggable outlier model.
//!
//! ```text
//!  sample ──▶ valid flag? ──▶ RangeGuard ──▶ OutlierModel ──▶ Trusted
//!                 │               │               │
//!                 └───────────────┴───────────────┴──▶ Anomalous(reason)
//! ```
//!
//! The range guard always wins: a humidity of 150 % is anomalous no matter
//! what the model thinks.

use std::collections::BTreeMap;

use log::warn;
use serde::Serialize;

use crate::config::{AnomalyConfig, FeatureStats, Quantity, RangeGuard};
use crate::protocol::{TelemetrySample, ZoneId};

/// Smallest standard deviation a model feature may carry.
const MIN_STD: f32 = 1e-3;

// ---------------------------------------------------------------------------
// Verdicts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AnomalyReason {
    /// The node flagged the reading itself.
    SensorFault,
    /// Outside the physical range guard.
    OutOfRange { quantity: Quantity, value: f32 },
    /// Statistically implausible.
    Outlier { distance: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "trust", rename_all = "snake_case")]
pub enum Verdict {
    Trusted,
    Anomalous(AnomalyReason),
}

impl Verdict {
    pub fn is_trusted(&self) -> bool {
        matches!(self, Self::Trusted)
    }
}

// ---------------------------------------------------------------------------
// Outlier model port
// ---------------------------------------------------------------------------

/// Model features of one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temperature: f32,
    pub humidity: f32,
    pub co2: f32,
}

impl Reading {
    pub fn from_sample(sample: &TelemetrySample) -> Self {
        Self {
            temperature: sample.temperature,
            humidity: sample.humidity,
            co2: sample.co2 as f32,
        }
    }

    fn features(&self) -> [f32; 3] {
        [self.temperature, self.humidity, self.co2]
    }
}

/// Pluggable statistical classifier.  Returns `Some(score)` for an outlier.
pub trait OutlierModel {
    fn outlier_score(&self, reading: &Reading) -> Option<f32>;
}

/// Statistical layer disabled; only the range guard applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughModel;

impl OutlierModel for PassthroughModel {
    fn outlier_score(&self, _reading: &Reading) -> Option<f32> {
        None
    }
}

/// Diagonal Gaussian scored by Mahalanobis distance.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianModel {
    mean: [f32; 3],
    std: [f32; 3],
    max_distance: f32,
}

impl GaussianModel {
    pub fn new(temperature: FeatureStats, humidity: FeatureStats, co2: FeatureStats, max_distance: f32) -> Self {
        let stats = [temperature, humidity, co2];
        Self {
            mean: stats.map(|s| s.mean),
            std: stats.map(|s| s.std.max(MIN_STD)),
            max_distance,
        }
    }

    pub fn from_config(config: &AnomalyConfig) -> Self {
        Self::new(config.temperature, config.humidity, config.co2, config.max_distance)
    }

    /// Fit per-feature mean and standard deviation from known-good readings.
    /// Needs at least two readings.
    pub fn fit(readings: &[Reading], max_distance: f32) -> Option<Self> {
        if readings.len() < 2 {
            return None;
        }
        let n = readings.len() as f32;
        let mut mean = [0.0f32; 3];
        for r in readings {
            for (m, x) in mean.iter_mut().zip(r.features()) {
                *m += x / n;
            }
        }
        let mut var = [0.0f32; 3];
        for r in readings {
            for ((v, m), x) in var.iter_mut().zip(mean).zip(r.features()) {
                *v += (x - m) * (x - m) / (n - 1.0);
            }
        }
        Some(Self {
            mean,
            std: var.map(|v| v.sqrt().max(MIN_STD)),
            max_distance,
        })
    }

    pub fn distance(&self, reading: &Reading) -> f32 {
        reading
            .features()
            .iter()
            .zip(self.mean)
            .zip(self.std)
            .map(|((x, m), s)| {
                let z = (x - m) / s;
                z * z
            })
            .sum::<f32>()
            .sqrt()
    }
}

impl OutlierModel for GaussianModel {
    fn outlier_score(&self, reading: &Reading) -> Option<f32> {
        let d = self.distance(reading);
        // NaN distance is an outlier too.
        if d <= self.max_distance { None } else { Some(d) }
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Range guard check on its own.
pub fn range_check(guard: &RangeGuard, sample: &TelemetrySample) -> Option<AnomalyReason> {
    let checks = [
        (Quantity::Temperature, guard.temperature, sample.temperature),
        (Quantity::Humidity, guard.humidity, sample.humidity),
        (Quantity::Co2, guard.co2, sample.co2 as f32),
    ];
    checks
        .into_iter()
        .find(|(_, span, value)| !span.contains(*value))
        .map(|(quantity, _, value)| AnomalyReason::OutOfRange { quantity, value })
}

/// Result of [`AnomalyFilter::observe`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub verdict: Verdict,
    /// Set on the sample that completes a run of consecutive anomalies.
    pub fault_suspected: Option<u32>,
}

pub struct AnomalyFilter {
    guard: RangeGuard,
    model: Box<dyn OutlierModel>,
    fault_streak: u32,
    streaks: BTreeMap<ZoneId, u32>,
}

impl AnomalyFilter {
    pub fn new(guard: RangeGuard, model: Box<dyn OutlierModel>, fault_streak: u32) -> Self {
        Self {
            guard,
            model,
            fault_streak: fault_streak.max(1),
            streaks: BTreeMap::new(),
        }
    }

    /// Build from configuration: Gaussian model when enabled, otherwise
    /// range guard only.
    pub fn from_config(guard: RangeGuard, anomaly: &AnomalyConfig, fault_streak: u32) -> Self {
        let model: Box<dyn OutlierModel> = if anomaly.enabled {
            Box::new(GaussianModel::from_config(anomaly))
        } else {
            Box::new(PassthroughModel)
        };
        Self::new(guard, model, fault_streak)
    }

    /// Classify without touching the streak counters.
    pub fn classify(&self, sample: &TelemetrySample) -> Verdict {
        if !sample.valid {
            return Verdict::Anomalous(AnomalyReason::SensorFault);
        }
        if let Some(reason) = range_check(&self.guard, sample) {
            return Verdict::Anomalous(reason);
        }
        match self.model.outlier_score(&Reading::from_sample(sample)) {
            Some(distance) => Verdict::Anomalous(AnomalyReason::Outlier { distance }),
            None => Verdict::Trusted,
        }
    }

    /// Classify and update the zone's consecutive-anomaly counter.
    pub fn observe(&mut self, sample: &TelemetrySample) -> Observation {
        let verdict = self.classify(sample);
        let streak = self.streaks.entry(sample.zone.clone()).or_insert(0);
        let fault_suspected = if verdict.is_trusted() {
            *streak = 0;
            None
        } else {
            *streak = streak.saturating_add(1);
            warn!("anomaly: zone {} {:?} (streak {})", sample.zone, verdict, streak);
            (*streak == self.fault_streak).then_some(*streak)
        };
        Observation {
            verdict,
            fault_suspected,
        }
    }

    pub fn streak(&self, zone: &str) -> u32 {
        self.streaks.get(zone).copied().unwrap_or(0)
    }
}
