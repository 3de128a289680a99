//! Policy configuration
//!
//! Every tunable the controller uses lives in [`PolicyConfig`], an immutable
//! value handed to each evaluation call.  It loads from a JSON file; when the
//! file is missing the binary falls back to [`PolicyConfig::default`], which
//! mirrors the deployed chamber.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::link::HardwareSignature;
use crate::protocol::TelemetrySample;

// ---------------------------------------------------------------------------
// Threshold rules
// ---------------------------------------------------------------------------

/// Measured quantity a rule watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    Temperature,
    Humidity,
    Co2,
}

impl Quantity {
    pub fn read(self, sample: &TelemetrySample) -> f32 {
        match self {
            Self::Temperature => sample.temperature,
            Self::Humidity => sample.humidity,
            Self::Co2 => sample.co2 as f32,
        }
    }
}

/// Which side of the limit switches the actuator on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    /// ON above `limit`, OFF below `limit - hysteresis`.
    Upper,
    /// ON below `limit - hysteresis`, OFF at or above `limit`.
    Lower,
}

/// One hysteresis rule mapping a quantity to an on/off actuator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub quantity: Quantity,
    pub bound: Bound,
    pub actuator: String,
    pub limit: f32,
    pub hysteresis: f32,
    /// Distance beyond `limit` at which the actuator is forced ON regardless
    /// of the band.  `None` disables the emergency band.
    #[serde(default)]
    pub emergency_margin: Option<f32>,
}

// ---------------------------------------------------------------------------
// Humidifier cycle
// ---------------------------------------------------------------------------

/// Two-phase humidifier parameters.  Phase A drives the primary actuator
/// (mist maker), phase B the secondary (distribution fan).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleConfig {
    pub primary_actuator: String,
    pub secondary_actuator: String,
    /// Humidity target, %RH.
    pub target: f32,
    /// Cycle starts below `target - hysteresis`.
    pub hysteresis: f32,
    /// Immediate stop at or above this humidity.
    pub critical_max: f32,
    pub phase_a_secs: u32,
    pub phase_b_secs: u32,
    /// Trusted samples kept for trend estimation.
    pub trend_window: usize,
    /// How far ahead the trend is projected.
    pub lookahead_secs: f32,
    /// Projected humidity above `target + safety_margin` stops the cycle.
    pub safety_margin: f32,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            primary_actuator: "MIST_MAKER".into(),
            secondary_actuator: "HUMIDIFIER_FAN".into(),
            target: 90.0,
            hysteresis: 5.0,
            critical_max: 95.0,
            phase_a_secs: 10,
            phase_b_secs: 30,
            trend_window: 3,
            lookahead_secs: 15.0,
            safety_margin: 2.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Advisory alert thresholds.  Alerts never move actuators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPolicy {
    pub temp_target: f32,
    pub temp_tolerance: f32,
    pub humidity_target: f32,
    pub humidity_tolerance: f32,
    pub co2_max: u32,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            temp_target: 24.0,
            temp_tolerance: 2.0,
            humidity_target: 90.0,
            humidity_tolerance: 10.0,
            co2_max: 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// Zones
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonePolicy {
    pub zone: String,
    #[serde(default)]
    pub thresholds: Vec<ThresholdRule>,
    #[serde(default)]
    pub humidifier: Option<CycleConfig>,
    #[serde(default)]
    pub alerts: Option<AlertPolicy>,
}

impl ZonePolicy {
    /// Every actuator this zone can command, in rule order, deduplicated.
    pub fn actuators(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        };
        for rule in &self.thresholds {
            push(&rule.actuator);
        }
        if let Some(cycle) = &self.humidifier {
            push(&cycle.primary_actuator);
            push(&cycle.secondary_actuator);
        }
        names
    }
}

// ---------------------------------------------------------------------------
// Anomaly filter
// ---------------------------------------------------------------------------

/// Inclusive physical range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub min: f32,
    pub max: f32,
}

impl Span {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// NaN is never contained.
    pub fn contains(&self, v: f32) -> bool {
        v >= self.min && v <= self.max
    }
}

/// Hard physical limits; anything outside is anomalous regardless of the
/// statistical model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeGuard {
    pub temperature: Span,
    pub humidity: Span,
    pub co2: Span,
}

impl Default for RangeGuard {
    fn default() -> Self {
        Self {
            temperature: Span::new(-10.0, 60.0),
            humidity: Span::new(0.0, 100.0),
            co2: Span::new(0.0, 10_000.0),
        }
    }
}

/// Mean / standard deviation for one model feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: f32,
    pub std: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// `false` leaves only the range guard in place.
    pub enabled: bool,
    /// Samples farther than this (in standard deviations) are anomalous.
    pub max_distance: f32,
    pub temperature: FeatureStats,
    pub humidity: FeatureStats,
    pub co2: FeatureStats,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_distance: 6.0,
            temperature: FeatureStats { mean: 24.0, std: 4.0 },
            humidity: FeatureStats { mean: 90.0, std: 10.0 },
            co2: FeatureStats { mean: 800.0, std: 400.0 },
        }
    }
}

// ---------------------------------------------------------------------------
// Link, node and orchestrator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub baud: u32,
    /// Bound on a single read or write.
    pub timeout_ms: u64,
    /// Fixed pause between reconnect attempts.
    pub retry_interval_ms: u64,
    /// Keepalive cadence while connected.
    pub keepalive_interval_ms: u64,
    pub signature: HardwareSignature,
    /// Skip discovery and open this endpoint directly.
    #[serde(default)]
    pub port_override: Option<String>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud: 9600,
            timeout_ms: 1000,
            retry_interval_ms: 5000,
            keepalive_interval_ms: 3000,
            signature: HardwareSignature::default(),
            port_override: None,
        }
    }
}

/// Microcontroller-side parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub watchdog_timeout_ms: u64,
    pub report_interval_ms: u64,
    /// Moving-average depth for temperature and humidity.
    pub smoothing_window: usize,
    /// Readings outside these ranges are reported as invalid.
    pub valid_range: RangeGuard,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            watchdog_timeout_ms: 10_000,
            report_interval_ms: 5000,
            smoothing_window: 5,
            valid_range: RangeGuard {
                temperature: Span::new(-10.0, 60.0),
                humidity: Span::new(0.0, 100.0),
                co2: Span::new(400.0, 5000.0),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Commands are suppressed this long after start.
    pub startup_grace_secs: u32,
    /// Manual overrides lapse after this long.
    pub override_ttl_secs: u32,
    /// Consecutive anomalous samples that raise a sensor-fault event.
    pub fault_streak: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            startup_grace_secs: 30,
            override_ttl_secs: 300,
            fault_streak: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

/// Complete controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub zones: Vec<ZonePolicy>,
    #[serde(default)]
    pub range_guard: RangeGuard,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let fruiting = ZonePolicy {
            zone: "fruiting".into(),
            thresholds: vec![
                ThresholdRule {
                    quantity: Quantity::Co2,
                    bound: Bound::Upper,
                    actuator: "FRUITING_EXHAUST_FAN".into(),
                    limit: 1000.0,
                    hysteresis: 100.0,
                    emergency_margin: Some(500.0),
                },
                ThresholdRule {
                    quantity: Quantity::Temperature,
                    bound: Bound::Upper,
                    actuator: "FRUITING_INTAKE_FAN".into(),
                    limit: 26.0,
                    hysteresis: 1.0,
                    emergency_margin: Some(6.0),
                },
            ],
            humidifier: Some(CycleConfig::default()),
            alerts: Some(AlertPolicy::default()),
        };
        let spawning = ZonePolicy {
            zone: "spawning".into(),
            thresholds: vec![ThresholdRule {
                quantity: Quantity::Co2,
                bound: Bound::Upper,
                actuator: "SPAWNING_EXHAUST_FAN".into(),
                limit: 1000.0,
                hysteresis: 100.0,
                emergency_margin: Some(500.0),
            }],
            humidifier: None,
            alerts: Some(AlertPolicy::default()),
        };

        Self {
            zones: vec![fruiting, spawning],
            range_guard: RangeGuard::default(),
            anomaly: AnomalyConfig::default(),
            link: LinkConfig::default(),
            node: NodeConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl PolicyConfig {
    pub fn zone(&self, id: &str) -> Option<&ZonePolicy> {
        self.zones.iter().find(|z| z.zone == id)
    }

    /// Reject values that would make the controller oscillate or stall.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, zone) in self.zones.iter().enumerate() {
            if zone.zone.is_empty() {
                return Err(ConfigError::ValidationFailed("zone id must not be empty"));
            }
            if self.zones[..i].iter().any(|z| z.zone == zone.zone) {
                return Err(ConfigError::ValidationFailed("duplicate zone id"));
            }
            // Commands carry only the actuator name, so one relay has one owner.
            let owned = zone.actuators();
            if self.zones[..i]
                .iter()
                .any(|z| z.actuators().iter().any(|a| owned.contains(a)))
            {
                return Err(ConfigError::ValidationFailed("actuator shared between zones"));
            }
            for rule in &zone.thresholds {
                if rule.actuator.is_empty() {
                    return Err(ConfigError::ValidationFailed("threshold actuator must not be empty"));
                }
                if rule.hysteresis.is_nan() || rule.hysteresis <= 0.0 {
                    return Err(ConfigError::ValidationFailed("threshold hysteresis must be > 0"));
                }
                if rule.emergency_margin.is_some_and(|m| m.is_nan() || m <= 0.0) {
                    return Err(ConfigError::ValidationFailed("emergency margin must be > 0"));
                }
            }
            if let Some(cycle) = &zone.humidifier {
                validate_cycle(cycle)?;
            }
        }

        for span in [
            self.range_guard.temperature,
            self.range_guard.humidity,
            self.range_guard.co2,
        ] {
            if span.min.is_nan() || span.max.is_nan() || span.min > span.max {
                return Err(ConfigError::ValidationFailed("range guard min must be <= max"));
            }
        }

        if self.anomaly.enabled {
            if self.anomaly.max_distance.is_nan() || self.anomaly.max_distance <= 0.0 {
                return Err(ConfigError::ValidationFailed("anomaly max_distance must be > 0"));
            }
            for stats in [self.anomaly.temperature, self.anomaly.humidity, self.anomaly.co2] {
                if stats.std.is_nan() || stats.std <= 0.0 {
                    return Err(ConfigError::ValidationFailed("anomaly feature std must be > 0"));
                }
            }
        }

        if self.link.baud == 0 {
            return Err(ConfigError::ValidationFailed("baud must be > 0"));
        }
        if self.link.retry_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("retry interval must be > 0"));
        }
        if self.link.keepalive_interval_ms == 0
            || self.link.keepalive_interval_ms >= self.node.watchdog_timeout_ms
        {
            return Err(ConfigError::ValidationFailed(
                "keepalive interval must be > 0 and below the node watchdog timeout",
            ));
        }
        if self.node.smoothing_window == 0 {
            return Err(ConfigError::ValidationFailed("smoothing window must be >= 1"));
        }
        if self.orchestrator.fault_streak == 0 {
            return Err(ConfigError::ValidationFailed("fault streak must be >= 1"));
        }
        Ok(())
    }
}

fn validate_cycle(cycle: &CycleConfig) -> Result<(), ConfigError> {
    if cycle.primary_actuator == cycle.secondary_actuator {
        return Err(ConfigError::ValidationFailed("cycle actuators must differ"));
    }
    if cycle.hysteresis.is_nan() || cycle.hysteresis <= 0.0 {
        return Err(ConfigError::ValidationFailed("cycle hysteresis must be > 0"));
    }
    if cycle.critical_max.is_nan() || cycle.critical_max <= cycle.target {
        return Err(ConfigError::ValidationFailed("cycle critical_max must exceed target"));
    }
    if cycle.phase_a_secs == 0 || cycle.phase_b_secs == 0 {
        return Err(ConfigError::ValidationFailed("cycle phase durations must be > 0"));
    }
    if cycle.trend_window < 2 || cycle.trend_window > crate::cycle::MAX_TREND_WINDOW {
        return Err(ConfigError::ValidationFailed("cycle trend window must be 2..=16"));
    }
    if cycle.lookahead_secs.is_nan() || cycle.lookahead_secs < 0.0 {
        return Err(ConfigError::ValidationFailed("cycle lookahead must be >= 0"));
    }
    if cycle.safety_margin.is_nan() || cycle.safety_margin < 0.0 {
        return Err(ConfigError::ValidationFailed("cycle safety margin must be >= 0"));
    }
    Ok(())
}

/// Load and validate a JSON configuration file.
pub fn load(path: &Path) -> Result<PolicyConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    let config: PolicyConfig =
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}
