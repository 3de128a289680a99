//! Wire frame types and the telemetry data model.
//!
//! ```text
//!  host ──▶ node   {"actuator": "MIST_MAKER", "state": "ON"}
//!  host ──▶ node   {"keepalive": true}
//!  node ──▶ host   {"fruiting": {"temp": 24.1, "humidity": 88.0, "co2": 812}}
//!  node ──▶ host   {"spawning": {"error": "invalid_reading"}}
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Zone identifier as it appears on the wire (`"fruiting"`, `"spawning"`).
pub type ZoneId = String;

/// Error string the node reports for a zone whose sensor failed.
pub const INVALID_READING: &str = "invalid_reading";

/// Binary relay state.  Serialised as `"ON"` / `"OFF"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SwitchState {
    #[serde(rename = "OFF")]
    Off,
    #[serde(rename = "ON")]
    On,
}

impl SwitchState {
    pub fn from_bool(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "ON" => Some(Self::On),
            "OFF" => Some(Self::Off),
            _ => None,
        }
    }
}

impl core::fmt::Display for SwitchState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Host → node actuator command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub actuator: String,
    pub state: SwitchState,
}

impl Command {
    pub fn new(actuator: impl Into<String>, state: SwitchState) -> Self {
        Self {
            actuator: actuator.into(),
            state,
        }
    }
}

/// One zone's entry in a telemetry frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ZoneReading {
    Valid { temp: f32, humidity: f32, co2: u32 },
    /// The node flagged a hard sensor fault; carries the reported error.
    Fault(String),
}

/// A complete, delimiter-terminated protocol unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Command(Command),
    /// Liveness-only frame; carries no instruction.
    Keepalive,
    /// Per-zone readings, keyed by zone id.
    Telemetry(BTreeMap<ZoneId, ZoneReading>),
}

impl Frame {
    /// Stamp a telemetry frame into per-zone samples.  Non-telemetry frames
    /// yield nothing.
    pub fn into_samples(self, captured_at_ms: u64) -> Vec<TelemetrySample> {
        match self {
            Self::Telemetry(zones) => zones
                .into_iter()
                .map(|(zone, reading)| TelemetrySample::from_reading(zone, &reading, captured_at_ms))
                .collect(),
            Self::Command(_) | Self::Keepalive => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Telemetry sample (immutable once created)
// ---------------------------------------------------------------------------

/// One reading cycle from one zone, stamped on arrival at the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub zone: ZoneId,
    /// Degrees Celsius.
    pub temperature: f32,
    /// Relative humidity, percent.
    pub humidity: f32,
    /// CO2 concentration, ppm.
    pub co2: u32,
    /// `false` when the node reported a hard sensor fault; the numeric
    /// fields are then zero and meaningless.
    pub valid: bool,
    /// Host monotonic milliseconds at decode time.
    pub captured_at_ms: u64,
}

impl TelemetrySample {
    pub fn new(zone: impl Into<ZoneId>, temperature: f32, humidity: f32, co2: u32, captured_at_ms: u64) -> Self {
        Self {
            zone: zone.into(),
            temperature,
            humidity,
            co2,
            valid: true,
            captured_at_ms,
        }
    }

    pub fn fault(zone: impl Into<ZoneId>, captured_at_ms: u64) -> Self {
        Self {
            zone: zone.into(),
            temperature: 0.0,
            humidity: 0.0,
            co2: 0,
            valid: false,
            captured_at_ms,
        }
    }

    pub fn from_reading(zone: ZoneId, reading: &ZoneReading, captured_at_ms: u64) -> Self {
        match *reading {
            ZoneReading::Valid { temp, humidity, co2 } => {
                Self::new(zone, temp, humidity, co2, captured_at_ms)
            }
            ZoneReading::Fault(_) => Self::fault(zone, captured_at_ms),
        }
    }
}
