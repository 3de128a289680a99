//! Microcontroller side of the link.
//!
//! The node is deliberately dumb: it reports readings, obeys commands, and
//! cuts every relay when the host goes quiet.  One call to
//! [`NodeLoop::run_once`] is one iteration of its cooperative loop:
//!
//! ```text
//!  read link ──▶ parse frames ──▶ watchdog.service ──▶ report (if due)
//!      │              │                  │
//!      │        valid → reset timer      └─ tripped → relays.all_off()
//!      │        command → relay
//! ```

pub mod conditioner;
pub mod relays;
pub mod watchdog;

use std::collections::BTreeMap;

use embedded_hal::digital::OutputPin;
use log::{debug, info, warn};

pub use conditioner::{RawReading, ReadingConditioner};
pub use relays::{RelayBank, RelayError};
pub use watchdog::{SafetyWatchdog, WatchdogState};

use crate::config::NodeConfig;
use crate::error::TransportError;
use crate::link::{Transport, write_all};
use crate::protocol::{Frame, LineCodec, encode};

/// One zone's climate sensor.  `None` when the read failed.
pub trait ClimateSensor {
    fn read(&mut self) -> Option<RawReading>;
}

struct NodeZone<S> {
    id: String,
    sensor: S,
    conditioner: ReadingConditioner,
}

/// Counters from one batch of inbound bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxStats {
    pub frames: u32,
    pub errors: u32,
    pub rejected_commands: u32,
}

pub struct NodeLoop<P, S> {
    config: NodeConfig,
    watchdog: SafetyWatchdog,
    relays: RelayBank<P>,
    zones: Vec<NodeZone<S>>,
    codec: LineCodec,
    last_report_ms: Option<u64>,
}

impl<P: OutputPin, S: ClimateSensor> NodeLoop<P, S> {
    /// Relays in `relays` are expected to be OFF already ([`RelayBank::add`]
    /// drives them OFF).
    pub fn new(config: NodeConfig, relays: RelayBank<P>, now_ms: u64) -> Self {
        let watchdog = SafetyWatchdog::new(config.watchdog_timeout_ms, now_ms);
        info!("node: watchdog armed, timeout {} ms", config.watchdog_timeout_ms);
        Self {
            config,
            watchdog,
            relays,
            zones: Vec::new(),
            codec: LineCodec::new(),
            last_report_ms: None,
        }
    }

    pub fn add_zone(&mut self, id: impl Into<String>, sensor: S) {
        let conditioner = ReadingConditioner::new(self.config.valid_range, self.config.smoothing_window);
        self.zones.push(NodeZone {
            id: id.into(),
            sensor,
            conditioner,
        });
    }

    pub fn watchdog(&self) -> &SafetyWatchdog {
        &self.watchdog
    }

    pub fn relays(&self) -> &RelayBank<P> {
        &self.relays
    }

    /// Parse inbound bytes.  Every frame that decodes refreshes the
    /// watchdog, including commands for unknown actuators.
    pub fn on_bytes(&mut self, bytes: &[u8], now_ms: u64) -> RxStats {
        self.codec.feed(bytes);
        let mut stats = RxStats::default();
        for item in self.codec.drain() {
            match item {
                Ok(frame) => {
                    stats.frames += 1;
                    self.watchdog.on_valid_frame(now_ms);
                    match frame {
                        Frame::Command(cmd) => {
                            if let Err(e) = self.relays.set(&cmd.actuator, cmd.state) {
                                warn!("node: command rejected: {}", e);
                                stats.rejected_commands += 1;
                            }
                        }
                        Frame::Keepalive => {}
                        Frame::Telemetry(_) => debug!("node: ignoring inbound telemetry"),
                    }
                }
                Err(e) => {
                    stats.errors += 1;
                    debug!("node: dropped line: {}", e);
                }
            }
        }
        stats
    }

    /// Check the watchdog; on a trip every relay is forced OFF before this
    /// returns.
    pub fn service(&mut self, now_ms: u64) -> bool {
        if !self.watchdog.service(now_ms) {
            return false;
        }
        let failed = self.relays.all_off();
        if failed > 0 {
            warn!("node: {} relays did not confirm OFF", failed);
        }
        true
    }

    /// Build a telemetry frame if the report interval has elapsed.
    pub fn report(&mut self, now_ms: u64) -> Option<Vec<u8>> {
        let due = self
            .last_report_ms
            .is_none_or(|t| now_ms.saturating_sub(t) >= self.config.report_interval_ms);
        if !due || self.zones.is_empty() {
            return None;
        }
        self.last_report_ms = Some(now_ms);

        let mut readings = BTreeMap::new();
        for zone in &mut self.zones {
            let reading = zone.conditioner.condition(zone.sensor.read());
            readings.insert(zone.id.clone(), reading);
        }
        Some(encode(&Frame::Telemetry(readings)))
    }

    /// One cooperative iteration over `port`.
    pub fn run_once(&mut self, port: &mut impl Transport, now_ms: u64) -> Result<RxStats, TransportError> {
        let mut buf = [0u8; 128];
        let mut stats = RxStats::default();
        loop {
            let n = port.read(&mut buf)?;
            if n == 0 {
                break;
            }
            let s = self.on_bytes(&buf[..n], now_ms);
            stats.frames += s.frames;
            stats.errors += s.errors;
            stats.rejected_commands += s.rejected_commands;
        }
        self.service(now_ms);
        if let Some(bytes) = self.report(now_ms) {
            write_all(port, &bytes)?;
        }
        Ok(stats)
    }
}
