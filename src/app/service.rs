//! Automation orchestrator — the hexagonal core.
//!
//! [`Orchestrator`] owns the anomaly filter, per-zone threshold memory, the
//! humidifier cycle controllers, manual overrides and the host's view of
//! every actuator.  All I/O flows through port traits injected at call
//! sites, so the whole thing runs against mock adapters in tests.
//!
//! ```text
//!  TelemetrySample ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                      │         Orchestrator         │
//!  ControlCommand ───▶ │ Anomaly · Threshold · Cycle  │ ──▶ CommandPort
//!                      │     resolve · dispatch       │
//!                      └──────────────────────────────┘
//! ```
//!
//! Per trusted sample: threshold rules and the cycle controller produce
//! intents, manual overrides are layered on top, [`resolve`] picks one per
//! actuator, and only actuators whose state differs from the last known
//! one are dispatched (OFFs first).

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::config::{PolicyConfig, ZonePolicy};
use crate::control::threshold;
use crate::control::{ActuatorIntent, AlertTracker, AnomalyFilter, IntentSource, OutlierModel, Verdict, resolve};
use crate::cycle::{CycleController, CyclePhase, StopReason};
use crate::error::{FaultKind, FrameError};
use crate::link::{LinkEvent, LinkStatus};
use crate::protocol::{Command, SwitchState, TelemetrySample, ZoneId};

use super::commands::ControlCommand;
use super::events::{ActuatorState, CoreEvent};
use super::ports::{CommandPort, EventSink};
use super::snapshot::{ControlSnapshot, OverrideView, ZoneSnapshot};

// ───────────────────────────────────────────────────────────────
// Per-zone runtime
// ───────────────────────────────────────────────────────────────

struct ZoneRuntime {
    policy: ZonePolicy,
    /// Last threshold output, fed back for hysteresis.
    threshold_intents: Vec<ActuatorIntent>,
    cycle: Option<CycleController>,
    latest: Option<(TelemetrySample, Verdict)>,
}

impl ZoneRuntime {
    fn new(policy: ZonePolicy) -> Self {
        let cycle = policy.humidifier.clone().map(CycleController::new);
        Self {
            policy,
            threshold_intents: Vec::new(),
            cycle,
            latest: None,
        }
    }

    fn id(&self) -> &ZoneId {
        &self.policy.zone
    }
}

struct ManualOverride {
    intent: ActuatorIntent,
    expires_at_ms: u64,
}

type ActuatorKey = (ZoneId, String);

// ───────────────────────────────────────────────────────────────
// Orchestrator
// ───────────────────────────────────────────────────────────────

pub struct Orchestrator {
    config: PolicyConfig,
    filter: AnomalyFilter,
    alerts: AlertTracker,
    zones: Vec<ZoneRuntime>,
    actuators: BTreeMap<ActuatorKey, ActuatorState>,
    overrides: Vec<ManualOverride>,
    auto_mode: bool,
    started_at_ms: u64,
}

impl Orchestrator {
    /// Build from configuration with the configured outlier model.  Every
    /// known actuator starts OFF.
    pub fn new(config: PolicyConfig, now_ms: u64) -> Self {
        let filter = AnomalyFilter::from_config(
            config.range_guard,
            &config.anomaly,
            config.orchestrator.fault_streak,
        );
        Self::with_filter(config, filter, now_ms)
    }

    /// Build with a caller-supplied outlier model behind the configured
    /// range guard.
    pub fn with_model(config: PolicyConfig, model: Box<dyn OutlierModel>, now_ms: u64) -> Self {
        let filter = AnomalyFilter::new(config.range_guard, model, config.orchestrator.fault_streak);
        Self::with_filter(config, filter, now_ms)
    }

    fn with_filter(config: PolicyConfig, filter: AnomalyFilter, now_ms: u64) -> Self {
        let zones: Vec<ZoneRuntime> = config.zones.iter().cloned().map(ZoneRuntime::new).collect();

        let mut actuators = BTreeMap::new();
        for zone in &zones {
            for name in zone.policy.actuators() {
                actuators.insert(
                    (zone.id().clone(), name.clone()),
                    ActuatorState {
                        zone: zone.id().clone(),
                        name,
                        state: SwitchState::Off,
                        changed_at_ms: now_ms,
                        source: None,
                    },
                );
            }
        }

        Self {
            config,
            filter,
            alerts: AlertTracker::new(),
            zones,
            actuators,
            overrides: Vec::new(),
            auto_mode: true,
            started_at_ms: now_ms,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        let zones: Vec<ZoneId> = self.zones.iter().map(|z| z.id().clone()).collect();
        info!(
            "orchestrator started: zones {:?}, grace {}s",
            zones, self.config.orchestrator.startup_grace_secs
        );
        sink.emit(&CoreEvent::Started { zones });
    }

    /// Command every ON actuator OFF.  Called once on process stop.
    pub fn shutdown(&mut self, now_ms: u64, port: &mut impl CommandPort, sink: &mut impl EventSink) {
        for zone in &mut self.zones {
            if let Some(t) = zone.cycle.as_mut().and_then(|c| c.stop(StopReason::Disabled, now_ms)) {
                sink.emit(&CoreEvent::Cycle {
                    zone: zone.policy.zone.clone(),
                    transition: t,
                });
            }
        }
        self.overrides.clear();

        let on: Vec<ActuatorKey> = self
            .actuators
            .iter()
            .filter(|(_, s)| s.state.is_on())
            .map(|(k, _)| k.clone())
            .collect();
        info!("shutdown: switching {} actuators OFF", on.len());
        for key in on {
            if !port.is_connected() {
                warn!("shutdown: link down, {} left to the node watchdog", key.1);
                continue;
            }
            let cmd = Command::new(key.1.clone(), SwitchState::Off);
            match port.dispatch(&cmd) {
                Ok(()) => self.record(&key, SwitchState::Off, None, now_ms, sink),
                Err(e) => warn!("shutdown: {} OFF failed: {}", key.1, e),
            }
        }
        sink.emit(&CoreEvent::Shutdown);
    }

    // ── Per-sample orchestration ──────────────────────────────

    /// Run one orchestration tick for a freshly decoded sample.
    pub fn on_sample(
        &mut self,
        sample: TelemetrySample,
        port: &mut impl CommandPort,
        sink: &mut impl EventSink,
    ) {
        let now = sample.captured_at_ms;

        // 1. Trust
        let obs = self.filter.observe(&sample);
        sink.emit(&CoreEvent::Sample {
            sample: sample.clone(),
            verdict: obs.verdict,
        });
        if let Some(consecutive) = obs.fault_suspected {
            warn!("zone {}: sensor fault suspected ({} anomalous in a row)", sample.zone, consecutive);
            sink.emit(&CoreEvent::SensorFaultSuspected {
                zone: sample.zone.clone(),
                consecutive,
            });
        }

        let Some(idx) = self.zone_index(&sample.zone) else {
            debug!("sample for unconfigured zone {}", sample.zone);
            return;
        };
        self.zones[idx].latest = Some((sample.clone(), obs.verdict));
        if !obs.verdict.is_trusted() {
            return;
        }

        let in_grace = self.in_grace(now);
        let auto_mode = self.auto_mode;
        let zone = &mut self.zones[idx];

        if in_grace {
            // Stored and published only; the trend still learns.
            if let Some(cycle) = zone.cycle.as_mut() {
                cycle.observe(sample.humidity, now);
            }
            return;
        }

        // 2. Alerts (advisory only)
        if let Some(policy) = &zone.policy.alerts {
            for alert in self.alerts.evaluate(&sample, policy) {
                sink.emit(&CoreEvent::Alert { alert });
            }
        }

        // 3. Threshold policy + cycle controller
        zone.threshold_intents = threshold::evaluate(&sample, &zone.threshold_intents, &zone.policy);
        if let Some(cycle) = zone.cycle.as_mut() {
            if auto_mode {
                if let Some(transition) = cycle.on_sample(sample.humidity, now) {
                    sink.emit(&CoreEvent::Cycle {
                        zone: zone.policy.zone.clone(),
                        transition,
                    });
                }
            } else {
                cycle.observe(sample.humidity, now);
            }
        }

        // 4. Resolve + dispatch
        self.dispatch_zone(idx, now, port, sink);
    }

    /// Periodic housekeeping: expire overrides and advance cycle phases.
    pub fn on_timer(&mut self, now_ms: u64, port: &mut impl CommandPort, sink: &mut impl EventSink) {
        let mut dirty = vec![false; self.zones.len()];

        let (expired, kept): (Vec<ManualOverride>, Vec<ManualOverride>) = core::mem::take(&mut self.overrides)
            .into_iter()
            .partition(|o| o.expires_at_ms <= now_ms);
        self.overrides = kept;
        for o in expired {
            info!("override expired: {}/{}", o.intent.zone, o.intent.actuator);
            sink.emit(&CoreEvent::OverrideEnded {
                zone: o.intent.zone.clone(),
                actuator: o.intent.actuator.clone(),
                expired: true,
            });
            if let Some(idx) = self.zone_index(&o.intent.zone) {
                dirty[idx] = true;
            }
        }

        if self.auto_mode {
            for (idx, zone) in self.zones.iter_mut().enumerate() {
                if let Some(transition) = zone.cycle.as_mut().and_then(|c| c.on_timer(now_ms)) {
                    sink.emit(&CoreEvent::Cycle {
                        zone: zone.policy.zone.clone(),
                        transition,
                    });
                    dirty[idx] = true;
                }
            }
        }

        for (idx, _) in dirty.iter().enumerate().filter(|(_, d)| **d) {
            self.dispatch_zone(idx, now_ms, port, sink);
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply an operator command.  Returns `false` if it was rejected.
    pub fn handle_command(
        &mut self,
        cmd: ControlCommand,
        now_ms: u64,
        port: &mut impl CommandPort,
        sink: &mut impl EventSink,
    ) -> bool {
        match cmd {
            ControlCommand::ManualOverride { zone, actuator, state } => {
                let Some(idx) = self.zone_index(&zone) else {
                    warn!("override rejected: unknown zone {}", zone);
                    return false;
                };
                let expires_at_ms =
                    now_ms.saturating_add(u64::from(self.config.orchestrator.override_ttl_secs) * 1000);
                self.overrides
                    .retain(|o| !(o.intent.zone == zone && o.intent.actuator == actuator));
                info!("override: {}/{} -> {} until {} ms", zone, actuator, state, expires_at_ms);
                sink.emit(&CoreEvent::OverrideSet {
                    zone: zone.clone(),
                    actuator: actuator.clone(),
                    state,
                    expires_at_ms,
                });
                self.overrides.push(ManualOverride {
                    intent: ActuatorIntent::new(zone, actuator, state, IntentSource::Manual),
                    expires_at_ms,
                });
                self.dispatch_zone(idx, now_ms, port, sink);
                true
            }
            ControlCommand::ClearOverride { zone, actuator } => {
                let before = self.overrides.len();
                self.overrides
                    .retain(|o| !(o.intent.zone == zone && o.intent.actuator == actuator));
                if self.overrides.len() == before {
                    return false;
                }
                sink.emit(&CoreEvent::OverrideEnded {
                    zone: zone.clone(),
                    actuator,
                    expired: false,
                });
                if let Some(idx) = self.zone_index(&zone) {
                    self.dispatch_zone(idx, now_ms, port, sink);
                }
                true
            }
            ControlCommand::SetAutoMode { enabled } => {
                if enabled == self.auto_mode {
                    return true;
                }
                self.auto_mode = enabled;
                info!("auto mode {}", if enabled { "enabled" } else { "disabled" });
                sink.emit(&CoreEvent::AutoMode { enabled });
                if !enabled {
                    for zone in &mut self.zones {
                        if let Some(t) = zone.cycle.as_mut().and_then(|c| c.stop(StopReason::Disabled, now_ms)) {
                            sink.emit(&CoreEvent::Cycle {
                                zone: zone.policy.zone.clone(),
                                transition: t,
                            });
                        }
                    }
                }
                if enabled && self.in_grace(now_ms) {
                    return true;
                }
                for idx in 0..self.zones.len() {
                    self.dispatch_zone(idx, now_ms, port, sink);
                }
                true
            }
        }
    }

    // ── Link events ───────────────────────────────────────────

    /// Record a connectivity change; on (re)connect the node is assumed to
    /// have dropped every relay, so state is reset and re-dispatched.
    pub fn on_link_event(
        &mut self,
        event: LinkEvent,
        now_ms: u64,
        port: &mut impl CommandPort,
        sink: &mut impl EventSink,
    ) {
        let connected = matches!(event, LinkEvent::Connected { .. });
        if let LinkEvent::Disconnected { reason } = &event {
            sink.emit(&CoreEvent::Fault {
                kind: FaultKind::Transport,
                zone: None,
                detail: reason.clone(),
            });
        }
        sink.emit(&CoreEvent::Link { change: event });
        if connected {
            self.on_link_restored(now_ms, port, sink);
        }
    }

    pub fn on_link_restored(&mut self, now_ms: u64, port: &mut impl CommandPort, sink: &mut impl EventSink) {
        let keys: Vec<ActuatorKey> = self
            .actuators
            .iter()
            .filter(|(_, s)| s.state.is_on())
            .map(|(k, _)| k.clone())
            .collect();
        if !keys.is_empty() {
            info!("link restored: assuming {} actuators OFF", keys.len());
        }
        for key in keys {
            self.record(&key, SwitchState::Off, None, now_ms, sink);
        }
        for idx in 0..self.zones.len() {
            self.dispatch_zone(idx, now_ms, port, sink);
        }
    }

    /// Surface a discarded frame.  Never fatal.
    pub fn on_frame_error(&mut self, error: &FrameError, sink: &mut impl EventSink) {
        sink.emit(&CoreEvent::Fault {
            kind: FaultKind::Frame,
            zone: None,
            detail: error.to_string(),
        });
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn auto_mode(&self) -> bool {
        self.auto_mode
    }

    pub fn in_grace(&self, now_ms: u64) -> bool {
        let grace_ms = u64::from(self.config.orchestrator.startup_grace_secs) * 1000;
        now_ms < self.started_at_ms.saturating_add(grace_ms)
    }

    pub fn actuator(&self, zone: &str, name: &str) -> Option<&ActuatorState> {
        self.actuators.get(&(zone.to_string(), name.to_string()))
    }

    pub fn actuators(&self) -> impl Iterator<Item = &ActuatorState> {
        self.actuators.values()
    }

    pub fn cycle_phase(&self, zone: &str) -> Option<CyclePhase> {
        let idx = self.zone_index(zone)?;
        self.zones[idx].cycle.as_ref().map(CycleController::phase)
    }

    /// Freeze the current state for external readers.
    pub fn snapshot(&self, now_ms: u64, link: &LinkStatus) -> ControlSnapshot {
        ControlSnapshot {
            taken_at_ms: now_ms,
            auto_mode: self.auto_mode,
            in_grace: self.in_grace(now_ms),
            link: link.clone(),
            actuators: self.actuators.values().cloned().collect(),
            zones: self
                .zones
                .iter()
                .map(|z| ZoneSnapshot {
                    zone: z.id().clone(),
                    latest: z.latest.as_ref().map(|(s, _)| s.clone()),
                    verdict: z.latest.as_ref().map(|(_, v)| *v),
                    cycle: z.cycle.as_ref().map(CycleController::state),
                })
                .collect(),
            overrides: self
                .overrides
                .iter()
                .map(|o| OverrideView {
                    zone: o.intent.zone.clone(),
                    actuator: o.intent.actuator.clone(),
                    state: o.intent.state,
                    expires_at_ms: o.expires_at_ms,
                })
                .collect(),
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn zone_index(&self, zone: &str) -> Option<usize> {
        self.zones.iter().position(|z| z.policy.zone == zone)
    }

    /// Gather every source's intents for one zone, resolve, and send what
    /// changed.
    fn dispatch_zone(
        &mut self,
        idx: usize,
        now_ms: u64,
        port: &mut impl CommandPort,
        sink: &mut impl EventSink,
    ) {
        let zone = &self.zones[idx];
        let mut intents: Vec<ActuatorIntent> = Vec::new();
        if self.auto_mode {
            intents.extend(zone.threshold_intents.iter().cloned());
        } else {
            // Automation suspended: its loads are released.
            intents.extend(zone.threshold_intents.iter().map(|i| ActuatorIntent {
                state: SwitchState::Off,
                ..i.clone()
            }));
        }
        if let Some(cycle) = &zone.cycle {
            intents.extend(cycle.intents(zone.id()));
        }
        intents.extend(
            self.overrides
                .iter()
                .filter(|o| o.intent.zone == *zone.id())
                .map(|o| o.intent.clone()),
        );

        let mut changes: Vec<ActuatorIntent> = resolve(&intents)
            .into_iter()
            .filter(|i| {
                let current = self
                    .actuators
                    .get(&(i.zone.clone(), i.actuator.clone()))
                    .map_or(SwitchState::Off, |s| s.state);
                current != i.state
            })
            .collect();
        if changes.is_empty() {
            return;
        }
        // OFFs first, so exclusive pairs never overlap on the relay bank.
        changes.sort_by_key(|i| i.state.is_on());

        if !port.is_connected() {
            debug!("link down, {} commands deferred", changes.len());
            return;
        }

        for intent in changes {
            let cmd = Command::new(intent.actuator.clone(), intent.state);
            match port.dispatch(&cmd) {
                Ok(()) => {
                    let key = (intent.zone.clone(), intent.actuator.clone());
                    self.record(&key, intent.state, Some(intent.source), now_ms, sink);
                }
                Err(e) => {
                    warn!("dispatch {} {} failed: {}", intent.actuator, intent.state, e);
                    sink.emit(&CoreEvent::DispatchFailed {
                        zone: intent.zone.clone(),
                        actuator: intent.actuator.clone(),
                        state: intent.state,
                        reason: e.to_string(),
                    });
                    // Link is gone; the rest waits for the restore.
                    break;
                }
            }
        }
    }

    fn record(
        &mut self,
        key: &ActuatorKey,
        state: SwitchState,
        source: Option<IntentSource>,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) {
        let entry = self.actuators.entry(key.clone()).or_insert_with(|| ActuatorState {
            zone: key.0.clone(),
            name: key.1.clone(),
            state: SwitchState::Off,
            changed_at_ms: now_ms,
            source: None,
        });
        entry.state = state;
        entry.changed_at_ms = now_ms;
        entry.source = source;
        sink.emit(&CoreEvent::ActuatorChanged {
            actuator: entry.clone(),
        });
    }
}
