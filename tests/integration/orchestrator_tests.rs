//! Integration tests for the Orchestrator → intents → CommandPort pipeline.
//!
//! These drive the orchestrator with hand-built samples and verify the
//! exact command stream a node would receive.

use super::mock_link::{RecordingPort, RecordingSink};

use growctl::app::{ControlCommand, CoreEvent, Orchestrator};
use growctl::config::PolicyConfig;
use growctl::control::IntentSource;
use growctl::cycle::{CyclePhase, StopReason};
use growctl::link::LinkStatus;
use growctl::protocol::{Command, SwitchState, TelemetrySample};

fn no_grace() -> PolicyConfig {
    let mut cfg = PolicyConfig::default();
    cfg.orchestrator.startup_grace_secs = 0;
    cfg
}

fn make() -> (Orchestrator, RecordingPort, RecordingSink) {
    let mut orch = Orchestrator::new(no_grace(), 0);
    let mut sink = RecordingSink::new();
    orch.start(&mut sink);
    (orch, RecordingPort::new(), sink)
}

fn spawning(co2: u32, at: u64) -> TelemetrySample {
    TelemetrySample::new("spawning", 24.0, 90.0, co2, at)
}

fn fruiting(humidity: f32, co2: u32, at: u64) -> TelemetrySample {
    TelemetrySample::new("fruiting", 24.0, humidity, co2, at)
}

fn on(name: &str) -> Command {
    Command::new(name, SwitchState::On)
}

fn off(name: &str) -> Command {
    Command::new(name, SwitchState::Off)
}

fn state(orch: &Orchestrator, zone: &str, name: &str) -> SwitchState {
    orch.actuator(zone, name).map_or(SwitchState::Off, |a| a.state)
}

// ── Threshold policy ──────────────────────────────────────────

#[test]
fn co2_band_switches_exhaust_fan_once_each_way() {
    let (mut orch, mut port, mut sink) = make();

    orch.on_sample(spawning(1050, 0), &mut port, &mut sink);
    assert_eq!(port.sent, vec![on("SPAWNING_EXHAUST_FAN")]);

    // 960 is inside (900, 1000]: hold, nothing on the wire.
    orch.on_sample(spawning(960, 5000), &mut port, &mut sink);
    assert_eq!(port.sent.len(), 1);
    assert_eq!(state(&orch, "spawning", "SPAWNING_EXHAUST_FAN"), SwitchState::On);

    orch.on_sample(spawning(880, 10_000), &mut port, &mut sink);
    assert_eq!(port.last(), Some(&off("SPAWNING_EXHAUST_FAN")));
    assert_eq!(port.sent.len(), 2);
}

#[test]
fn emergency_band_tags_the_source() {
    let (mut orch, mut port, mut sink) = make();

    orch.on_sample(fruiting(92.0, 1600, 0), &mut port, &mut sink);
    assert_eq!(port.sent, vec![on("FRUITING_EXHAUST_FAN")]);
    let fan = orch.actuator("fruiting", "FRUITING_EXHAUST_FAN").unwrap();
    assert_eq!(fan.source, Some(IntentSource::EmergencyOverride));

    orch.on_sample(fruiting(92.0, 850, 5000), &mut port, &mut sink);
    assert_eq!(port.last(), Some(&off("FRUITING_EXHAUST_FAN")));
}

// ── Cycle controller ──────────────────────────────────────────

#[test]
fn phases_alternate_without_overlap() {
    let (mut orch, mut port, mut sink) = make();
    let both_on = |o: &Orchestrator| {
        state(o, "fruiting", "MIST_MAKER").is_on() && state(o, "fruiting", "HUMIDIFIER_FAN").is_on()
    };

    orch.on_sample(fruiting(80.0, 800, 0), &mut port, &mut sink);
    assert_eq!(orch.cycle_phase("fruiting"), Some(CyclePhase::PhaseA));
    assert_eq!(port.sent, vec![on("MIST_MAKER")]);

    orch.on_timer(10_000, &mut port, &mut sink);
    assert_eq!(orch.cycle_phase("fruiting"), Some(CyclePhase::PhaseB));
    assert_eq!(port.sent[1..], [off("MIST_MAKER"), on("HUMIDIFIER_FAN")]);
    assert!(!both_on(&orch));

    orch.on_timer(40_000, &mut port, &mut sink);
    assert_eq!(orch.cycle_phase("fruiting"), Some(CyclePhase::PhaseA));
    assert_eq!(port.sent[3..], [off("HUMIDIFIER_FAN"), on("MIST_MAKER")]);
    assert!(!both_on(&orch));
}

#[test]
fn rising_trend_stops_the_cycle_early() {
    let (mut orch, mut port, mut sink) = make();

    orch.on_sample(fruiting(84.0, 800, 0), &mut port, &mut sink);
    orch.on_sample(fruiting(86.0, 800, 6000), &mut port, &mut sink);
    assert_eq!(orch.cycle_phase("fruiting"), Some(CyclePhase::PhaseA));

    // 4 %RH over 12 s projects to 93 within 15 s, past 90 + 2.
    orch.on_sample(fruiting(88.0, 800, 12_000), &mut port, &mut sink);
    assert_eq!(orch.cycle_phase("fruiting"), Some(CyclePhase::Idle));
    assert_eq!(port.last(), Some(&off("MIST_MAKER")));

    let stop = sink.events.iter().rev().find_map(|e| match e {
        CoreEvent::Cycle { transition, .. } => transition.reason,
        _ => None,
    });
    assert_eq!(stop, Some(StopReason::Predictive));
}

#[test]
fn critical_humidity_stops_immediately() {
    let (mut orch, mut port, mut sink) = make();
    orch.on_sample(fruiting(80.0, 800, 0), &mut port, &mut sink);
    orch.on_sample(fruiting(96.0, 800, 5000), &mut port, &mut sink);
    assert_eq!(orch.cycle_phase("fruiting"), Some(CyclePhase::Idle));
    assert!(!state(&orch, "fruiting", "MIST_MAKER").is_on());
}

// ── Anomaly filter ────────────────────────────────────────────

#[test]
fn anomalies_never_move_actuators() {
    let (mut orch, mut port, mut sink) = make();
    orch.on_sample(spawning(1050, 0), &mut port, &mut sink);
    assert_eq!(port.sent.len(), 1);

    // Impossible humidity with low CO2: would switch the fan OFF if trusted.
    orch.on_sample(TelemetrySample::new("spawning", 24.0, -5.0, 500, 5000), &mut port, &mut sink);
    orch.on_sample(TelemetrySample::new("spawning", 24.0, -5.0, 500, 10_000), &mut port, &mut sink);
    assert_eq!(port.sent.len(), 1);
    assert_eq!(state(&orch, "spawning", "SPAWNING_EXHAUST_FAN"), SwitchState::On);
    assert_eq!(
        sink.count(|e| matches!(e, CoreEvent::SensorFaultSuspected { .. })),
        1
    );
}

#[test]
fn sensor_fault_frames_are_persisted_and_escalated() {
    let (mut orch, mut port, mut sink) = make();
    orch.on_sample(TelemetrySample::fault("fruiting", 0), &mut port, &mut sink);
    orch.on_sample(TelemetrySample::fault("fruiting", 5000), &mut port, &mut sink);

    assert!(port.sent.is_empty());
    assert_eq!(sink.count(|e| matches!(e, CoreEvent::Sample { .. })), 2);
    assert!(sink.events.iter().any(|e| matches!(
        e,
        CoreEvent::SensorFaultSuspected { zone, consecutive: 2 } if zone == "fruiting"
    )));
}

// ── Grace period ──────────────────────────────────────────────

#[test]
fn grace_period_stores_but_never_commands() {
    let mut orch = Orchestrator::new(PolicyConfig::default(), 0);
    let (mut port, mut sink) = (RecordingPort::new(), RecordingSink::new());

    orch.on_sample(spawning(1500, 10_000), &mut port, &mut sink);
    orch.on_timer(20_000, &mut port, &mut sink);
    assert!(port.sent.is_empty());
    assert!(orch.in_grace(29_999));

    let snap = orch.snapshot(20_000, &LinkStatus::default());
    assert!(snap.in_grace);
    let zone = snap.zones.iter().find(|z| z.zone == "spawning").unwrap();
    assert_eq!(zone.latest.as_ref().map(|s| s.co2), Some(1500));

    orch.on_sample(spawning(1500, 30_000), &mut port, &mut sink);
    assert_eq!(port.sent, vec![on("SPAWNING_EXHAUST_FAN")]);
}

#[test]
fn manual_override_applies_during_grace() {
    let mut orch = Orchestrator::new(PolicyConfig::default(), 0);
    let (mut port, mut sink) = (RecordingPort::new(), RecordingSink::new());
    let accepted = orch.handle_command(
        ControlCommand::ManualOverride {
            zone: "fruiting".into(),
            actuator: "FRUITING_INTAKE_FAN".into(),
            state: SwitchState::On,
        },
        1000,
        &mut port,
        &mut sink,
    );
    assert!(accepted);
    assert_eq!(port.sent, vec![on("FRUITING_INTAKE_FAN")]);
}

// ── Overrides & auto mode ─────────────────────────────────────

#[test]
fn cleared_override_hands_back_to_automation() {
    let (mut orch, mut port, mut sink) = make();
    orch.on_sample(spawning(1050, 0), &mut port, &mut sink);

    orch.handle_command(
        ControlCommand::ManualOverride {
            zone: "spawning".into(),
            actuator: "SPAWNING_EXHAUST_FAN".into(),
            state: SwitchState::Off,
        },
        1000,
        &mut port,
        &mut sink,
    );
    // Threshold still wants ON, but manual wins.
    orch.on_sample(spawning(1100, 5000), &mut port, &mut sink);
    assert_eq!(state(&orch, "spawning", "SPAWNING_EXHAUST_FAN"), SwitchState::Off);

    assert!(orch.handle_command(
        ControlCommand::ClearOverride {
            zone: "spawning".into(),
            actuator: "SPAWNING_EXHAUST_FAN".into(),
        },
        6000,
        &mut port,
        &mut sink,
    ));
    assert_eq!(port.last(), Some(&on("SPAWNING_EXHAUST_FAN")));
    assert!(orch.snapshot(6000, &LinkStatus::default()).overrides.is_empty());
}

#[test]
fn auto_mode_off_releases_threshold_loads_on_next_tick() {
    let (mut orch, mut port, mut sink) = make();
    orch.on_sample(spawning(1050, 0), &mut port, &mut sink);

    orch.handle_command(ControlCommand::SetAutoMode { enabled: false }, 1000, &mut port, &mut sink);
    assert!(!orch.auto_mode());
    assert_eq!(port.last(), Some(&off("SPAWNING_EXHAUST_FAN")));

    orch.on_sample(spawning(1200, 5000), &mut port, &mut sink);
    assert_eq!(port.sent.len(), 2);

    orch.handle_command(ControlCommand::SetAutoMode { enabled: true }, 6000, &mut port, &mut sink);
    assert_eq!(port.last(), Some(&on("SPAWNING_EXHAUST_FAN")));
}

// ── Link interplay ────────────────────────────────────────────

#[test]
fn commands_wait_for_the_link() {
    let (mut orch, mut port, mut sink) = make();
    port.connected = false;
    orch.on_sample(spawning(1050, 0), &mut port, &mut sink);
    assert!(port.sent.is_empty());
    assert_eq!(state(&orch, "spawning", "SPAWNING_EXHAUST_FAN"), SwitchState::Off);

    port.connected = true;
    orch.on_link_restored(2000, &mut port, &mut sink);
    assert_eq!(port.sent, vec![on("SPAWNING_EXHAUST_FAN")]);
}

#[test]
fn snapshots_are_frozen_copies() {
    let (mut orch, mut port, mut sink) = make();
    let before = orch.snapshot(0, &LinkStatus::default());
    orch.on_sample(spawning(1050, 0), &mut port, &mut sink);
    let after = orch.snapshot(1, &LinkStatus::default());

    let fan = |s: &growctl::app::ControlSnapshot| {
        s.actuators
            .iter()
            .find(|a| a.name == "SPAWNING_EXHAUST_FAN")
            .map(|a| a.state)
    };
    assert_eq!(fan(&before), Some(SwitchState::Off));
    assert_eq!(fan(&after), Some(SwitchState::On));
}

#[test]
fn shutdown_leaves_everything_off() {
    let (mut orch, mut port, mut sink) = make();
    orch.on_sample(spawning(1050, 0), &mut port, &mut sink);
    orch.on_sample(fruiting(80.0, 800, 0), &mut port, &mut sink);

    orch.shutdown(1000, &mut port, &mut sink);
    assert!(orch.actuators().all(|a| !a.state.is_on()));
    assert!(port.sent.contains(&off("SPAWNING_EXHAUST_FAN")));
    assert!(port.sent.contains(&off("MIST_MAKER")));
}
