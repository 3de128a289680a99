//! Integration tests for the node loop: relays driven by command lines,
//! the safety watchdog and periodic telemetry reports.

use super::mock_link::{wire, MockPin, NodePort, ScriptedSensor, SharedWire};

use growctl::config::NodeConfig;
use growctl::node::{NodeLoop, RelayBank, WatchdogState};
use growctl::protocol::{LineCodec, Frame, SwitchState, ZoneReading};

const RELAYS: [&str; 3] = ["MIST_MAKER", "HUMIDIFIER_FAN", "SPAWNING_EXHAUST_FAN"];

fn make_node(now: u64) -> NodeLoop<MockPin, ScriptedSensor> {
    let mut bank = RelayBank::new();
    for name in RELAYS {
        bank.add(name, MockPin::default(), true).unwrap();
    }
    NodeLoop::new(NodeConfig::default(), bank, now)
}

fn host_says(w: &SharedWire, line: &str) {
    let mut w = w.borrow_mut();
    w.to_node.extend_from_slice(line.as_bytes());
    w.to_node.push(b'\n');
}

const MIST_ON: &str = r#"{"actuator":"MIST_MAKER","state":"ON"}"#;
const KEEPALIVE: &str = r#"{"keepalive":true}"#;

#[test]
fn relays_start_deenergised() {
    let node = make_node(0);
    for name in RELAYS {
        assert_eq!(node.relays().state(name), Some(SwitchState::Off));
        // Active-low board: OFF is a high pin.
        assert!(node.relays().pin(name).unwrap().high);
    }
}

#[test]
fn command_drives_the_relay() {
    let w = wire();
    let mut port = NodePort::new(&w);
    let mut node = make_node(0);

    host_says(&w, MIST_ON);
    let stats = node.run_once(&mut port, 100).unwrap();
    assert_eq!(stats.frames, 1);
    assert_eq!(node.relays().state("MIST_MAKER"), Some(SwitchState::On));
    assert!(!node.relays().pin("MIST_MAKER").unwrap().high);
}

#[test]
fn unknown_actuator_is_rejected_but_counts_as_liveness() {
    let w = wire();
    let mut port = NodePort::new(&w);
    let mut node = make_node(0);

    host_says(&w, r#"{"actuator":"LASER","state":"ON"}"#);
    let stats = node.run_once(&mut port, 9000).unwrap();
    assert_eq!(stats.rejected_commands, 1);
    assert!(!node.relays().any_on());

    node.run_once(&mut port, 18_000).unwrap();
    assert_eq!(node.watchdog().state(), WatchdogState::Armed);
}

#[test]
fn silence_trips_once_and_forces_everything_off() {
    let w = wire();
    let mut port = NodePort::new(&w);
    let mut node = make_node(0);

    host_says(&w, MIST_ON);
    host_says(&w, r#"{"actuator":"SPAWNING_EXHAUST_FAN","state":"ON"}"#);
    node.run_once(&mut port, 1000).unwrap();
    assert!(node.relays().any_on());

    node.run_once(&mut port, 11_000).unwrap();
    assert!(!node.watchdog().is_tripped());

    node.run_once(&mut port, 11_001).unwrap();
    assert!(node.watchdog().is_tripped());
    assert!(!node.relays().any_on());

    for t in (12_000..60_000).step_by(1000) {
        node.run_once(&mut port, t).unwrap();
    }
    assert_eq!(node.watchdog().trip_count(), 1);
}

#[test]
fn garbage_does_not_count_as_liveness() {
    let w = wire();
    let mut port = NodePort::new(&w);
    let mut node = make_node(0);

    host_says(&w, MIST_ON);
    node.run_once(&mut port, 0).unwrap();
    for t in [3000, 6000, 9000] {
        host_says(&w, "{\"actuator\":\"MIST_MA");
        host_says(&w, "\u{7f}\u{1b}[0m");
        node.run_once(&mut port, t).unwrap();
    }
    node.run_once(&mut port, 10_001).unwrap();
    assert!(node.watchdog().is_tripped());
}

#[test]
fn rearm_does_not_restore_previous_outputs() {
    let w = wire();
    let mut port = NodePort::new(&w);
    let mut node = make_node(0);

    host_says(&w, MIST_ON);
    node.run_once(&mut port, 0).unwrap();
    node.run_once(&mut port, 10_001).unwrap();
    assert!(node.watchdog().is_tripped());

    host_says(&w, KEEPALIVE);
    node.run_once(&mut port, 12_000).unwrap();
    assert_eq!(node.watchdog().state(), WatchdogState::Armed);
    assert_eq!(node.relays().state("MIST_MAKER"), Some(SwitchState::Off));

    host_says(&w, MIST_ON);
    node.run_once(&mut port, 13_000).unwrap();
    assert_eq!(node.relays().state("MIST_MAKER"), Some(SwitchState::On));
}

#[test]
fn reports_on_interval_with_fault_marker() {
    let w = wire();
    let mut port = NodePort::new(&w);
    let mut node = make_node(0);
    let (good, _) = ScriptedSensor::new(24.0, 88.0, 950.0);
    let (bad, bad_cell) = ScriptedSensor::new(24.0, 88.0, 950.0);
    *bad_cell.borrow_mut() = None;
    node.add_zone("fruiting", good);
    node.add_zone("spawning", bad);

    node.run_once(&mut port, 0).unwrap();
    node.run_once(&mut port, 4999).unwrap();
    node.run_once(&mut port, 5000).unwrap();

    let mut codec = LineCodec::new();
    codec.feed(&w.borrow().to_host);
    let frames: Vec<Frame> = codec.drain().into_iter().map(Result::unwrap).collect();
    assert_eq!(frames.len(), 2);

    let Frame::Telemetry(zones) = &frames[1] else {
        panic!("expected telemetry, got {:?}", frames[1]);
    };
    assert_eq!(
        zones.get("fruiting"),
        Some(&ZoneReading::Valid {
            temp: 24.0,
            humidity: 88.0,
            co2: 950
        })
    );
    assert!(matches!(zones.get("spawning"), Some(ZoneReading::Fault(_))));
}
