//! Integration tests for the LinkSupervisor against an in-memory wire:
//! discovery, framing in both directions and the reconnect policy.

use super::mock_link::{wire, MockBackend};

use growctl::config::LinkConfig;
use growctl::error::TransportError;
use growctl::link::{EndpointInfo, Inbound, LinkEvent, LinkSupervisor};
use growctl::protocol::{Command, SwitchState};

fn connected(backend: MockBackend) -> LinkSupervisor<MockBackend> {
    let mut link = LinkSupervisor::new(backend, LinkConfig::default());
    let events = link.maintain(0);
    assert!(matches!(events.as_slice(), [LinkEvent::Connected { .. }]));
    link
}

#[test]
fn discovers_the_arduino_among_other_ports() {
    let w = wire();
    let mut backend = MockBackend::arduino(&w);
    backend.endpoints.insert(0, EndpointInfo::named("/dev/ttyS0"));

    let link = connected(backend);
    assert_eq!(link.status().endpoint.as_deref(), Some("/dev/ttyACM0"));
    assert!(link.status().connected);
}

#[test]
fn telemetry_lines_become_samples() {
    let w = wire();
    let mut link = connected(MockBackend::arduino(&w));

    w.borrow_mut().to_host.extend_from_slice(
        b"{\"fruiting\":{\"temp\":23.5,\"humidity\":88.0,\"co2\":950},\"spawning\":{\"error\":\"invalid_reading\"}}\n",
    );
    let items = link.poll(7000);
    assert_eq!(items.len(), 2);

    let samples: Vec<_> = items
        .into_iter()
        .filter_map(|i| match i {
            Inbound::Sample(s) => Some(s),
            Inbound::FrameError(_) => None,
        })
        .collect();
    let fruiting = samples.iter().find(|s| s.zone == "fruiting").unwrap();
    assert!(fruiting.valid);
    assert_eq!(fruiting.co2, 950);
    assert_eq!(fruiting.captured_at_ms, 7000);
    assert!(!samples.iter().find(|s| s.zone == "spawning").unwrap().valid);
    assert_eq!(link.status().last_frame_at_ms, Some(7000));
}

#[test]
fn garbage_is_reported_and_skipped() {
    let w = wire();
    let mut link = connected(MockBackend::arduino(&w));

    w.borrow_mut()
        .to_host
        .extend_from_slice(b"\x00\xffnoise}{\n{\"spawning\":{\"temp\":21,\"humidity\":90,\"co2\":700}}\n");
    let items = link.poll(1000);
    assert!(matches!(items[0], Inbound::FrameError(_)));
    assert!(matches!(&items[1], Inbound::Sample(s) if s.zone == "spawning"));
}

#[test]
fn partial_line_waits_for_the_rest() {
    let w = wire();
    let mut link = connected(MockBackend::arduino(&w));

    w.borrow_mut().to_host.extend_from_slice(b"{\"spawning\":{\"temp\":21,");
    assert!(link.poll(0).is_empty());
    w.borrow_mut().to_host.extend_from_slice(b"\"humidity\":90,\"co2\":700}}\n");
    assert_eq!(link.poll(100).len(), 1);
}

#[test]
fn commands_go_out_as_single_lines() {
    let w = wire();
    let mut link = connected(MockBackend::arduino(&w));

    link.send(&Command::new("MIST_MAKER", SwitchState::On)).unwrap();
    link.send(&Command::new("MIST_MAKER", SwitchState::Off)).unwrap();
    assert_eq!(
        w.borrow().to_node,
        b"{\"actuator\":\"MIST_MAKER\",\"state\":\"ON\"}\n{\"actuator\":\"MIST_MAKER\",\"state\":\"OFF\"}\n"
    );
}

#[test]
fn keepalive_follows_its_interval() {
    let w = wire();
    let mut link = connected(MockBackend::arduino(&w));

    assert_eq!(link.service_keepalive(0), Ok(true));
    assert_eq!(link.service_keepalive(2999), Ok(false));
    assert_eq!(link.service_keepalive(3000), Ok(true));
    assert_eq!(w.borrow().to_node, b"{\"keepalive\":true}\n{\"keepalive\":true}\n");
}

#[test]
fn unplug_then_replug_reconnects_on_fixed_interval() {
    let w = wire();
    let mut link = connected(MockBackend::arduino(&w));

    w.borrow_mut().unplugged = true;
    let err = link.send(&Command::new("MIST_MAKER", SwitchState::On));
    assert!(matches!(err, Err(TransportError::WriteFailed(_))));
    assert!(!link.is_connected());

    // Disconnect is reported, then the immediate retry fails.
    let events = link.maintain(1000);
    assert!(matches!(events[0], LinkEvent::Disconnected { .. }));
    assert!(matches!(events[1], LinkEvent::RetryFailed { attempt: 1, .. }));

    // Paced: nothing before the retry interval elapses.
    assert!(link.maintain(5999).is_empty());
    assert!(matches!(
        link.maintain(6000).as_slice(),
        [LinkEvent::RetryFailed { attempt: 2, .. }]
    ));

    w.borrow_mut().unplugged = false;
    assert!(matches!(
        link.maintain(11_000).as_slice(),
        [LinkEvent::Connected { .. }]
    ));
    assert_eq!(link.backend_mut().opened.len(), 2);
    assert!(link.send(&Command::new("MIST_MAKER", SwitchState::Off)).is_ok());
}

#[test]
fn read_failure_drops_the_link() {
    let w = wire();
    let mut link = connected(MockBackend::arduino(&w));
    w.borrow_mut().unplugged = true;
    assert!(link.poll(500).is_empty());
    assert!(!link.is_connected());
    assert!(!link.status().connected);
}

#[test]
fn no_matching_device_keeps_retrying() {
    let w = wire();
    let mut link = LinkSupervisor::new(MockBackend::empty(&w), LinkConfig::default());
    let events = link.maintain(0);
    assert!(matches!(events.as_slice(), [LinkEvent::RetryFailed { attempt: 1, .. }]));
    assert_eq!(link.discover(), Err(TransportError::NotFound));
}

#[test]
fn explicit_port_skips_enumeration() {
    let w = wire();
    let config = LinkConfig {
        port_override: Some("/dev/ttyUSB3".into()),
        ..LinkConfig::default()
    };
    let mut link = LinkSupervisor::new(MockBackend::empty(&w), config);
    assert!(matches!(
        link.maintain(0).as_slice(),
        [LinkEvent::Connected { endpoint }] if endpoint == "/dev/ttyUSB3"
    ));
}
