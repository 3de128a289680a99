//! End-to-end: node loop ⇄ in-memory wire ⇄ LinkSupervisor ⇄ Orchestrator.
//!
//! Both sides run in lockstep on a simulated clock, the same way the host
//! binary and the node firmware interleave in production.

use std::cell::RefCell;
use std::rc::Rc;

use super::mock_link::{wire, MockBackend, MockPin, NodePort, RecordingSink, ScriptedSensor};

use growctl::app::{CoreEvent, Orchestrator};
use growctl::config::PolicyConfig;
use growctl::link::{Inbound, LinkSupervisor};
use growctl::node::{NodeLoop, RawReading, RelayBank};
use growctl::protocol::SwitchState;

struct Rig {
    link: LinkSupervisor<MockBackend>,
    orch: Orchestrator,
    sink: RecordingSink,
    node: NodeLoop<MockPin, ScriptedSensor>,
    node_port: NodePort,
    spawning: Rc<RefCell<Option<RawReading>>>,
}

impl Rig {
    fn new() -> Self {
        let w = wire();
        let mut cfg = PolicyConfig::default();
        cfg.orchestrator.startup_grace_secs = 0;

        let mut bank = RelayBank::new();
        bank.add("SPAWNING_EXHAUST_FAN", MockPin::default(), true).unwrap();
        let mut node = NodeLoop::new(cfg.node.clone(), bank, 0);
        let (sensor, spawning) = ScriptedSensor::new(24.0, 90.0, 600.0);
        node.add_zone("spawning", sensor);

        let link = LinkSupervisor::new(MockBackend::arduino(&w), cfg.link.clone());
        let mut sink = RecordingSink::new();
        let mut orch = Orchestrator::new(cfg, 0);
        orch.start(&mut sink);

        Self {
            link,
            orch,
            sink,
            node,
            node_port: NodePort::new(&w),
            spawning,
        }
    }

    /// One host tick followed by one node tick.
    fn step(&mut self, now: u64, host_alive: bool) {
        if host_alive {
            for event in self.link.maintain(now) {
                self.orch.on_link_event(event, now, &mut self.link, &mut self.sink);
            }
            for item in self.link.poll(now) {
                match item {
                    Inbound::Sample(s) => self.orch.on_sample(s, &mut self.link, &mut self.sink),
                    Inbound::FrameError(e) => self.orch.on_frame_error(&e, &mut self.sink),
                }
            }
            self.orch.on_timer(now, &mut self.link, &mut self.sink);
            self.link.service_keepalive(now).unwrap();
        }
        self.node.run_once(&mut self.node_port, now).unwrap();
    }

    fn set_co2(&self, co2: f32) {
        if let Some(r) = self.spawning.borrow_mut().as_mut() {
            r.co2 = co2;
        }
    }

    fn fan(&self) -> Option<SwitchState> {
        self.node.relays().state("SPAWNING_EXHAUST_FAN")
    }
}

#[test]
fn high_co2_reaches_the_relay_and_clears_with_hysteresis() {
    let mut rig = Rig::new();
    rig.set_co2(1050.0);

    // t=0: connect, node reports; t=100: host acts; t=200: node applies.
    for t in (0..=200).step_by(100) {
        rig.step(t, true);
    }
    assert_eq!(rig.fan(), Some(SwitchState::On));

    rig.set_co2(960.0);
    for t in (5000..=5200).step_by(100) {
        rig.step(t, true);
    }
    assert_eq!(rig.fan(), Some(SwitchState::On));

    rig.set_co2(880.0);
    for t in (10_000..=10_200).step_by(100) {
        rig.step(t, true);
    }
    assert_eq!(rig.fan(), Some(SwitchState::Off));
    assert_eq!(
        rig.sink.count(|e| matches!(e, CoreEvent::ActuatorChanged { .. })),
        2
    );
}

#[test]
fn keepalives_hold_the_watchdog_through_quiet_periods() {
    let mut rig = Rig::new();
    for t in (0..60_000).step_by(500) {
        rig.step(t, true);
    }
    assert!(!rig.node.watchdog().is_tripped());
}

#[test]
fn dead_host_trips_the_node_safe() {
    let mut rig = Rig::new();
    rig.set_co2(1050.0);
    for t in (0..=200).step_by(100) {
        rig.step(t, true);
    }
    assert_eq!(rig.fan(), Some(SwitchState::On));

    // Host process hangs: node keeps reporting, nobody answers.
    for t in (300..=12_000).step_by(100) {
        rig.step(t, false);
    }
    assert!(rig.node.watchdog().is_tripped());
    assert_eq!(rig.fan(), Some(SwitchState::Off));
    assert_eq!(rig.node.watchdog().trip_count(), 1);
}
