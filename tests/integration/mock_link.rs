//! Mock adapters for integration tests.
//!
//! An in-memory wire joins a host-side transport and a node-side
//! transport, so the supervisor, orchestrator and node loop can talk to
//! each other without a serial port.  Recording adapters capture every
//! command and event for assertions.

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, OutputPin};

use growctl::app::ports::{CommandPort, EventSink};
use growctl::app::CoreEvent;
use growctl::config::LinkConfig;
use growctl::error::TransportError;
use growctl::link::{EndpointInfo, SerialBackend, Transport};
use growctl::node::{ClimateSensor, RawReading};
use growctl::protocol::Command;

// ── In-memory wire ────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Wire {
    pub to_node: Vec<u8>,
    pub to_host: Vec<u8>,
    /// Simulate a yanked cable on the host side.
    pub unplugged: bool,
}

pub type SharedWire = Rc<RefCell<Wire>>;

pub fn wire() -> SharedWire {
    Rc::new(RefCell::new(Wire::default()))
}

pub struct HostPort {
    wire: SharedWire,
}

impl Transport for HostPort {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut w = self.wire.borrow_mut();
        if w.unplugged {
            return Err(TransportError::ReadFailed("device vanished".into()));
        }
        let n = buf.len().min(w.to_host.len());
        buf[..n].copy_from_slice(&w.to_host[..n]);
        w.to_host.drain(..n);
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut w = self.wire.borrow_mut();
        if w.unplugged {
            return Err(TransportError::WriteFailed("device vanished".into()));
        }
        w.to_node.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct NodePort {
    wire: SharedWire,
}

impl NodePort {
    pub fn new(wire: &SharedWire) -> Self {
        Self { wire: Rc::clone(wire) }
    }
}

impl Transport for NodePort {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut w = self.wire.borrow_mut();
        let n = buf.len().min(w.to_node.len());
        buf[..n].copy_from_slice(&w.to_node[..n]);
        w.to_node.drain(..n);
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.wire.borrow_mut().to_host.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

// ── Backend ───────────────────────────────────────────────────

pub struct MockBackend {
    pub wire: SharedWire,
    pub endpoints: Vec<EndpointInfo>,
    pub opened: Vec<String>,
}

#[allow(dead_code)]
impl MockBackend {
    /// One Arduino-looking endpoint on `/dev/ttyACM0`.
    pub fn arduino(wire: &SharedWire) -> Self {
        Self {
            wire: Rc::clone(wire),
            endpoints: vec![EndpointInfo {
                id: "/dev/ttyACM0".into(),
                vid: Some(0x2341),
                pid: Some(0x0043),
                manufacturer: Some("Arduino (www.arduino.cc)".into()),
                product: None,
            }],
            opened: Vec::new(),
        }
    }

    pub fn empty(wire: &SharedWire) -> Self {
        Self {
            wire: Rc::clone(wire),
            endpoints: Vec::new(),
            opened: Vec::new(),
        }
    }
}

impl SerialBackend for MockBackend {
    type Port = HostPort;

    fn enumerate(&mut self) -> Result<Vec<EndpointInfo>, TransportError> {
        Ok(self.endpoints.clone())
    }

    fn open(&mut self, endpoint: &str, _config: &LinkConfig) -> Result<HostPort, TransportError> {
        if self.wire.borrow().unplugged {
            return Err(TransportError::OpenFailed(endpoint.to_string()));
        }
        self.opened.push(endpoint.to_string());
        Ok(HostPort {
            wire: Rc::clone(&self.wire),
        })
    }
}

// ── Recording command port ────────────────────────────────────

#[derive(Debug)]
pub struct RecordingPort {
    pub sent: Vec<Command>,
    pub connected: bool,
}

#[allow(dead_code)]
impl RecordingPort {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            connected: true,
        }
    }

    pub fn last(&self) -> Option<&Command> {
        self.sent.last()
    }
}

impl CommandPort for RecordingPort {
    fn dispatch(&mut self, command: &Command) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.sent.push(command.clone());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

// ── Recording sink ────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<CoreEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&CoreEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &CoreEvent) {
        self.events.push(event.clone());
    }
}

// ── Node-side hardware ────────────────────────────────────────

/// Output pin that remembers its level.
#[derive(Debug, Default)]
pub struct MockPin {
    pub high: bool,
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.high = true;
        Ok(())
    }
}

/// Sensor returning whatever the test last put in the shared cell.
pub struct ScriptedSensor {
    pub reading: Rc<RefCell<Option<RawReading>>>,
}

#[allow(dead_code)]
impl ScriptedSensor {
    pub fn new(t: f32, h: f32, co2: f32) -> (Self, Rc<RefCell<Option<RawReading>>>) {
        let cell = Rc::new(RefCell::new(Some(RawReading {
            temperature: t,
            humidity: h,
            co2,
        })));
        (Self { reading: Rc::clone(&cell) }, cell)
    }
}

impl ClimateSensor for ScriptedSensor {
    fn read(&mut self) -> Option<RawReading> {
        *self.reading.borrow()
    }
}
