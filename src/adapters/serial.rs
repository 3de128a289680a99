//! USB serial adapter.
//!
//! Implements [`SerialBackend`] and [`Transport`] on top of the `serialport`
//! crate: 8 data bits, no parity, one stop bit, fixed baud from
//! [`LinkConfig`].  Reads never block: only bytes already queued by the OS
//! are consumed.

use std::io::{self, Read, Write};
use std::time::Duration;

use log::debug;
use serialport::{DataBits, Parity, SerialPort, SerialPortType, StopBits};

use crate::config::LinkConfig;
use crate::error::TransportError;
use crate::link::{EndpointInfo, SerialBackend, Transport};

/// Enumerates and opens OS serial ports.
#[derive(Debug, Default)]
pub struct SystemSerial;

impl SystemSerial {
    pub fn new() -> Self {
        Self
    }
}

impl SerialBackend for SystemSerial {
    type Port = SerialTransport;

    fn enumerate(&mut self) -> Result<Vec<EndpointInfo>, TransportError> {
        let ports =
            serialport::available_ports().map_err(|e| TransportError::EnumerationFailed(e.to_string()))?;
        Ok(ports
            .into_iter()
            .map(|p| match p.port_type {
                SerialPortType::UsbPort(usb) => EndpointInfo {
                    id: p.port_name,
                    vid: Some(usb.vid),
                    pid: Some(usb.pid),
                    manufacturer: usb.manufacturer,
                    product: usb.product,
                },
                _ => EndpointInfo::named(p.port_name),
            })
            .collect())
    }

    fn open(&mut self, endpoint: &str, config: &LinkConfig) -> Result<SerialTransport, TransportError> {
        let port = serialport::new(endpoint, config.baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(Duration::from_millis(config.timeout_ms))
            .open()
            .map_err(|e| TransportError::OpenFailed(format!("{endpoint}: {e}")))?;
        debug!("opened {} at {} baud", endpoint, config.baud);
        Ok(SerialTransport { port })
    }
}

/// An open serial port.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl Transport for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let queued = self
            .port
            .bytes_to_read()
            .map_err(|e| TransportError::ReadFailed(e.to_string()))? as usize;
        if queued == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = queued.min(buf.len());
        match self.port.read(&mut buf[..want]) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(TransportError::ReadFailed(e.to_string())),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        match self.port.write(data) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Err(TransportError::Timeout),
            Err(e) => Err(TransportError::WriteFailed(e.to_string())),
        }
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.port.flush().map_err(|e| TransportError::WriteFailed(e.to_string()))
    }
}
