//! Transport abstraction — any byte-oriented channel to the node.
//!
//! Concrete implementations:
//! - USB serial via `serialport` (host binary, feature `serial`)
//! - in-memory loopback (tests)
//!
//! The Link Supervisor is generic over [`SerialBackend`], so swapping the
//! physical link requires zero changes to the supervision logic.

use crate::config::LinkConfig;
use crate::error::TransportError;

/// Byte-oriented transport channel.
pub trait Transport {
    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns 0 if no data is available (non-blocking).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write `data`, returning the number of bytes accepted.  Must give up
    /// within the configured timeout.
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), TransportError>;
}

/// An enumerated endpoint candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointInfo {
    /// OS-level identifier (`/dev/ttyACM0`, `COM3`).
    pub id: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl EndpointInfo {
    pub fn named(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Factory for transports: lists candidates and opens one.
pub trait SerialBackend {
    type Port: Transport;

    fn enumerate(&mut self) -> Result<Vec<EndpointInfo>, TransportError>;

    /// Open `endpoint` at the fixed baud and framing in `config`.
    fn open(&mut self, endpoint: &str, config: &LinkConfig) -> Result<Self::Port, TransportError>;
}

/// Write all of `data`, treating a zero-length write as a timeout.
pub fn write_all<T: Transport + ?Sized>(port: &mut T, mut data: &[u8]) -> Result<(), TransportError> {
    while !data.is_empty() {
        let n = port.write(data)?;
        if n == 0 {
            return Err(TransportError::Timeout);
        }
        data = &data[n.min(data.len())..];
    }
    port.flush()
}
