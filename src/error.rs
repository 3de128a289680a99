//! Unified error types for the controller.
//!
//! Every fallible operation funnels into [`Error`], keeping the host loop's
//! error handling uniform.  None of these are fatal: the link layer recovers
//! from transport errors by reconnecting, the codec discards malformed bytes,
//! and configuration errors fall back to defaults at the binary boundary.

use core::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The serial link could not be opened, written or read.
    Transport(TransportError),
    /// Bytes on the wire did not form a valid frame.
    Frame(FrameError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No enumerated endpoint matched the hardware signature.
    NotFound,
    /// Enumerating endpoints failed.
    EnumerationFailed(String),
    /// The endpoint exists but could not be opened.
    OpenFailed(String),
    /// A send was attempted while no link is open.
    NotConnected,
    /// Write failed or was cut short.
    WriteFailed(String),
    /// Read failed (device vanished, I/O error).
    ReadFailed(String),
    /// A bounded write did not complete in time.
    Timeout,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no matching endpoint found"),
            Self::EnumerationFailed(msg) => write!(f, "endpoint enumeration failed: {msg}"),
            Self::OpenFailed(msg) => write!(f, "open failed: {msg}"),
            Self::NotConnected => write!(f, "not connected"),
            Self::WriteFailed(msg) => write!(f, "write failed: {msg}"),
            Self::ReadFailed(msg) => write!(f, "read failed: {msg}"),
            Self::Timeout => write!(f, "write timed out"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Frame errors
// ---------------------------------------------------------------------------

/// A line that did not decode into a frame.  The offending bytes have
/// already been discarded when one of these is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Line is not valid UTF-8.
    Utf8,
    /// Line is not parseable JSON.
    Malformed(String),
    /// JSON parsed but matches no known frame shape.
    UnknownShape,
    /// A known frame carried a field with the wrong type or value.
    InvalidField(&'static str),
    /// No delimiter within the maximum line length; buffered bytes dropped.
    Overflow { discarded: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf8 => write!(f, "line is not UTF-8"),
            Self::Malformed(msg) => write!(f, "malformed JSON: {msg}"),
            Self::UnknownShape => write!(f, "unknown frame shape"),
            Self::InvalidField(field) => write!(f, "invalid field '{field}'"),
            Self::Overflow { discarded } => {
                write!(f, "line overflow, discarded {discarded} bytes")
            }
        }
    }
}

impl std::error::Error for FrameError {}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file could not be read.
    Io(String),
    /// Config file is not valid JSON for [`PolicyConfig`](crate::config::PolicyConfig).
    Parse(String),
    /// A field failed range validation.  The message names the field.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Fault taxonomy surfaced to collaborators
// ---------------------------------------------------------------------------

/// Classification carried by fault events.  These are data, not errors: a
/// `SafetyTrip` in particular is the correct fail-safe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Transport,
    Frame,
    SensorFault,
    AnomalyDetected,
    SafetyTrip,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Frame => write!(f, "frame"),
            Self::SensorFault => write!(f, "sensor fault"),
            Self::AnomalyDetected => write!(f, "anomaly detected"),
            Self::SafetyTrip => write!(f, "safety trip"),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
