//! Link Supervisor — owns the transport to the node.
//!
//! ```text
//!              maintain(now) ≥ next_attempt
//!  ┌──────────────┐ ─────────────────────────▶ discover + connect
//!  │ Disconnected │                                 │
//!  └──────────────┘ ◀── write/read error ──┐        │ ok
//!         ▲   │ fail: RetryFailed,          │        ▼
//!         │   │ next_attempt += interval   ┌┴────────────┐
//!         └───┘                            │  Connected  │
//!                                          └─────────────┘
//! ```
//!
//! Retries run on a fixed interval with no backoff: the node is either
//! plugged in or it isn't.

use log::{debug, info, warn};
use serde::Serialize;

use super::discovery::select;
use super::transport::{SerialBackend, Transport, write_all};
use crate::app::ports::CommandPort;
use crate::config::LinkConfig;
use crate::error::{FrameError, TransportError};
use crate::protocol::{Command, Frame, LineCodec, TelemetrySample, encode};

/// Bytes pulled per read call.
const READ_CHUNK: usize = 256;
/// Upper bound on reads per `poll` so a chatty node cannot starve the loop.
const MAX_READS_PER_POLL: usize = 16;

/// Host view of the link, exposed read-only to collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    pub connected: bool,
    pub endpoint: Option<String>,
    pub last_frame_at_ms: Option<u64>,
}

/// One decoded item from [`LinkSupervisor::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Sample(TelemetrySample),
    FrameError(FrameError),
}

/// Connectivity changes, surfaced to collaborators as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkEvent {
    Connected { endpoint: String },
    Disconnected { reason: String },
    RetryFailed { attempt: u32, reason: String },
}

pub struct LinkSupervisor<B: SerialBackend> {
    backend: B,
    config: LinkConfig,
    port: Option<B::Port>,
    codec: LineCodec,
    status: LinkStatus,
    next_attempt_ms: u64,
    attempts: u32,
    last_keepalive_ms: Option<u64>,
    events: Vec<LinkEvent>,
}

impl<B: SerialBackend> LinkSupervisor<B> {
    pub fn new(backend: B, config: LinkConfig) -> Self {
        Self {
            backend,
            config,
            port: None,
            codec: LineCodec::new(),
            status: LinkStatus::default(),
            next_attempt_ms: 0,
            attempts: 0,
            last_keepalive_ms: None,
            events: Vec::new(),
        }
    }

    pub fn status(&self) -> &LinkStatus {
        &self.status
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Select the endpoint to open: the configured override, else the first
    /// enumerated endpoint matching the hardware signature.
    pub fn discover(&mut self) -> Result<String, TransportError> {
        if let Some(port) = &self.config.port_override {
            return Ok(port.clone());
        }
        let endpoints = self.backend.enumerate()?;
        select(&endpoints, &self.config.signature).map(|ep| ep.id.clone())
    }

    /// Open `endpoint`.  Any partial bytes from a previous session are
    /// dropped.
    pub fn connect(&mut self, endpoint: &str) -> Result<(), TransportError> {
        let port = self.backend.open(endpoint, &self.config)?;
        self.port = Some(port);
        self.codec.reset();
        self.last_keepalive_ms = None;
        self.status.connected = true;
        self.status.endpoint = Some(endpoint.to_string());
        info!("link: connected to {} @ {} baud", endpoint, self.config.baud);
        Ok(())
    }

    /// Encode and write one frame.  A failure drops the link.
    pub fn send_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let Some(port) = self.port.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        let bytes = encode(frame);
        if let Err(e) = write_all(port, &bytes) {
            self.mark_disconnected(&e);
            return Err(e);
        }
        Ok(())
    }

    pub fn send(&mut self, command: &Command) -> Result<(), TransportError> {
        self.send_frame(&Frame::Command(command.clone()))?;
        debug!("link: sent {} {}", command.actuator, command.state);
        Ok(())
    }

    /// Send a keepalive if one is due.  Returns whether one was sent.
    pub fn service_keepalive(&mut self, now_ms: u64) -> Result<bool, TransportError> {
        if !self.is_connected() {
            return Ok(false);
        }
        let due = self
            .last_keepalive_ms
            .is_none_or(|t| now_ms.saturating_sub(t) >= self.config.keepalive_interval_ms);
        if !due {
            return Ok(false);
        }
        self.send_frame(&Frame::Keepalive)?;
        self.last_keepalive_ms = Some(now_ms);
        Ok(true)
    }

    /// Drain whatever the node has sent.  Never blocks.
    pub fn poll(&mut self, now_ms: u64) -> Vec<Inbound> {
        let Some(port) = self.port.as_mut() else {
            return Vec::new();
        };

        let mut buf = [0u8; READ_CHUNK];
        let mut read_error = None;
        for _ in 0..MAX_READS_PER_POLL {
            match port.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => self.codec.feed(&buf[..n]),
                Err(e) => {
                    read_error = Some(e);
                    break;
                }
            }
        }

        let mut out = Vec::new();
        for item in self.codec.drain() {
            match item {
                Ok(frame) => {
                    self.status.last_frame_at_ms = Some(now_ms);
                    match frame {
                        Frame::Telemetry(_) => {
                            out.extend(frame.into_samples(now_ms).into_iter().map(Inbound::Sample));
                        }
                        other => debug!("link: ignoring non-telemetry frame {:?}", other),
                    }
                }
                Err(e) => {
                    debug!("link: frame error: {}", e);
                    out.push(Inbound::FrameError(e));
                }
            }
        }

        if let Some(e) = read_error {
            self.mark_disconnected(&e);
        }
        out
    }

    /// Drive reconnection.  Returns the connectivity events raised since the
    /// last call, including disconnects detected by `send`/`poll`.
    pub fn maintain(&mut self, now_ms: u64) -> Vec<LinkEvent> {
        if !self.is_connected() && now_ms >= self.next_attempt_ms {
            self.attempts += 1;
            let result = self.discover().and_then(|ep| self.connect(&ep).map(|()| ep));
            match result {
                Ok(endpoint) => {
                    self.attempts = 0;
                    self.events.push(LinkEvent::Connected { endpoint });
                }
                Err(e) => {
                    warn!("link: attempt {} failed: {}", self.attempts, e);
                    self.events.push(LinkEvent::RetryFailed {
                        attempt: self.attempts,
                        reason: e.to_string(),
                    });
                    self.next_attempt_ms = now_ms.saturating_add(self.config.retry_interval_ms);
                }
            }
        }
        core::mem::take(&mut self.events)
    }

    /// Close the link; the next `maintain` retries immediately.
    pub fn mark_disconnected(&mut self, reason: &TransportError) {
        if self.port.take().is_none() {
            return;
        }
        warn!("link: disconnected: {}", reason);
        self.codec.reset();
        self.status.connected = false;
        self.next_attempt_ms = 0;
        self.events.push(LinkEvent::Disconnected {
            reason: reason.to_string(),
        });
    }

    /// Close without scheduling anything (process shutdown).
    pub fn close(&mut self) {
        if self.port.take().is_some() {
            info!("link: closed");
        }
        self.status.connected = false;
    }
}

impl<B: SerialBackend> CommandPort for LinkSupervisor<B> {
    fn dispatch(&mut self, command: &Command) -> Result<(), TransportError> {
        self.send(command)
    }

    fn is_connected(&self) -> bool {
        LinkSupervisor::is_connected(self)
    }
}
