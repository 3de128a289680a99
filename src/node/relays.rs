//! Named relay outputs over `embedded-hal` pins.
//!
//! Relay boards are commonly active-low: driving the pin LOW energises the
//! coil.  Each channel records its polarity so callers only ever speak in
//! [`SwitchState`].

use core::fmt;

use embedded_hal::digital::{Error as _, OutputPin};
use log::{debug, warn};

use crate::protocol::SwitchState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// No channel with this name.
    UnknownActuator(String),
    /// The pin driver reported an error.
    Pin(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownActuator(name) => write!(f, "unknown actuator '{name}'"),
            Self::Pin(kind) => write!(f, "pin error: {kind}"),
        }
    }
}

impl std::error::Error for RelayError {}

struct Channel<P> {
    name: String,
    pin: P,
    active_low: bool,
    state: SwitchState,
}

impl<P: OutputPin> Channel<P> {
    fn drive(&mut self, state: SwitchState) -> Result<(), RelayError> {
        let high = state.is_on() != self.active_low;
        let result = if high { self.pin.set_high() } else { self.pin.set_low() };
        result.map_err(|e| RelayError::Pin(format!("{:?}", e.kind())))?;
        self.state = state;
        Ok(())
    }
}

pub struct RelayBank<P> {
    channels: Vec<Channel<P>>,
}

impl<P: OutputPin> Default for RelayBank<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: OutputPin> RelayBank<P> {
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
        }
    }

    /// Register a channel and drive it OFF.
    pub fn add(&mut self, name: impl Into<String>, pin: P, active_low: bool) -> Result<(), RelayError> {
        let mut ch = Channel {
            name: name.into(),
            pin,
            active_low,
            state: SwitchState::Off,
        };
        ch.drive(SwitchState::Off)?;
        self.channels.push(ch);
        Ok(())
    }

    pub fn set(&mut self, name: &str, state: SwitchState) -> Result<(), RelayError> {
        let ch = self
            .channels
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| RelayError::UnknownActuator(name.to_string()))?;
        ch.drive(state)?;
        debug!("relay {} -> {}", name, state);
        Ok(())
    }

    /// Drive every channel OFF.  Keeps going past pin errors; returns how
    /// many channels failed.
    pub fn all_off(&mut self) -> usize {
        let mut failed = 0;
        for ch in &mut self.channels {
            if let Err(e) = ch.drive(SwitchState::Off) {
                warn!("relay {} failed to switch OFF: {}", ch.name, e);
                failed += 1;
            }
        }
        failed
    }

    pub fn state(&self, name: &str) -> Option<SwitchState> {
        self.channels.iter().find(|c| c.name == name).map(|c| c.state)
    }

    pub fn states(&self) -> impl Iterator<Item = (&str, SwitchState)> {
        self.channels.iter().map(|c| (c.name.as_str(), c.state))
    }

    pub fn any_on(&self) -> bool {
        self.channels.iter().any(|c| c.state.is_on())
    }

    /// Borrow a channel's pin (diagnostics, tests).
    pub fn pin(&self, name: &str) -> Option<&P> {
        self.channels.iter().find(|c| c.name == name).map(|c| &c.pin)
    }
}
