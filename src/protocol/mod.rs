//! Host ↔ node line protocol.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Protocol Stack                       │
//! │                                                          │
//! │  ┌───────────┐   ┌───────────┐   ┌────────────────────┐  │
//! │  │ Transport │──▶│   Codec   │──▶│ Frame              │  │
//! │  │ (bytes)   │   │ (lines)   │   │ Command/Keepalive/ │  │
//! │  └───────────┘   └───────────┘   │ Telemetry          │  │
//! │                                  └────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod frames;

pub use codec::{LineCodec, decode, encode};
pub use frames::{Command, Frame, SwitchState, TelemetrySample, ZoneId, ZoneReading};
