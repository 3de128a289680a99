//! Outbound event channel and journal worker.
//!
//! Uses an `embassy-sync` bounded channel to decouple the control loop from
//! persistence.  The loop never blocks on the journal: when the channel is
//! full the event is dropped and counted.
//!
//! ```text
//! ┌──────────────┐  Outbound  ┌──────────────┐
//! │ Control loop │───────────▶│ Sync worker  │──▶ journal (JSON lines)
//! │  (sync)      │ try_send   │ (own thread) │
//! └──────────────┘            └──────────────┘
//! ```

use std::io::{BufRead, Write};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, warn};

use crate::app::commands::ControlCommand;
use crate::app::events::CoreEvent;
use crate::app::ports::EventSink;

/// Channel depth for outbound events.
pub const OUTBOUND_DEPTH: usize = 64;

/// Channel depth for inbound operator commands.
pub const COMMAND_DEPTH: usize = 8;

/// Operator input, delivered to the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorInput {
    Command(ControlCommand),
    /// Run the shutdown sequence and exit.
    Quit,
}

pub type CommandChannel = Channel<CriticalSectionRawMutex, OperatorInput, COMMAND_DEPTH>;

pub enum Outbound {
    Event(CoreEvent),
    /// Flush and stop the worker.
    Shutdown,
}

pub type OutboundChannel = Channel<CriticalSectionRawMutex, Outbound, OUTBOUND_DEPTH>;

/// [`EventSink`] that hands events to the sync worker without blocking.
pub struct ChannelSink<'a> {
    channel: &'a OutboundChannel,
    dropped: u32,
}

impl<'a> ChannelSink<'a> {
    pub fn new(channel: &'a OutboundChannel) -> Self {
        Self { channel, dropped: 0 }
    }

    /// Events lost to a full channel since start.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Ask the worker to flush and exit.  Returns `false` if the channel is
    /// full; the caller retries while the worker is still alive.
    pub fn close(&self) -> bool {
        self.channel.try_send(Outbound::Shutdown).is_ok()
    }
}

impl EventSink for ChannelSink<'_> {
    fn emit(&mut self, event: &CoreEvent) {
        if self.channel.try_send(Outbound::Event(event.clone())).is_err() {
            self.dropped = self.dropped.saturating_add(1);
            // First drop and every 100th after that.
            if self.dropped % 100 == 1 {
                warn!("outbound channel full, {} events dropped", self.dropped);
            }
        }
    }
}

/// Drain the channel into `out` as one JSON object per line until a
/// [`Outbound::Shutdown`] arrives.  Returns the number of events written.
pub fn run_journal<W: Write>(channel: &OutboundChannel, mut out: W) -> anyhow::Result<u64> {
    let mut written = 0u64;
    loop {
        match futures_lite::future::block_on(channel.receive()) {
            Outbound::Event(event) => {
                serde_json::to_writer(&mut out, &event)?;
                out.write_all(b"\n")?;
                written += 1;
            }
            Outbound::Shutdown => break,
        }
    }
    // Anything queued behind the shutdown marker still lands.
    while let Ok(Outbound::Event(event)) = channel.try_receive() {
        serde_json::to_writer(&mut out, &event)?;
        out.write_all(b"\n")?;
        written += 1;
    }
    out.flush()?;
    debug!("journal worker stopped after {} events", written);
    Ok(written)
}

/// Parse operator input, one JSON [`ControlCommand`] per line, into the
/// command channel.  A bare `quit` line requests shutdown.  Returns at EOF
/// or after `quit`; malformed lines are logged and skipped.
pub fn read_commands<R: BufRead>(input: R, channel: &CommandChannel) -> usize {
    let mut accepted = 0;
    for line in input.lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            futures_lite::future::block_on(channel.send(OperatorInput::Quit));
            break;
        }
        match serde_json::from_str::<ControlCommand>(line) {
            Ok(cmd) => {
                futures_lite::future::block_on(channel.send(OperatorInput::Command(cmd)));
                accepted += 1;
            }
            Err(e) => warn!("ignoring command line: {}", e),
        }
    }
    accepted
}
