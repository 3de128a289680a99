//! Growctl host controller — main entry point.
//!
//! Hexagonal architecture with a single polling control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SystemSerial      LogEventSink   ChannelSink   MonotonicClock │
//! │  (SerialBackend)   (EventSink)    (EventSink)   (Clock)        │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  LinkSupervisor (CommandPort)  ·  Orchestrator         │    │
//! │  │  Anomaly · Threshold · Cycle · Overrides               │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Journal worker (own thread)  ·  stdin command reader          │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use tracing_subscriber::EnvFilter;

use growctl::adapters::clock::MonotonicClock;
use growctl::adapters::log_sink::LogEventSink;
use growctl::adapters::serial::SystemSerial;
use growctl::app::{Clock, Orchestrator, SnapshotBoard};
use growctl::config::{self, PolicyConfig};
use growctl::link::{Inbound, LinkSupervisor};
use growctl::sync::{self, ChannelSink, CommandChannel, OperatorInput, OutboundChannel};

/// Control loop period.
const TICK: Duration = Duration::from_millis(100);

/// Status file refresh period.
const STATUS_EVERY_MS: u64 = 1000;

static OUTBOUND: OutboundChannel = OutboundChannel::new();
static COMMANDS: CommandChannel = CommandChannel::new();

#[derive(Debug, Parser)]
#[command(name = "growctl", version, about = "Cultivation chamber host controller")]
struct Cli {
    /// Policy file (JSON).  Built-in defaults are used if absent or invalid.
    #[arg(short, long, env = "GROWCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Serial port to use instead of auto-discovery.
    #[arg(short, long, env = "GROWCTL_PORT")]
    port: Option<String>,

    /// Append every event to this file as JSON lines.
    #[arg(short, long)]
    journal: Option<PathBuf>,

    /// Rewrite this file with the latest control snapshot once a second.
    #[arg(long)]
    status_file: Option<PathBuf>,

    /// Log filter, e.g. `info` or `growctl=debug`.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Stop after this many seconds (default: run until `quit` on stdin).
    #[arg(long)]
    run_for_secs: Option<u64>,
}

fn load_config(path: Option<&Path>) -> PolicyConfig {
    let Some(path) = path else {
        info!("no policy file given, using defaults");
        return PolicyConfig::default();
    };
    match config::load(path) {
        Ok(c) => {
            info!("policy loaded from {}", path.display());
            c
        }
        Err(e) => {
            warn!("policy {} unusable ({}), using defaults", path.display(), e);
            PolicyConfig::default()
        }
    }
}

fn write_status(path: &Path, board: &SnapshotBoard) -> Result<()> {
    let json = serde_json::to_vec_pretty(&*board.latest())?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── 1. Logging ────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    info!("growctl v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Configuration ──────────────────────────────────────
    let mut config = load_config(cli.config.as_deref());
    if cli.port.is_some() {
        config.link.port_override.clone_from(&cli.port);
    }

    // ── 3. Workers ────────────────────────────────────────────
    let journal: Box<dyn Write + Send> = match &cli.journal {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening journal {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(std::io::sink()),
    };
    let journal_worker = std::thread::Builder::new()
        .name("journal".into())
        .spawn(move || sync::run_journal(&OUTBOUND, journal))?;
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(|| sync::read_commands(std::io::stdin().lock(), &COMMANDS))?;

    // ── 4. Core ───────────────────────────────────────────────
    let clock = MonotonicClock::new();
    let mut link = LinkSupervisor::new(SystemSerial::new(), config.link.clone());
    let mut orchestrator = Orchestrator::new(config, clock.now_ms());
    let mut sink = (LogEventSink::new(), ChannelSink::new(&OUTBOUND));
    let board = SnapshotBoard::new();
    orchestrator.start(&mut sink);

    let deadline_ms = cli.run_for_secs.map(|s| s.saturating_mul(1000));
    let mut next_status_ms = 0;

    // ── 5. Control loop ───────────────────────────────────────
    loop {
        let now = clock.now_ms();

        for event in link.maintain(now) {
            orchestrator.on_link_event(event, now, &mut link, &mut sink);
        }

        for inbound in link.poll(now) {
            match inbound {
                Inbound::Sample(sample) => orchestrator.on_sample(sample, &mut link, &mut sink),
                Inbound::FrameError(e) => orchestrator.on_frame_error(&e, &mut sink),
            }
        }

        let mut quit = false;
        while let Ok(input) = COMMANDS.try_receive() {
            match input {
                OperatorInput::Command(cmd) => {
                    if !orchestrator.handle_command(cmd, now, &mut link, &mut sink) {
                        warn!("command rejected");
                    }
                }
                OperatorInput::Quit => quit = true,
            }
        }

        orchestrator.on_timer(now, &mut link, &mut sink);

        if let Err(e) = link.service_keepalive(now) {
            warn!("keepalive failed: {}", e);
        }

        board.publish(orchestrator.snapshot(now, link.status()));
        if let Some(path) = &cli.status_file {
            if now >= next_status_ms {
                next_status_ms = now + STATUS_EVERY_MS;
                if let Err(e) = write_status(path, &board) {
                    warn!("status file: {:#}", e);
                }
            }
        }

        if quit || deadline_ms.is_some_and(|d| now >= d) {
            break;
        }
        std::thread::sleep(TICK);
    }

    // ── 6. Shutdown ───────────────────────────────────────────
    orchestrator.shutdown(clock.now_ms(), &mut link, &mut sink);
    link.close();
    if sink.1.dropped() > 0 {
        warn!("{} events never reached the journal", sink.1.dropped());
    }
    while !sink.1.close() && !journal_worker.is_finished() {
        std::thread::sleep(Duration::from_millis(10));
    }
    match journal_worker.join() {
        Ok(Ok(n)) => info!("journal closed, {} events written", n),
        Ok(Err(e)) => error!("journal worker failed: {:#}", e),
        Err(_) => error!("journal worker panicked"),
    }
    Ok(())
}
