//! Barcode verifier: main entry point.
//!
//! Hexagonal architecture with a single event-driven control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  scanner (stdin)   PresencePoller   signals      ThreadTimer   │
//! │        │                 │             │              │        │
//! │        └────────────── EventQueue ◀────┴──────────────┘        │
//! │                            │                ▲                  │
//! │  ──────────────── Port Trait Boundary ──────┼─────────────     │
//! │                            ▼                │                  │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  FSM · Session · Reject timer                          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                            │                                   │
//! │  MqttLink (Messaging)  RejectOutput (Actuator)  LogEventSink   │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use embedded_hal::digital::{InputPin, OutputPin};
use log::info;
use tracing_subscriber::EnvFilter;

use verifier::adapters::gpio::{PresencePoller, RejectOutput, SimPin};
use verifier::adapters::log_sink::LogEventSink;
use verifier::adapters::mqtt::MqttLink;
use verifier::adapters::settings::{JsonSettings, load_or_init};
use verifier::adapters::timer::ThreadTimer;
use verifier::adapters::{scanner, signals};
use verifier::app::service::{AppService, Peripherals};
use verifier::config::VerifierConfig;
use verifier::events::EventQueue;

// ── Command line ──────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "barcode-verifier", version, about = "Barcode verification station controller")]
struct Cli {
    /// Settings file (created with defaults if absent).
    #[arg(long, env = "VERIFIER_SETTINGS", default_value = "settings.json")]
    settings: PathBuf,

    /// Ignore scans while the presence sensor reports no item.
    #[arg(long)]
    require_presence: bool,

    /// Log filter, used when RUST_LOG is not set.
    #[arg(long, env = "VERIFIER_LOG", default_value = "info")]
    log_level: String,
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── 1. Logging ────────────────────────────────────────────
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cli.log_level).context("invalid --log-level filter")?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("barcode-verifier v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Settings ───────────────────────────────────────────
    let settings = JsonSettings::new(&cli.settings);
    let mut config = load_or_init(&settings);
    if cli.require_presence {
        config.require_presence = true;
    }
    info!(
        "Broker {} | result topic '{}' | reject {} ms | sensor line {} | reject line {}",
        config.broker_endpoint(),
        config.result_topic,
        config.reject_delay_ms,
        config.sensor_port,
        config.actuator_port
    );

    // ── 3. Event sources ──────────────────────────────────────
    let queue = EventQueue::new();
    signals::spawn_listener(queue.sender()).context("installing signal handlers")?;
    // Detached: a blocking stdin read cannot be interrupted.
    scanner::spawn_reader(std::io::stdin(), queue.sender()).context("starting scanner reader")?;

    // ── 4. GPIO + control loop ────────────────────────────────
    // No board driver is linked in; the lines are in-memory and the sensor
    // rests at its "no item" level.
    let sensor = SimPin::new(!config.sensor_active_high);
    let output = SimPin::default();
    run_station(sensor, output, config, &queue)
}

/// Wire the adapters to the service and run until shutdown.
fn run_station<I, O>(sensor: I, output: O, config: VerifierConfig, queue: &EventQueue) -> Result<()>
where
    I: InputPin + Send + 'static,
    O: OutputPin,
{
    let actuator =
        RejectOutput::new(output, config.actuator_port).context("initialising reject output")?;
    let poller = PresencePoller::spawn(sensor, &config, queue.sender())
        .context("starting presence poller")?;
    let timer = ThreadTimer::spawn(queue.sender()).context("starting timer thread")?;

    let mut io = Peripherals {
        link: MqttLink::new(queue.sender()),
        actuator,
        timer,
        sink: LogEventSink::new(),
    };

    let mut service = AppService::new(config);
    service.start(&mut io);
    service.run(queue, &mut io);

    // The service has already disconnected and released the output.
    poller.stop();
    let Peripherals { link, timer, sink, .. } = io;
    drop(link);
    timer.stop();

    info!(
        "Stopped after {} events: {} scans ({} failed)",
        service.events_handled(),
        sink.scans(),
        sink.failures()
    );
    Ok(())
}
