//! # RC Link
//!
//! Runs one or both ends of the RC link from a configuration file.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Set up logging with tracing subscriber (non-blocking stdout writer)
//!    - Load configuration (`rc-link [config.toml]`, else `config/default.toml`,
//!      else built-in defaults)
//!    - Open the radio: the serial bridge for the configured role, or an
//!      in-process loopback pair running both roles
//!
//! 2. **Main Loop** (at `link.update_rate_hz`)
//!    - Ground: advance link state, send the command, drain telemetry
//!    - Aircraft: advance link state, receive the command (failsafe while the
//!      link is lost), answer live commands with telemetry
//!    - Every `telemetry.log_interval_ms`: log status, append a JSONL snapshot
//!    - Link cycles run under `block_in_place` since serial I/O is blocking
//!
//! 3. **Graceful Shutdown** on Ctrl+C
//!    - Log final statistics and power the radio down

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use rc_link::clock::{Clock, SystemClock};
use rc_link::config::{Config, RadioBackend};
use rc_link::error::Result as LinkResult;
use rc_link::link::{LinkEvent, LinkSession, ReceivedCommand, Role};
use rc_link::packet::payload::{CommandPayload, TelemetryPayload};
use rc_link::radio::{LoopbackTransceiver, SerialTransceiver, Transceiver};
use rc_link::telemetry::{LinkSnapshot, TelemetryLogger};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

type Session = LinkSession<Box<dyn Transceiver + Send>, SystemClock>;

/// One end of the link plus the application data it exchanges
struct Station {
    session: Session,
    command: CommandPayload,
    telemetry: TelemetryPayload,
    outages: Arc<AtomicU32>,
}

impl Station {
    fn new(
        role: Role,
        radio: Box<dyn Transceiver + Send>,
        clock: SystemClock,
        config: &Config,
    ) -> Result<Self> {
        let failsafe = config.failsafe.to_command()?;
        let mut session = LinkSession::new(role, radio, clock, &config.link).with_failsafe(failsafe)?;

        let outages = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&outages);
        session.set_event_hook(move |event| {
            if let LinkEvent::LinkLost(_) = event {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });

        Ok(Self {
            session,
            command: CommandPayload::neutral(),
            telemetry: simulated_telemetry(),
            outages,
        })
    }

    fn cycle(&mut self) -> LinkResult<()> {
        match self.session.role() {
            Role::Ground => ground_cycle(&mut self.session, &self.command),
            Role::Aircraft => aircraft_cycle(&mut self.session, &self.telemetry).map(|_| ()),
        }
    }

    fn log_status(&self) {
        let stats = self.session.statistics().unwrap_or_default();
        info!(
            "[{}] link {} | sent {} recv {} missed {} crc {} | quality {}% | outages {}",
            self.session.role(),
            if self.session.is_link_active() { "up" } else { "DOWN" },
            stats.packets_sent,
            stats.packets_received,
            stats.packets_missed,
            stats.crc_errors,
            stats.link_quality,
            self.outages.load(Ordering::Relaxed)
        );
    }
}

/// Telemetry the aircraft reports until real sensors are wired in
fn simulated_telemetry() -> TelemetryPayload {
    TelemetryPayload {
        gps_sats: 0,
        battery_mv: 12_600,
        rssi: 100,
        ..TelemetryPayload::default()
    }
}

/// Ground station: send the command, drain pending telemetry
fn ground_cycle<R: Transceiver, C: Clock>(
    session: &mut LinkSession<R, C>,
    command: &CommandPayload,
) -> LinkResult<()> {
    session.update()?;

    if let Err(e) = session.send_command(command) {
        debug!("Failed to send command: {}", e);
    }

    loop {
        match session.receive_telemetry() {
            Ok(telemetry) => debug!(
                "Telemetry: {:.2} V, rssi {}%, {} sats",
                telemetry.battery_volts(),
                telemetry.rssi,
                telemetry.gps_sats
            ),
            Err(e) if e.is_no_data() => return Ok(()),
            Err(e) if e.is_frame_rejection() => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Aircraft: take the command (or failsafe), answer live commands with telemetry
fn aircraft_cycle<R: Transceiver, C: Clock>(
    session: &mut LinkSession<R, C>,
    telemetry: &TelemetryPayload,
) -> LinkResult<Option<ReceivedCommand>> {
    session.update()?;

    let received = match session.receive_command() {
        Ok(received) => Some(received),
        Err(e) if e.is_no_data() || e.is_frame_rejection() => None,
        Err(e) => return Err(e),
    };

    if let Some(ReceivedCommand::Live(_)) = received {
        if let Err(e) = session.send_telemetry(telemetry) {
            debug!("Failed to send telemetry: {}", e);
        }
    }

    Ok(received)
}

fn init_logging() -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(writer)
        .init();

    guard
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path).with_context(|| format!("Failed to load config from {}", path)),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG_PATH)),
        None => {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

fn build_stations(config: &Config) -> Result<Vec<Station>> {
    let clock = SystemClock::new();

    match config.radio.backend {
        RadioBackend::Serial => {
            let radio = SerialTransceiver::open(&config.radio)?;
            info!("Radio bridge opened at: {}", radio.device_path());
            Ok(vec![Station::new(config.role, Box::new(radio), clock, config)?])
        }
        RadioBackend::Loopback => {
            let (ground_radio, aircraft_radio) = LoopbackTransceiver::pair();
            info!("Loopback radio: running ground and aircraft in-process");
            Ok(vec![
                Station::new(Role::Ground, Box::new(ground_radio), clock, config)?,
                Station::new(Role::Aircraft, Box::new(aircraft_radio), clock, config)?,
            ])
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = init_logging();

    info!("RC Link v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_arg = std::env::args().nth(1);
    let config = load_config(config_arg.as_deref())?;

    let mut stations = build_stations(&config)?;
    let mut logger = if config.telemetry.enabled {
        Some(TelemetryLogger::new(&config.telemetry)?)
    } else {
        None
    };

    let mut link_interval = interval(config.link.update_period());
    link_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut status_interval = interval(Duration::from_millis(config.telemetry.log_interval_ms));

    info!(
        "Starting link loop at {}Hz (timeout {} ms, loss threshold {})",
        config.link.update_rate_hz, config.link.link_timeout_ms, config.link.loss_threshold
    );
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = link_interval.tick() => {
                // Serial reads and writes block up to the port timeout
                tokio::task::block_in_place(|| {
                    for station in &mut stations {
                        if let Err(e) = station.cycle() {
                            warn!("[{}] link cycle failed: {}", station.session.role(), e);
                        }
                    }
                });
            }

            _ = status_interval.tick() => {
                for station in &stations {
                    station.log_status();
                    if let Some(logger) = logger.as_mut() {
                        if let Err(e) = logger.log(&LinkSnapshot::capture(&station.session)) {
                            warn!("Failed to write telemetry: {}", e);
                        }
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    for station in &mut stations {
        station.log_status();
        if let Err(e) = station.session.deinit() {
            warn!("[{}] failed to power down radio: {}", station.session.role(), e);
        }
    }
    if let Some(logger) = logger.as_mut() {
        logger.flush()?;
    }

    Ok(())
}
