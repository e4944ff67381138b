//! Occupancy sensor node
//!
//! Counts people crossing a dual-beam portal during operating hours and
//! reports the counts to the collector once per transmit interval. Sleeps
//! outside operating hours.
//!
//! Module structure:
//! - `domain/` - Core types (readings, crossings, schedule, transmission)
//! - `io/` - External interfaces (sensors, indicators, network link, HTTP client)
//! - `services/` - Business logic (detector, scheduler, transmit worker)
//! - `infra/` - Infrastructure (config, errors, clock, metrics)

use anyhow::Context;
use clap::Parser;
use occupancy_sensor::infra::{Config, Metrics, SystemClock};
use occupancy_sensor::io::{
    IndicatorPanel, IndicatorSink, ScriptedSensors, SensorPair, SysfsSensorPair,
    TcpProbeLink, TransmissionClient,
};
use occupancy_sensor::services::{create_transmit_worker, DutyCycleScheduler, MotionDetector};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Occupancy sensor node
#[derive(Parser, Debug)]
#[command(name = "occupancy-sensor", version, about)]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE, then config/node.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Replay a synthetic crossing pattern instead of reading GPIO
    #[arg(long)]
    simulate: bool,
}

/// One entrance and one exit every 20 seconds
fn simulated_sensors() -> ScriptedSensors {
    let step = Duration::from_millis(150);
    let mut steps = ScriptedSensors::crossing(Duration::from_secs(2), true, step);
    steps.extend(ScriptedSensors::crossing(Duration::from_secs(12), false, step));
    ScriptedSensors::new(steps).looping(Duration::from_secs(20))
}

async fn run_node<S: SensorPair + 'static>(
    config: &Config,
    sensors: S,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let metrics = Arc::new(Metrics::new());
    let indicators: Arc<dyn IndicatorSink> = Arc::new(IndicatorPanel::new());

    // Network sends run on their own task so a slow collector never stalls sampling
    let client = TransmissionClient::new(config, indicators.clone())
        .context("Failed to create transmission client")?;
    let idle_timeout = config.schedule().transmit_interval() * 2;
    let (queue, worker) = create_transmit_worker(client, metrics.clone(), idle_timeout);
    let worker_handle = tokio::spawn(worker.run());

    let link = Arc::new(TcpProbeLink::new(config, indicators.clone()));
    let detector = MotionDetector::new(sensors, config, metrics.clone());
    let scheduler = DutyCycleScheduler::new(
        config,
        detector,
        Arc::new(SystemClock),
        link,
        queue,
        indicators,
        metrics.clone(),
    );

    // Dropping the scheduler closes the queue, which stops the worker
    scheduler.run(shutdown_rx).await;
    let _ = worker_handle.await;

    metrics.report().log();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for per-candidate visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(Config::default_config_path);
    info!(git_hash = %env!("GIT_HASH"), "occupancy-sensor starting");

    // A malformed schedule is fatal; a missing file falls back to defaults
    let config = Config::load_from_path(&config_path).context("Invalid configuration")?;

    let schedule = config.schedule();
    info!(
        config_file = %config.config_file(),
        serial_number = %config.serial_number(),
        location = %config.location(),
        collector_addr = %config.collector_addr(),
        wake = %schedule.wake(),
        sleep = %schedule.sleep(),
        weekdays = ?schedule.weekdays(),
        transmit_interval_secs = %schedule.transmit_interval().as_secs(),
        motion_timeout_ms = %schedule.motion_timeout().as_millis(),
        count_mode = %config.count_mode().as_str(),
        simulate = %args.simulate,
        "config_loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    if args.simulate {
        run_node(&config, simulated_sensors(), shutdown_rx).await?;
    } else {
        run_node(&config, SysfsSensorPair::new(&config), shutdown_rx).await?;
    }

    info!("occupancy-sensor shutdown complete");
    Ok(())
}
