//! Occupancy collector
//!
//! Receives node transmissions over HTTP and keeps the current occupancy of
//! every configured location in CSV files.

use anyhow::Context;
use clap::Parser;
use occupancy_sensor::collector::{start_collector_server, OccupancyStore};
use occupancy_sensor::infra::Config;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Occupancy collector service
#[derive(Parser, Debug)]
#[command(name = "occupancy-collector", version, about)]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE, then config/node.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the listen port from the config file
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(Config::default_config_path);
    info!(git_hash = %env!("GIT_HASH"), "occupancy-collector starting");

    let mut config = Config::load_from_path(&config_path).context("Invalid configuration")?;
    if let Some(port) = args.port {
        config = config.with_collector_port(port);
    }

    info!(
        config_file = %config.config_file(),
        bind_address = %config.collector_bind_address(),
        port = %config.collector_port(),
        state_file = %config.state_file(),
        log_file = %config.log_file(),
        locations = %config.locations().len(),
        "config_loaded"
    );

    let store = OccupancyStore::bootstrap(config.state_file(), config.log_file(), config.locations())
        .context("Failed to create collector files")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    start_collector_server(&config, Arc::new(store), shutdown_rx).await?;

    info!("occupancy-collector shutdown complete");
    Ok(())
}
