//! Network link bring-up before a measuring day
//!
//! On the node the link is owned by the OS; what the node can do is wait
//! until the collector is reachable, and show that on the status lights.
//! `TcpProbeLink` blinks `NetworkConnecting` while probing the collector
//! address and goes solid `NetworkConnected` once a probe succeeds.

use crate::infra::config::Config;
use crate::infra::error::NodeError;
use crate::io::indicator::{Indicator, IndicatorSink};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Delay between probes; also the blink half-period
const PROBE_INTERVAL: Duration = Duration::from_millis(250);

#[async_trait]
pub trait NetworkLink: Send + Sync {
    /// Bring the link up, bounded by the configured timeout
    async fn connect(&self) -> Result<(), NodeError>;

    /// Mark the link down before sleeping
    async fn disconnect(&self);
}

pub struct TcpProbeLink {
    addr: String,
    timeout: Duration,
    indicators: Arc<dyn IndicatorSink>,
}

impl TcpProbeLink {
    pub fn new(config: &Config, indicators: Arc<dyn IndicatorSink>) -> Self {
        Self {
            addr: config.collector_addr().to_string(),
            timeout: config.lan_timeout(),
            indicators,
        }
    }
}

#[async_trait]
impl NetworkLink for TcpProbeLink {
    async fn connect(&self) -> Result<(), NodeError> {
        info!(addr = %self.addr, timeout_secs = %self.timeout.as_secs(), "link_connecting");
        let started = Instant::now();
        let mut blink = true;

        loop {
            self.indicators.set(Indicator::NetworkConnecting, blink);
            blink = !blink;

            let remaining = self.timeout.saturating_sub(started.elapsed());
            let attempt = remaining.min(PROBE_INTERVAL);
            match tokio::time::timeout(attempt, TcpStream::connect(&self.addr)).await {
                Ok(Ok(stream)) => {
                    drop(stream);
                    self.indicators.set(Indicator::NetworkConnecting, false);
                    self.indicators.set(Indicator::NetworkConnected, true);
                    info!(
                        addr = %self.addr,
                        elapsed_ms = %started.elapsed().as_millis(),
                        "link_connected"
                    );
                    return Ok(());
                }
                Ok(Err(e)) => {
                    debug!(addr = %self.addr, error = %e, "link_probe_failed");
                    // Refused connections return at once; keep the probe cadence
                    let remaining = self.timeout.saturating_sub(started.elapsed());
                    tokio::time::sleep(PROBE_INTERVAL.min(remaining)).await;
                }
                Err(_) => {
                    debug!(addr = %self.addr, "link_probe_timeout");
                }
            }

            if started.elapsed() >= self.timeout {
                self.indicators.set(Indicator::NetworkConnecting, false);
                self.indicators.set(Indicator::NetworkConnected, false);
                warn!(addr = %self.addr, timeout_secs = %self.timeout.as_secs(), "link_timeout");
                return Err(NodeError::LinkTimeout(self.timeout));
            }
        }
    }

    async fn disconnect(&self) {
        self.indicators.set(Indicator::NetworkConnecting, false);
        self.indicators.set(Indicator::NetworkConnected, false);
        info!(addr = %self.addr, "link_disconnected");
    }
}
