//! Transmission client - delivers one report to the collector
//!
//! Protocol: a single unauthenticated HTTP/1.1 `POST /` whose JSON body is
//! the ordered transmission mapping. Any 2xx is success. Everything else,
//! including a timeout anywhere in connect/write/response, is a failed attempt
//! that is never retried here: the next window re-sends fresh counts.
//!
//! The connection is opened per attempt and closed on every exit path
//! (`Connection: close`, no idle pooling), so a node running unattended for
//! months never accumulates sockets.

use crate::domain::transmission::Transmission;
use crate::infra::config::Config;
use crate::infra::error::{NodeError, TransmissionError};
use crate::io::indicator::IndicatorSink;
use anyhow::Context;
use reqwest::header::{CONNECTION, CONTENT_TYPE};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Log transmission failure (cold path)
#[cold]
fn log_send_failed(serial_number: u32, latency_us: u64, err: &TransmissionError) {
    error!(
        serial_number = %serial_number,
        latency_us = %latency_us,
        kind = %err.kind(),
        error = %err,
        "transmission_failed"
    );
}

/// Successful delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitReceipt {
    pub status: u16,
    pub latency_us: u64,
}

pub struct TransmissionClient {
    url: String,
    timeout: Duration,
    http: reqwest::Client,
    indicators: Arc<dyn IndicatorSink>,
}

impl TransmissionClient {
    pub fn new(config: &Config, indicators: Arc<dyn IndicatorSink>) -> Result<Self, NodeError> {
        let timeout = config.transmit_timeout();

        // Built once; no idle connections survive an attempt
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_max_idle_per_host(0)
            .http1_only()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { url: format!("http://{}/", config.collector_addr()), timeout, http, indicators })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send one transmission and show the outcome on the indicators.
    /// Exactly one of success/failure is signalled per call.
    pub async fn send(
        &self,
        transmission: &Transmission,
    ) -> Result<TransmitReceipt, TransmissionError> {
        let start = Instant::now();
        let result = self.post(transmission).await;
        let latency_us = start.elapsed().as_micros() as u64;

        match result {
            Ok(status) => {
                self.indicators.transmit_outcome(true);
                info!(
                    serial_number = %transmission.serial_number,
                    location = %transmission.location,
                    entrances = %transmission.entrances,
                    exits = %transmission.exits,
                    date = %transmission.date,
                    time = %transmission.time,
                    status = %status,
                    latency_us = %latency_us,
                    "transmission_sent"
                );
                Ok(TransmitReceipt { status, latency_us })
            }
            Err(e) => {
                self.indicators.transmit_outcome(false);
                log_send_failed(transmission.serial_number, latency_us, &e);
                Err(e)
            }
        }
    }

    /// One request/response exchange, bounded end to end by the timeout
    async fn post(&self, transmission: &Transmission) -> Result<u16, TransmissionError> {
        let request = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(CONNECTION, "close")
            .body(transmission.to_json());

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            // Drain so the connection closes cleanly rather than being reset
            let _ = response.bytes().await;
            Ok::<_, reqwest::Error>(status)
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Err(_) => Err(TransmissionError::Timeout(self.timeout)),
            Ok(Err(e)) if e.is_timeout() => Err(TransmissionError::Timeout(self.timeout)),
            Ok(Err(e)) => Err(TransmissionError::Connection(e.to_string())),
            Ok(Ok(status)) if status.is_success() => Ok(status.as_u16()),
            Ok(Ok(status)) => Err(TransmissionError::Rejected(status.as_u16())),
        }
    }
}
