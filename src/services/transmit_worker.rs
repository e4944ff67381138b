//! Transmit worker - runs network sends off the measuring loop
//!
//! The scheduler hands each frozen transmission to the worker through a
//! capacity-1 mpsc channel and waits on a oneshot for the outcome. The
//! detector's `SensorPairState` never crosses this boundary; only the
//! immutable `Transmission` does.

use crate::domain::transmission::Transmission;
use crate::infra::error::TransmissionError;
use crate::infra::metrics::Metrics;
use crate::io::transmit::{TransmissionClient, TransmitReceipt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

pub type TransmitOutcome = Result<TransmitReceipt, TransmissionError>;

/// A transmission waiting to be sent
#[derive(Debug)]
pub struct TransmitJob {
    pub transmission: Transmission,
    /// When the job was enqueued (for queue delay measurement)
    pub enqueued_at: Instant,
    pub reply: oneshot::Sender<TransmitOutcome>,
}

/// Producer side, held by the scheduler
#[derive(Debug, Clone)]
pub struct TransmitQueue {
    job_tx: mpsc::Sender<TransmitJob>,
}

impl TransmitQueue {
    /// Enqueue one transmission and wait for its outcome
    pub async fn submit(&self, transmission: Transmission) -> TransmitOutcome {
        let (reply, outcome) = oneshot::channel();
        let job = TransmitJob { transmission, enqueued_at: Instant::now(), reply };

        self.job_tx.send(job).await.map_err(|_| TransmissionError::WorkerUnavailable)?;
        outcome.await.map_err(|_| TransmissionError::WorkerUnavailable)?
    }
}

pub struct TransmitWorker {
    client: TransmissionClient,
    job_rx: mpsc::Receiver<TransmitJob>,
    metrics: Arc<Metrics>,
    idle_timeout: Duration,
}

impl TransmitWorker {
    pub fn new(
        client: TransmissionClient,
        job_rx: mpsc::Receiver<TransmitJob>,
        metrics: Arc<Metrics>,
        idle_timeout: Duration,
    ) -> Self {
        Self { client, job_rx, metrics, idle_timeout }
    }

    /// Run until every queue handle is dropped
    pub async fn run(mut self) {
        info!(
            timeout_ms = %self.client.timeout().as_millis(),
            "transmit_worker_started"
        );

        loop {
            match tokio::time::timeout(self.idle_timeout, self.job_rx.recv()).await {
                Ok(Some(job)) => self.process(job).await,
                Ok(None) => break,
                Err(_) => {
                    debug!(idle_secs = %self.idle_timeout.as_secs(), "transmit_worker_idle");
                }
            }
        }

        info!("transmit_worker_stopped");
    }

    async fn process(&self, job: TransmitJob) {
        let queue_delay_us = job.enqueued_at.elapsed().as_micros() as u64;

        let send_start = Instant::now();
        let outcome = self.client.send(&job.transmission).await;
        let send_us = send_start.elapsed().as_micros() as u64;

        let timed_out = matches!(outcome, Err(TransmissionError::Timeout(_)));
        self.metrics.record_transmission(outcome.is_ok(), timed_out, send_us);

        debug!(
            serial_number = %job.transmission.serial_number,
            queue_delay_us = %queue_delay_us,
            send_us = %send_us,
            ok = %outcome.is_ok(),
            "transmit_job_processed"
        );

        if job.reply.send(outcome).is_err() {
            warn!(serial_number = %job.transmission.serial_number, "transmit_reply_dropped");
        }
    }
}

/// Capacity-1 job channel: at most one transmission in flight
pub fn transmit_channel() -> (TransmitQueue, mpsc::Receiver<TransmitJob>) {
    let (job_tx, job_rx) = mpsc::channel(1);
    (TransmitQueue { job_tx }, job_rx)
}

/// Create the transmit channel and worker
///
/// Returns the queue (for the scheduler) and the worker (to be spawned)
pub fn create_transmit_worker(
    client: TransmissionClient,
    metrics: Arc<Metrics>,
    idle_timeout: Duration,
) -> (TransmitQueue, TransmitWorker) {
    let (queue, job_rx) = transmit_channel();
    let worker = TransmitWorker::new(client, job_rx, metrics, idle_timeout);
    (queue, worker)
}
