//! Lock-free node counters and periodic reporting
//!
//! Counters are plain atomics with Relaxed ordering: they are statistics
//! only and never feed back into control flow.

use crate::domain::types::Direction;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

#[derive(Debug)]
pub struct Metrics {
    started_at: Instant,
    /// Confirmed entrances (monotonic)
    entrances_total: AtomicU64,
    /// Confirmed exits (monotonic)
    exits_total: AtomicU64,
    /// Rising edges that expired without confirmation (monotonic)
    candidates_expired: AtomicU64,
    /// Measurement windows completed (monotonic)
    windows_total: AtomicU64,
    transmissions_ok: AtomicU64,
    transmissions_failed: AtomicU64,
    transmissions_timed_out: AtomicU64,
    /// Sum of send latencies since last report
    send_latency_sum_us: AtomicU64,
    /// Sends since last report
    sends_since_report: AtomicU64,
    /// Max send latency since last report
    send_latency_max_us: AtomicU64,
    /// Total seconds spent in deep sleep (monotonic)
    sleep_secs_total: AtomicU64,
}

/// Point-in-time view of the node counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSummary {
    pub uptime_secs: u64,
    pub entrances_total: u64,
    pub exits_total: u64,
    pub candidates_expired: u64,
    pub windows_total: u64,
    pub transmissions_ok: u64,
    pub transmissions_failed: u64,
    pub transmissions_timed_out: u64,
    pub avg_send_latency_us: u64,
    pub max_send_latency_us: u64,
    pub sleep_secs_total: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            uptime_secs = %self.uptime_secs,
            entrances = %self.entrances_total,
            exits = %self.exits_total,
            expired = %self.candidates_expired,
            windows = %self.windows_total,
            tx_ok = %self.transmissions_ok,
            tx_failed = %self.transmissions_failed,
            tx_timeout = %self.transmissions_timed_out,
            send_avg_us = %self.avg_send_latency_us,
            send_max_us = %self.max_send_latency_us,
            slept_secs = %self.sleep_secs_total,
            "node_metrics"
        );
    }
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            entrances_total: AtomicU64::new(0),
            exits_total: AtomicU64::new(0),
            candidates_expired: AtomicU64::new(0),
            windows_total: AtomicU64::new(0),
            transmissions_ok: AtomicU64::new(0),
            transmissions_failed: AtomicU64::new(0),
            transmissions_timed_out: AtomicU64::new(0),
            send_latency_sum_us: AtomicU64::new(0),
            sends_since_report: AtomicU64::new(0),
            send_latency_max_us: AtomicU64::new(0),
            sleep_secs_total: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_crossing(&self, direction: Direction) {
        match direction {
            Direction::Entrance => self.entrances_total.fetch_add(1, Ordering::Relaxed),
            Direction::Exit => self.exits_total.fetch_add(1, Ordering::Relaxed),
        };
    }

    #[inline]
    pub fn record_candidate_expired(&self) {
        self.candidates_expired.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_window(&self) {
        self.windows_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one send attempt
    pub fn record_transmission(&self, ok: bool, timed_out: bool, latency_us: u64) {
        if ok {
            self.transmissions_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.transmissions_failed.fetch_add(1, Ordering::Relaxed);
            if timed_out {
                self.transmissions_timed_out.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.send_latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.sends_since_report.fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.send_latency_max_us, latency_us);
    }

    #[inline]
    pub fn record_sleep(&self, secs: u64) {
        self.sleep_secs_total.fetch_add(secs, Ordering::Relaxed);
    }

    pub fn windows_total(&self) -> u64 {
        self.windows_total.load(Ordering::Relaxed)
    }

    /// Snapshot counters; latency aggregates reset on every report
    pub fn report(&self) -> MetricsSummary {
        let sends = self.sends_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.send_latency_sum_us.swap(0, Ordering::Relaxed);
        let latency_max = self.send_latency_max_us.swap(0, Ordering::Relaxed);

        MetricsSummary {
            uptime_secs: self.started_at.elapsed().as_secs(),
            entrances_total: self.entrances_total.load(Ordering::Relaxed),
            exits_total: self.exits_total.load(Ordering::Relaxed),
            candidates_expired: self.candidates_expired.load(Ordering::Relaxed),
            windows_total: self.windows_total.load(Ordering::Relaxed),
            transmissions_ok: self.transmissions_ok.load(Ordering::Relaxed),
            transmissions_failed: self.transmissions_failed.load(Ordering::Relaxed),
            transmissions_timed_out: self.transmissions_timed_out.load(Ordering::Relaxed),
            avg_send_latency_us: if sends > 0 { latency_sum / sends } else { 0 },
            max_send_latency_us: latency_max,
            sleep_secs_total: self.sleep_secs_total.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
