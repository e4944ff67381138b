//! Motion edge detector - turns beam readings into crossing events
//!
//! Each sampling tick reads both beams once and advances `SensorPairState`.
//! A rising edge on the right beam opens an entrance candidate, one on the
//! left opens an exit candidate. A candidate is confirmed if, within
//! `motion_timeout`, a re-read shows only the opposite beam broken:
//!
//! ```text
//! entrance: R rises  ->  (L=On,  R=Off) within timeout
//! exit:     L rises  ->  (L=Off, R=On)  within timeout
//! ```
//!
//! Both candidates of a tick are evaluated against the same snapshot. On
//! every confirming re-read the entrance is checked before the exit; the
//! first confirmation consumes the tick and drops the other candidate.
//! The confirming reading becomes the tick's closing reading, so it turns
//! into `previous` on the next tick and cannot open a second candidate.
//! An expired candidate closes the tick with the last polled reading, so
//! the next tick's edges are judged against what the beams showed last.

use crate::domain::types::{CrossingEvent, Direction, Levels, SensorPairState};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::sensors::SensorPair;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

pub struct MotionDetector<S: SensorPair> {
    sensors: S,
    state: SensorPairState,
    motion_timeout: Duration,
    poll_interval: Duration,
    metrics: Arc<Metrics>,
}

impl<S: SensorPair> MotionDetector<S> {
    pub fn new(sensors: S, config: &Config, metrics: Arc<Metrics>) -> Self {
        Self::with_timing(
            sensors,
            config.schedule().motion_timeout(),
            config.poll_interval(),
            metrics,
        )
    }

    pub fn with_timing(
        sensors: S,
        motion_timeout: Duration,
        poll_interval: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            sensors,
            state: SensorPairState::new(),
            motion_timeout,
            // A zero period would panic in tokio::time::interval
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            metrics,
        }
    }

    pub fn state(&self) -> &SensorPairState {
        &self.state
    }

    /// Read both beams once and shift the snapshot
    pub fn sample_tick(&mut self) {
        let levels = self.sensors.read();
        self.state.advance(levels);
    }

    /// Entrance check only, against the current tick
    pub async fn detect_entrance(&mut self) -> Option<CrossingEvent> {
        self.confirm(&[Direction::Entrance]).await
    }

    /// Exit check only, against the current tick
    pub async fn detect_exit(&mut self) -> Option<CrossingEvent> {
        self.confirm(&[Direction::Exit]).await
    }

    /// Both checks jointly against the current tick; at most one event
    pub async fn detect(&mut self) -> Option<CrossingEvent> {
        self.confirm(&[Direction::Entrance, Direction::Exit]).await
    }

    /// Wait for any open candidate among `directions` to be confirmed.
    /// `directions` is in priority order.
    async fn confirm(&mut self, directions: &[Direction]) -> Option<CrossingEvent> {
        let state = self.state;
        let open: Vec<Direction> =
            directions.iter().copied().filter(|d| d.is_candidate(&state)).collect();
        if open.is_empty() {
            return None;
        }
        debug!(candidates = ?open, "crossing_candidate_opened");

        let started = Instant::now();
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = state.current;

        loop {
            poll.tick().await;
            if started.elapsed() > self.motion_timeout {
                break;
            }

            let levels = self.sensors.read();
            last = levels;
            if let Some(direction) = first_confirmed(&open, levels) {
                self.state.close_tick(levels);
                debug!(
                    direction = %direction,
                    confirm_ms = %started.elapsed().as_millis(),
                    "crossing_confirmed"
                );
                return Some(CrossingEvent { direction, at: Instant::now() });
            }
        }

        self.state.close_tick(last);
        self.metrics.record_candidate_expired();
        debug!(
            candidates = ?open,
            timeout_ms = %self.motion_timeout.as_millis(),
            "crossing_candidate_expired"
        );
        None
    }
}

fn first_confirmed(open: &[Direction], levels: Levels) -> Option<Direction> {
    open.iter().copied().find(|d| d.confirmed_by(levels))
}
