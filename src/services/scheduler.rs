//! Duty-cycle scheduler - the node's top-level state machine
//!
//! ```text
//!              in hours                  window closed
//!   start ──► AwakeMeasuring ──────────► Transmitting
//!     │            ▲                        │    │
//!     │ off hours  │ in hours (next window) │    │ off hours
//!     ▼            │                        │    ▼
//!   Sleeping ──────┴──── woke up ◄──────────┴─ Sleeping
//! ```
//!
//! Measuring owns the detector for the whole window; the frozen delta is
//! folded into the running totals and handed to the transmit worker. The
//! scheduler always proceeds to the next state regardless of send outcome.

use crate::domain::schedule::OperatingSchedule;
use crate::domain::transmission::{format_timestamp, Transmission};
use crate::domain::types::{CountMode, OccupancyDelta, RunningTotals};
use crate::infra::clock::WallClock;
use crate::infra::config::Config;
use crate::infra::error::TransmissionError;
use crate::infra::metrics::Metrics;
use crate::io::indicator::{Indicator, IndicatorSink};
use crate::io::link::NetworkLink;
use crate::io::sensors::SensorPair;
use crate::services::detector::MotionDetector;
use crate::services::transmit_worker::TransmitQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    AwakeMeasuring,
    /// Carries the delta of the window that just closed
    Transmitting(OccupancyDelta),
    Sleeping,
}

pub struct DutyCycleScheduler<S: SensorPair> {
    detector: MotionDetector<S>,
    clock: Arc<dyn WallClock>,
    link: Arc<dyn NetworkLink>,
    queue: TransmitQueue,
    indicators: Arc<dyn IndicatorSink>,
    metrics: Arc<Metrics>,
    schedule: OperatingSchedule,
    serial_number: u32,
    location: String,
    count_mode: CountMode,
    sample_interval: Duration,
    report_every_windows: u64,
    totals: RunningTotals,
    link_up: bool,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<S: SensorPair> DutyCycleScheduler<S> {
    pub fn new(
        config: &Config,
        detector: MotionDetector<S>,
        clock: Arc<dyn WallClock>,
        link: Arc<dyn NetworkLink>,
        queue: TransmitQueue,
        indicators: Arc<dyn IndicatorSink>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            detector,
            clock,
            link,
            queue,
            indicators,
            metrics,
            schedule: config.schedule().clone(),
            serial_number: config.serial_number(),
            location: config.location().to_string(),
            count_mode: config.count_mode(),
            sample_interval: config.sample_interval().max(Duration::from_millis(1)),
            report_every_windows: config.report_every_windows(),
            totals: RunningTotals::new(),
            link_up: false,
            shutdown: None,
        }
    }

    pub fn totals(&self) -> &RunningTotals {
        &self.totals
    }

    /// State to enter now, judged from the wall clock
    pub fn initial_state(&self) -> SchedulerState {
        if self.schedule.is_operating_hours(self.clock.now()) {
            SchedulerState::AwakeMeasuring
        } else {
            SchedulerState::Sleeping
        }
    }

    /// Run until the shutdown channel flips to `true`
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) {
        self.shutdown = Some(shutdown);

        let mut state = self.initial_state();
        info!(
            state = ?state,
            serial_number = %self.serial_number,
            location = %self.location,
            count_mode = %self.count_mode.as_str(),
            "scheduler_started"
        );

        while !self.shutdown_requested() {
            state = self.step(state).await;
        }

        self.link.disconnect().await;
        info!(
            entrances = %self.totals.entrances(),
            exits = %self.totals.exits(),
            "scheduler_stopped"
        );
    }

    /// One state transition
    pub async fn step(&mut self, state: SchedulerState) -> SchedulerState {
        let next = match state {
            SchedulerState::AwakeMeasuring => {
                if !self.link_up {
                    self.bring_link_up().await;
                }
                SchedulerState::Transmitting(self.measure_window().await)
            }
            SchedulerState::Transmitting(delta) => self.transmit(delta).await,
            SchedulerState::Sleeping => self.sleep_until_wake().await,
        };
        debug!(from = ?state, to = ?next, "scheduler_transition");
        next
    }

    /// Sample and detect for one transmit interval; returns the frozen delta
    pub async fn measure_window(&mut self) -> OccupancyDelta {
        let window = self.schedule.transmit_interval();
        let mut delta = OccupancyDelta::new();
        let started = Instant::now();

        let mut tick = tokio::time::interval(self.sample_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(window_secs = %window.as_secs(), "window_opened");
        while started.elapsed() < window {
            tick.tick().await;
            if self.shutdown_requested() {
                break;
            }

            self.detector.sample_tick();
            if let Some(event) = self.detector.detect().await {
                delta.record(&event);
                self.metrics.record_crossing(event.direction);
                self.indicators.pulse(Indicator::MotionDetected);
                info!(
                    direction = %event.direction,
                    entrances = %delta.entrances,
                    exits = %delta.exits,
                    "crossing_detected"
                );
            }
        }

        self.metrics.record_window();
        info!(entrances = %delta.entrances, exits = %delta.exits, "window_closed");
        delta
    }

    /// Report one closed window, then re-check operating hours
    pub async fn transmit(&mut self, delta: OccupancyDelta) -> SchedulerState {
        self.totals.absorb(&delta);
        let (entrances, exits) = self.count_mode.counts(&delta, &self.totals);
        let stamp = format_timestamp(self.clock.now());
        let transmission =
            Transmission::new(self.serial_number, &self.location, stamp, entrances, exits);

        // Per-attempt failures are already logged and shown by the client
        if let Err(TransmissionError::WorkerUnavailable) = self.queue.submit(transmission).await {
            self.indicators.transmit_outcome(false);
            error!("transmit_worker_unavailable");
        }

        if self.report_every_windows > 0
            && self.metrics.windows_total() % self.report_every_windows == 0
        {
            self.metrics.report().log();
        }

        self.initial_state()
    }

    /// Take the link down and sleep until the next wake time.
    /// Waking starts a new operating day.
    pub async fn sleep_until_wake(&mut self) -> SchedulerState {
        self.link.disconnect().await;
        self.link_up = false;

        let remaining = self.schedule.remaining_sleep_time(self.clock.now());
        info!(
            sleep_secs = %remaining.as_secs(),
            wake = %self.schedule.wake(),
            "sleep_started"
        );
        self.metrics.record_sleep(remaining.as_secs());

        if self.sleep_or_shutdown(remaining).await {
            return SchedulerState::Sleeping;
        }

        self.totals.reset();
        let next = self.initial_state();
        info!(next = ?next, "sleep_finished");
        next
    }

    async fn bring_link_up(&mut self) {
        match self.link.connect().await {
            Ok(()) => self.link_up = true,
            // The window still runs; the transmit will fail and the next
            // window retries the link
            Err(e) => warn!(error = %e, "link_unavailable"),
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Sleep for `duration`; returns `true` if shutdown arrived first
    async fn sleep_or_shutdown(&mut self, duration: Duration) -> bool {
        let Some(rx) = self.shutdown.as_mut() else {
            tokio::time::sleep(duration).await;
            return false;
        };
        if *rx.borrow() {
            return true;
        }

        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return false,
                changed = rx.changed() => {
                    if changed.is_err() || *rx.borrow() {
                        return true;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::clock::ManualClock;
    use crate::infra::error::NodeError;
    use crate::io::indicator::IndicatorPanel;
    use crate::io::sensors::ScriptedSensors;
    use crate::io::transmit::TransmitReceipt;
    use crate::services::transmit_worker::transmit_channel;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap().and_hms_opt(hour, minute, 0).unwrap()
    }

    /// Calendar time that follows the (paused) tokio clock
    struct TokioClock {
        base: NaiveDateTime,
        started: Instant,
    }

    impl TokioClock {
        fn new(base: NaiveDateTime) -> Self {
            Self { base, started: Instant::now() }
        }
    }

    impl WallClock for TokioClock {
        fn now(&self) -> NaiveDateTime {
            self.base + chrono::Duration::from_std(self.started.elapsed()).unwrap()
        }
    }

    #[derive(Default)]
    struct FakeLink {
        connects: AtomicU32,
        disconnects: AtomicU32,
    }

    #[async_trait]
    impl NetworkLink for FakeLink {
        async fn connect(&self) -> Result<(), NodeError> {
            self.connects.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn disconnect(&self) {
            self.disconnects.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Accepts every job and keeps what it was sent
    fn fake_collector() -> (TransmitQueue, Arc<Mutex<Vec<Transmission>>>) {
        let (queue, mut job_rx) = transmit_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = sent.clone();
        tokio::spawn(async move {
            while let Some(job) = job_rx.recv().await {
                sink.lock().push(job.transmission);
                let _ = job.reply.send(Ok(TransmitReceipt { status: 200, latency_us: 0 }));
            }
        });
        (queue, sent)
    }

    struct Harness {
        scheduler: DutyCycleScheduler<ScriptedSensors>,
        sent: Arc<Mutex<Vec<Transmission>>>,
        link: Arc<FakeLink>,
        panel: Arc<IndicatorPanel>,
    }

    fn harness(
        config: Config,
        clock: Arc<dyn WallClock>,
        steps: Vec<(Duration, crate::domain::types::Levels)>,
    ) -> Harness {
        let metrics = Arc::new(Metrics::new());
        let panel = Arc::new(IndicatorPanel::new());
        let link = Arc::new(FakeLink::default());
        let (queue, sent) = fake_collector();
        let detector = MotionDetector::new(ScriptedSensors::new(steps), &config, metrics.clone());
        let scheduler = DutyCycleScheduler::new(
            &config,
            detector,
            clock,
            link.clone(),
            queue,
            panel.clone(),
            metrics,
        );
        Harness { scheduler, sent, link, panel }
    }

    /// Three entrances and one exit spread over the first window
    fn busy_window() -> Vec<(Duration, crate::domain::types::Levels)> {
        let mut steps = Vec::new();
        steps.extend(ScriptedSensors::crossing(ms(1000), true, ms(100)));
        steps.extend(ScriptedSensors::crossing(ms(5000), true, ms(100)));
        steps.extend(ScriptedSensors::crossing(ms(9000), true, ms(100)));
        steps.extend(ScriptedSensors::crossing(ms(13000), false, ms(100)));
        steps
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_counts_and_transmits() {
        let clock = Arc::new(ManualClock::new(at(19, 10, 15)));
        let mut h = harness(Config::default(), clock, busy_window());

        assert_eq!(h.scheduler.initial_state(), SchedulerState::AwakeMeasuring);
        let started = Instant::now();
        let state = h.scheduler.step(SchedulerState::AwakeMeasuring).await;
        assert!(started.elapsed() >= Duration::from_secs(60));
        assert_eq!(
            state,
            SchedulerState::Transmitting(OccupancyDelta { entrances: 3, exits: 1 })
        );
        assert_eq!(h.link.connects.load(Ordering::Relaxed), 1);
        assert_eq!(h.panel.pulses(Indicator::MotionDetected), 4);

        let state = h.scheduler.step(state).await;
        assert_eq!(state, SchedulerState::AwakeMeasuring);

        let sent = h.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].entrances, 3);
        assert_eq!(sent[0].exits, 1);
        assert_eq!(sent[0].weekday, "Mon");
        assert_eq!(sent[0].date, "19/10/2026");
        assert_eq!(sent[0].time, "10:15");
        assert_eq!(sent[0].location, Config::default().location());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cumulative_counts_carry_across_windows() {
        let clock = Arc::new(ManualClock::new(at(19, 10, 0)));
        let mut steps = ScriptedSensors::crossing(ms(1000), true, ms(100));
        steps.extend(ScriptedSensors::crossing(ms(70_000), true, ms(100)));
        steps.extend(ScriptedSensors::crossing(ms(75_000), false, ms(100)));
        let mut h = harness(Config::default(), clock, steps);

        let mut state = SchedulerState::AwakeMeasuring;
        for _ in 0..4 {
            state = h.scheduler.step(state).await;
        }

        let sent = h.sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!((sent[0].entrances, sent[0].exits), (1, 0));
        assert_eq!((sent[1].entrances, sent[1].exits), (2, 1));
        // The link is brought up once per operating day
        assert_eq!(h.link.connects.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_window_counts() {
        let clock = Arc::new(ManualClock::new(at(19, 10, 0)));
        let mut steps = ScriptedSensors::crossing(ms(1000), true, ms(100));
        steps.extend(ScriptedSensors::crossing(ms(70_000), false, ms(100)));
        let config = Config::default().with_count_mode(CountMode::PerWindow);
        let mut h = harness(config, clock, steps);

        let mut state = SchedulerState::AwakeMeasuring;
        for _ in 0..4 {
            state = h.scheduler.step(state).await;
        }

        let sent = h.sent.lock();
        assert_eq!((sent[0].entrances, sent[0].exits), (1, 0));
        assert_eq!((sent[1].entrances, sent[1].exits), (0, 1));
        assert_eq!(h.scheduler.totals().entrances(), 1);
        assert_eq!(h.scheduler.totals().exits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evening_goes_to_sleep_until_morning() {
        let clock = Arc::new(TokioClock::new(at(19, 19, 30)));
        let mut h = harness(Config::default(), clock.clone(), Vec::new());

        assert_eq!(h.scheduler.initial_state(), SchedulerState::Sleeping);

        let started = Instant::now();
        let state = h.scheduler.step(SchedulerState::Sleeping).await;

        assert_eq!(started.elapsed(), Duration::from_secs(12 * 3600 + 30 * 60));
        assert_eq!(clock.now(), at(20, 8, 0));
        assert_eq!(state, SchedulerState::AwakeMeasuring);
        assert_eq!(h.link.disconnects.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transmission_after_hours_leads_to_sleep() {
        let clock = Arc::new(ManualClock::new(at(19, 19, 1)));
        let mut h = harness(Config::default(), clock, Vec::new());

        let state = h.scheduler.step(SchedulerState::Transmitting(OccupancyDelta::new())).await;
        assert_eq!(state, SchedulerState::Sleeping);
        assert_eq!(h.sent.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_weekend_is_slept_through() {
        // Friday evening: wake Saturday, go back to sleep, wake Sunday
        let clock = Arc::new(TokioClock::new(at(16, 19, 30)));
        let mut h = harness(Config::default(), clock.clone(), Vec::new());

        let state = h.scheduler.step(SchedulerState::Sleeping).await;
        assert_eq!(state, SchedulerState::Sleeping);
        assert_eq!(clock.now(), at(17, 8, 0));

        let state = h.scheduler.step(state).await;
        assert_eq!(state, SchedulerState::AwakeMeasuring);
        assert_eq!(clock.now(), at(18, 8, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_totals_reset_on_wake() {
        let clock = Arc::new(TokioClock::new(at(19, 18, 59)));
        let steps = ScriptedSensors::crossing(ms(1000), true, ms(100));
        let mut h = harness(Config::default(), clock, steps);

        let state = h.scheduler.step(SchedulerState::AwakeMeasuring).await;
        let state = h.scheduler.step(state).await;
        assert_eq!(h.scheduler.totals().entrances(), 1);
        // 19:00:00 is still inside the operating window
        assert_eq!(state, SchedulerState::AwakeMeasuring);

        let state = h.scheduler.step(state).await;
        let state = h.scheduler.step(state).await;
        assert_eq!(state, SchedulerState::Sleeping);

        h.scheduler.step(state).await;
        assert_eq!(h.scheduler.totals().entrances(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_sleep() {
        let clock = Arc::new(ManualClock::new(at(19, 22, 0)));
        let h = harness(Config::default(), clock, Vec::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(h.scheduler.run(shutdown_rx));
        tokio::time::sleep(Duration::from_secs(3600)).await;
        shutdown_tx.send(true).unwrap();

        handle.await.unwrap();
        assert!(h.link.disconnects.load(Ordering::Relaxed) >= 2);
        assert!(h.sent.lock().is_empty());
    }
}
