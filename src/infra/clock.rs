//! Wall-clock source
//!
//! Monotonic timing goes through `tokio::time` so tests can pause it. The
//! weekday/time-of-day decisions need a calendar clock, which is injected
//! here so the scheduler can be driven from a fixed date in tests.

use chrono::{Local, NaiveDateTime};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub trait WallClock: Send + Sync {
    /// Current local date and time
    fn now(&self) -> NaiveDateTime;
}

/// Local time of the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Calendar clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}
