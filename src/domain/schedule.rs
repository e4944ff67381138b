//! Operating schedule and the pure time arithmetic behind the duty cycle
//!
//! All comparisons use minutes (or seconds) since midnight as one combined
//! value. Comparing hour and minute independently misclassifies times such
//! as 07:45 against an 08:00 wake time.

use crate::infra::error::NodeError;
use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use std::time::Duration;

const SECS_PER_DAY: u32 = 24 * 60 * 60;

/// Wall-clock time of day at minute resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self, NodeError> {
        if hour > 23 || minute > 59 {
            return Err(NodeError::MalformedScheduleConfig(format!(
                "time of day {hour:02}:{minute:02} is out of range"
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn minutes_since_midnight(&self) -> u32 {
        self.hour * 60 + self.minute
    }

    pub fn seconds_since_midnight(&self) -> u32 {
        self.minutes_since_midnight() * 60
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Static duty-cycle configuration of a node
#[derive(Debug, Clone, PartialEq)]
pub struct OperatingSchedule {
    wake: TimeOfDay,
    sleep: TimeOfDay,
    weekdays: Vec<Weekday>,
    transmit_interval: Duration,
    motion_timeout: Duration,
}

impl OperatingSchedule {
    /// Build a schedule, rejecting anything the scheduler cannot run
    pub fn new(
        wake: TimeOfDay,
        sleep: TimeOfDay,
        weekdays: Vec<Weekday>,
        transmit_interval: Duration,
        motion_timeout: Duration,
    ) -> Result<Self, NodeError> {
        if wake >= sleep {
            return Err(NodeError::MalformedScheduleConfig(format!(
                "wake time {wake} must be earlier than sleep time {sleep}"
            )));
        }
        if weekdays.is_empty() {
            return Err(NodeError::MalformedScheduleConfig(
                "at least one operating weekday is required".to_string(),
            ));
        }
        if transmit_interval.is_zero() {
            return Err(NodeError::MalformedScheduleConfig(
                "transmit interval must be positive".to_string(),
            ));
        }
        if motion_timeout.is_zero() {
            return Err(NodeError::MalformedScheduleConfig(
                "motion timeout must be positive".to_string(),
            ));
        }
        if motion_timeout >= transmit_interval {
            return Err(NodeError::MalformedScheduleConfig(format!(
                "motion timeout {}ms must be shorter than the transmit interval {}ms",
                motion_timeout.as_millis(),
                transmit_interval.as_millis()
            )));
        }

        let mut weekdays = weekdays;
        weekdays.sort_by_key(|day| day.num_days_from_monday());
        weekdays.dedup();

        Ok(Self { wake, sleep, weekdays, transmit_interval, motion_timeout })
    }

    pub fn wake(&self) -> TimeOfDay {
        self.wake
    }

    pub fn sleep(&self) -> TimeOfDay {
        self.sleep
    }

    pub fn weekdays(&self) -> &[Weekday] {
        &self.weekdays
    }

    pub fn transmit_interval(&self) -> Duration {
        self.transmit_interval
    }

    pub fn motion_timeout(&self) -> Duration {
        self.motion_timeout
    }

    /// Whether the node should be measuring at `now`
    pub fn is_operating_hours(&self, now: NaiveDateTime) -> bool {
        if !self.weekdays.contains(&now.weekday()) {
            return false;
        }
        let minutes = now.hour() * 60 + now.minute();
        self.wake.minutes_since_midnight() <= minutes
            && minutes <= self.sleep.minutes_since_midnight()
    }

    pub fn remaining_sleep_time(&self, now: NaiveDateTime) -> Duration {
        remaining_sleep_time(now, self.wake)
    }
}

impl Default for OperatingSchedule {
    fn default() -> Self {
        Self {
            wake: TimeOfDay { hour: 8, minute: 0 },
            sleep: TimeOfDay { hour: 19, minute: 0 },
            weekdays: vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Sun],
            transmit_interval: Duration::from_secs(60),
            motion_timeout: Duration::from_secs(1),
        }
    }
}

/// Time until the next occurrence of `wake`
///
/// If the wake time is now or already passed today, the next one is
/// tomorrow's. The result is in `(0, 24h]` and `now + result` always lands
/// on the wake time.
pub fn remaining_sleep_time(now: NaiveDateTime, wake: TimeOfDay) -> Duration {
    let now_secs = now.num_seconds_from_midnight();
    let mut wake_secs = wake.seconds_since_midnight();
    if wake_secs <= now_secs {
        wake_secs += SECS_PER_DAY;
    }
    Duration::from_secs(u64::from(wake_secs - now_secs))
}

/// Parse a short weekday name as used on the wire (`Mon` .. `Sun`)
pub fn parse_weekday(name: &str) -> Result<Weekday, NodeError> {
    name.parse::<Weekday>()
        .map_err(|_| NodeError::MalformedScheduleConfig(format!("unknown weekday '{name}'")))
}
