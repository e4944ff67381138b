//! Shared types for the sensor node

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// A single beam reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    On,
    #[default]
    Off,
}

impl Level {
    pub fn is_on(self) -> bool {
        self == Level::On
    }
}

/// Both beams read at the same instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Levels {
    pub left: Level,
    pub right: Level,
}

impl Levels {
    pub const IDLE: Levels = Levels { left: Level::Off, right: Level::Off };

    pub fn new(left: Level, right: Level) -> Self {
        Self { left, right }
    }
}

/// Live state of the sensor pair, advanced once per sampling tick
///
/// `previous` holds the readings that closed the previous tick. A rising edge
/// is always judged against it, never against a reading taken mid-tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorPairState {
    pub current: Levels,
    pub previous: Levels,
}

impl SensorPairState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift the current readings into `previous` and store the new ones.
    /// Callers read both beams before calling this.
    pub fn advance(&mut self, levels: Levels) {
        self.previous = self.current;
        self.current = levels;
    }

    /// Replace the tick's closing readings without shifting
    pub fn close_tick(&mut self, levels: Levels) {
        self.current = levels;
    }

    pub fn right_rising(&self) -> bool {
        self.current.right.is_on() && !self.previous.right.is_on()
    }

    pub fn left_rising(&self) -> bool {
        self.current.left.is_on() && !self.previous.left.is_on()
    }
}

/// Direction of a crossing through the portal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Right beam first, then left
    Entrance,
    /// Left beam first, then right
    Exit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Entrance => "entrance",
            Direction::Exit => "exit",
        }
    }

    /// Whether this tick's snapshot opens a candidate in this direction
    pub fn is_candidate(self, state: &SensorPairState) -> bool {
        match self {
            Direction::Entrance => state.right_rising(),
            Direction::Exit => state.left_rising(),
        }
    }

    /// Whether a follow-up reading completes the crossing
    pub fn confirmed_by(self, levels: Levels) -> bool {
        match self {
            Direction::Entrance => levels.left.is_on() && !levels.right.is_on(),
            Direction::Exit => !levels.left.is_on() && levels.right.is_on(),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A confirmed crossing, consumed immediately by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossingEvent {
    pub direction: Direction,
    /// When the confirming reading was taken
    pub at: Instant,
}

/// Counts accumulated during one measurement window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OccupancyDelta {
    pub entrances: u32,
    pub exits: u32,
}

impl OccupancyDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: &CrossingEvent) {
        match event.direction {
            Direction::Entrance => self.entrances = self.entrances.saturating_add(1),
            Direction::Exit => self.exits = self.exits.saturating_add(1),
        }
    }
}

/// Counts since the last reset, carried across windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunningTotals {
    entrances: u64,
    exits: u64,
}

impl RunningTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, delta: &OccupancyDelta) {
        self.entrances = self.entrances.saturating_add(u64::from(delta.entrances));
        self.exits = self.exits.saturating_add(u64::from(delta.exits));
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn entrances(&self) -> u64 {
        self.entrances
    }

    pub fn exits(&self) -> u64 {
        self.exits
    }
}

/// Which counters a transmission carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMode {
    /// Totals since the start of the operating day
    #[default]
    Cumulative,
    /// Only the window that just closed
    PerWindow,
}

impl CountMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountMode::Cumulative => "cumulative",
            CountMode::PerWindow => "per_window",
        }
    }

    /// Counters to put on the wire for this window
    pub fn counts(self, delta: &OccupancyDelta, totals: &RunningTotals) -> (u64, u64) {
        match self {
            CountMode::Cumulative => (totals.entrances(), totals.exits()),
            CountMode::PerWindow => (u64::from(delta.entrances), u64::from(delta.exits)),
        }
    }
}
