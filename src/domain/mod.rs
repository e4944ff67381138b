//! Domain models - core types of the counting pipeline
//!
//! This module contains the canonical data types used throughout the system:
//! - `types` - sensor readings, crossing events, window and running counts
//! - `schedule` - operating schedule and duty-cycle time arithmetic
//! - `transmission` - the wire payload and its timestamp formatting

pub mod schedule;
pub mod transmission;
pub mod types;

pub use schedule::{OperatingSchedule, TimeOfDay};
pub use transmission::{format_timestamp, Timestamp, Transmission};
pub use types::{
    CountMode, CrossingEvent, Direction, Level, Levels, OccupancyDelta, RunningTotals,
    SensorPairState,
};
