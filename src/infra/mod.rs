//! Infrastructure - configuration, errors, clocks and metrics
//!
//! This module contains infrastructure concerns:
//! - `config` - Application configuration (TOML loading, defaults)
//! - `error` - Error taxonomy (transmission and node errors)
//! - `clock` - Wall-clock abstraction for schedule decisions
//! - `metrics` - Lock-free node counters

pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;

// Re-export commonly used types
pub use clock::{ManualClock, SystemClock, WallClock};
pub use config::Config;
pub use error::{NodeError, TransmissionError};
pub use metrics::Metrics;
