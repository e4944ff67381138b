//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `detector` - Beam edge detection and crossing confirmation
//! - `scheduler` - Duty cycle: measure, transmit, sleep
//! - `transmit_worker` - Async transmission worker

pub mod detector;
pub mod scheduler;
pub mod transmit_worker;

// Re-export commonly used types
pub use detector::MotionDetector;
pub use scheduler::{DutyCycleScheduler, SchedulerState};
pub use transmit_worker::{create_transmit_worker, TransmitJob, TransmitQueue, TransmitWorker};
