//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `sensors` - Dual-beam sensor input (sysfs GPIO, scripted timelines)
//! - `indicator` - Status light outputs
//! - `link` - Network link bring-up towards the collector
//! - `transmit` - HTTP client delivering reports to the collector

pub mod indicator;
pub mod link;
pub mod sensors;
pub mod transmit;

// Re-export commonly used types
pub use indicator::{Indicator, IndicatorPanel, IndicatorSink};
pub use link::{NetworkLink, TcpProbeLink};
pub use sensors::{ScriptedSensors, SensorPair, SysfsSensorPair};
pub use transmit::{TransmissionClient, TransmitReceipt};
