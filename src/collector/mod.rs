//! Collector - receives node transmissions and keeps per-location occupancy
//!
//! - `store` - CSV-backed current state and transmission log
//! - `server` - HTTP endpoint nodes post to

pub mod server;
pub mod store;

pub use server::{serve, start_collector_server};
pub use store::{LocationSnapshot, OccupancyStore};
