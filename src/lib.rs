//! Occupancy sensor library
//!
//! Exposes the node and collector modules for integration testing and
//! binary reuse.

pub mod collector;
pub mod domain;
pub mod infra;
pub mod io;
pub mod services;
