//! Indicator outputs (status lights)
//!
//! Output-only side effects: nothing in the control flow ever reads them
//! back. The node passes an `Arc<dyn IndicatorSink>` to every component that
//! signals, instead of reaching for a global LED handle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    /// Blinking while the link is being brought up
    NetworkConnecting,
    /// Solid while the link is up
    NetworkConnected,
    TransmitSuccess,
    TransmitFailure,
    /// Pulsed once per crossing
    MotionDetected,
}

impl Indicator {
    pub const ALL: [Indicator; 5] = [
        Indicator::NetworkConnecting,
        Indicator::NetworkConnected,
        Indicator::TransmitSuccess,
        Indicator::TransmitFailure,
        Indicator::MotionDetected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Indicator::NetworkConnecting => "network_connecting",
            Indicator::NetworkConnected => "network_connected",
            Indicator::TransmitSuccess => "transmit_success",
            Indicator::TransmitFailure => "transmit_failure",
            Indicator::MotionDetected => "motion_detected",
        }
    }

    fn index(self) -> usize {
        match self {
            Indicator::NetworkConnecting => 0,
            Indicator::NetworkConnected => 1,
            Indicator::TransmitSuccess => 2,
            Indicator::TransmitFailure => 3,
            Indicator::MotionDetected => 4,
        }
    }
}

pub trait IndicatorSink: Send + Sync {
    /// Switch an indicator on or off
    fn set(&self, indicator: Indicator, on: bool);

    /// Short non-blocking flash
    fn pulse(&self, indicator: Indicator);

    /// Show the outcome of one transmission attempt: exactly one of the two
    /// transmit indicators ends up on
    fn transmit_outcome(&self, success: bool) {
        self.set(Indicator::TransmitSuccess, success);
        self.set(Indicator::TransmitFailure, !success);
    }
}

/// In-memory indicator state, logged on every transition
#[derive(Debug, Default)]
pub struct IndicatorPanel {
    states: [AtomicBool; 5],
    pulses: [AtomicU64; 5],
}

impl IndicatorPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self, indicator: Indicator) -> bool {
        self.states[indicator.index()].load(Ordering::Relaxed)
    }

    pub fn pulses(&self, indicator: Indicator) -> u64 {
        self.pulses[indicator.index()].load(Ordering::Relaxed)
    }
}

impl IndicatorSink for IndicatorPanel {
    fn set(&self, indicator: Indicator, on: bool) {
        let was_on = self.states[indicator.index()].swap(on, Ordering::Relaxed);
        if was_on != on {
            info!(indicator = %indicator.as_str(), on = %on, "indicator_changed");
        }
    }

    fn pulse(&self, indicator: Indicator) {
        self.pulses[indicator.index()].fetch_add(1, Ordering::Relaxed);
        debug!(indicator = %indicator.as_str(), "indicator_pulse");
    }
}
