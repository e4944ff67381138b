//! Error taxonomy for the node and its transmission path

use std::time::Duration;
use thiserror::Error;

/// Failure of a single transmission attempt. Never fatal: the next window
/// simply tries again with fresh counts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransmissionError {
    #[error("transmission timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("connection to collector failed: {0}")]
    Connection(String),

    #[error("collector rejected transmission with status {0}")]
    Rejected(u16),

    #[error("transmit worker is not running")]
    WorkerUnavailable,
}

impl TransmissionError {
    pub fn kind(&self) -> &'static str {
        match self {
            TransmissionError::Timeout(_) => "timeout",
            TransmissionError::Connection(_) => "connection",
            TransmissionError::Rejected(_) => "rejected",
            TransmissionError::WorkerUnavailable => "worker_unavailable",
        }
    }
}

/// Node-level errors
#[derive(Error, Debug)]
pub enum NodeError {
    /// Invalid wake/sleep configuration; halts start-up
    #[error("malformed schedule config: {0}")]
    MalformedScheduleConfig(String),

    /// A setting the node cannot run with; halts start-up
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("network link not up after {}s", .0.as_secs())]
    LinkTimeout(Duration),

    #[error(transparent)]
    Config(#[from] anyhow::Error),
}

/// Collector-side failure to record a transmission
#[derive(Error, Debug)]
pub enum StoreError {
    /// The reporting location is not in the current-state table; nothing is
    /// changed
    #[error("unknown location {0:?}")]
    UnknownLocation(String),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TransmissionError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "transmission timed out after 5000ms");
        assert_eq!(err.kind(), "timeout");
        assert_eq!(TransmissionError::Rejected(503).kind(), "rejected");

        let err = NodeError::MalformedScheduleConfig("wake after sleep".to_string());
        assert_eq!(err.to_string(), "malformed schedule config: wake after sleep");
    }
}
