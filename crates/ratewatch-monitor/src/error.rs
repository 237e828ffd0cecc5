//! Error types for the monitoring core.

use ratewatch_protocols::{FetchError, MessagingError};
use thiserror::Error;

/// A rate label that could not be turned into a number.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The label does not begin with the expected prefix.
    #[error("Label {label:?} does not start with {prefix:?}")]
    MissingPrefix { label: String, prefix: String },

    /// Nothing follows the prefix.
    #[error("No rate after prefix in {0:?}")]
    Empty(String),

    /// The remainder is not a decimal number.
    #[error("Invalid rate {value:?}: {reason}")]
    InvalidNumber { value: String, reason: String },

    /// The remainder parsed to NaN or infinity.
    #[error("Rate {0:?} is not finite")]
    NotFinite(String),
}

/// Errors raised by the monitoring core.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A page fetch step failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The fetched label did not parse.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Every sampling attempt failed; the session should be recreated.
    #[error("Sampling failed after {attempts} attempts: {source}")]
    SessionExhausted {
        attempts: u32,
        source: Box<MonitorError>,
    },

    /// The operation was abandoned because its token was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// Thresholds violate `min < max`.
    #[error("Invalid thresholds: minimum {min} must be below maximum {max}")]
    InvalidThresholds { min: f64, max: f64 },

    /// Messaging channel error.
    #[error(transparent)]
    Messaging(#[from] MessagingError),

    /// Failed to install OS signal handlers.
    #[error("Failed to set up signal handlers: {0}")]
    SignalSetup(String),
}

impl MonitorError {
    /// Whether this is the exhaustion error that escalates to a session recreate.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, MonitorError::SessionExhausted { .. })
    }
}
