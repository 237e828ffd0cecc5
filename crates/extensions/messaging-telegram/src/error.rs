//! Bot API error types.

use ratewatch_protocols::MessagingError;
use thiserror::Error;

/// Failure of a single Bot API call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The token was rejected (HTTP 401).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The API answered with `ok: false`.
    #[error("Telegram API error {code}: {description}")]
    Rejected { code: i64, description: String },

    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// `ok: true` without a usable result.
    #[error("Invalid response from {0}")]
    InvalidResponse(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// Map a failure while establishing the connection.
    pub fn into_connection_error(self) -> MessagingError {
        match self {
            ApiError::Unauthorized(msg) => MessagingError::LoggedOut(msg),
            other => MessagingError::ConnectionFailed(other.to_string()),
        }
    }

    /// Map a failure while sending.
    pub fn into_send_error(self) -> MessagingError {
        match self {
            ApiError::Unauthorized(msg) => MessagingError::LoggedOut(msg),
            other => MessagingError::SendFailed(other.to_string()),
        }
    }

    /// Map a failure while listing groups.
    pub fn into_lookup_error(self) -> MessagingError {
        match self {
            ApiError::Unauthorized(msg) => MessagingError::LoggedOut(msg),
            other => MessagingError::GroupLookup(other.to_string()),
        }
    }
}
