//! Messaging client errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Client not connected")]
    NotConnected,

    #[error("Logged out: {0}")]
    LoggedOut(String),

    #[error("Credential store error: {0}")]
    CredentialStore(String),

    #[error("Group lookup failed: {0}")]
    GroupLookup(String),

    #[error("Own identity unknown")]
    NoOwnIdentity,
}
