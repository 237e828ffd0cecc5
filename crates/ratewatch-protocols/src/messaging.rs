//! Messaging protocol definitions.
//!
//! A [`MessagingClient`] is a connection-oriented chat service client. It
//! reports connectivity changes as typed [`ConnectionEvent`]s on a broadcast
//! channel instead of invoking callbacks, so a single consumer task can own
//! the resulting [`ConnectionStatus`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::MessagingError;

#[cfg(test)]
#[path = "messaging_tests.rs"]
mod tests;

/// Connectivity change reported by a messaging client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    LoggedOut,
}

/// Current connectivity of the messaging channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    LoggedOut,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::LoggedOut => write!(f, "logged_out"),
        }
    }
}

/// A group the client has joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    /// Full identifier as used by the service.
    pub id: String,
    /// Identifier without any service suffix; equal to `id` when the service has none.
    pub short_id: String,
    /// Display name.
    pub name: String,
    /// Owner identifier, when the service exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

impl GroupInfo {
    /// Create a group whose short id equals its full id.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            short_id: id.clone(),
            id,
            name: name.into(),
            owner_id: None,
        }
    }

    /// Set the short identifier.
    pub fn with_short_id(mut self, short_id: impl Into<String>) -> Self {
        self.short_id = short_id.into();
        self
    }

    /// Set the owner identifier.
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }
}

/// Where notifications are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NotifyTarget {
    /// A single user, addressed by the service's personal identifier.
    Personal(String),
    /// A joined group, addressed by its resolved short identifier.
    Group(String),
}

impl NotifyTarget {
    /// The raw identifier.
    pub fn id(&self) -> &str {
        match self {
            NotifyTarget::Personal(id) | NotifyTarget::Group(id) => id,
        }
    }

    /// Whether this target is a group.
    pub fn is_group(&self) -> bool {
        matches!(self, NotifyTarget::Group(_))
    }
}

impl std::fmt::Display for NotifyTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyTarget::Personal(id) => write!(f, "{} (Personal)", id),
            NotifyTarget::Group(id) => write!(f, "{} (Group)", id),
        }
    }
}

/// Core trait for the chat service client.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Client name for logging (e.g. "telegram").
    fn name(&self) -> &str;

    /// Establish (or re-establish) the connection.
    async fn connect(&self) -> Result<(), MessagingError>;

    /// Send a text message.
    async fn send_message(&self, recipient: &NotifyTarget, text: &str)
        -> Result<(), MessagingError>;

    /// List the groups the client has joined.
    async fn list_groups(&self) -> Result<Vec<GroupInfo>, MessagingError>;

    /// The identity the client is logged in as, used for fallback sends.
    fn own_id(&self) -> Option<String>;

    /// Run a fresh authentication after the session was logged out.
    async fn reauthenticate(&self) -> Result<(), MessagingError>;

    /// Subscribe to connectivity events.
    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent>;

    /// Stop any background work. Default is a no-op.
    async fn disconnect(&self) {}
}
