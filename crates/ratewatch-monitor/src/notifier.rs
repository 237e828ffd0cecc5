//! Threshold alert delivery.

use std::sync::Arc;

use ratewatch_protocols::{ConnectionStatus, MessagingClient, NotifyTarget};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::parser::DEFAULT_LABEL_PREFIX;
use crate::retry::RetryPolicy;
use crate::target::find_group;

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;

/// How a notification sequence ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Sent to the configured target.
    Delivered { attempts: u32 },
    /// The group could not be reached; the alert went to our own chat instead.
    FallbackDelivered,
    /// The group could not be reached and neither could our own chat.
    FallbackFailed,
    /// Every attempt to a personal target failed.
    Exhausted,
    /// Nothing was sent because the channel was not connected.
    Skipped,
}

impl NotifyOutcome {
    /// Whether a send sequence actually ran. Skipped alerts stay eligible.
    pub fn is_completed(&self) -> bool {
        !matches!(self, NotifyOutcome::Skipped)
    }
}

impl std::fmt::Display for NotifyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyOutcome::Delivered { .. } => write!(f, "delivered"),
            NotifyOutcome::FallbackDelivered => write!(f, "fallback delivered"),
            NotifyOutcome::FallbackFailed => write!(f, "fallback failed"),
            NotifyOutcome::Exhausted => write!(f, "exhausted"),
            NotifyOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// Sends threshold alerts.
pub struct Notifier {
    client: Arc<dyn MessagingClient>,
    status: watch::Receiver<ConnectionStatus>,
    policy: RetryPolicy,
    label_prefix: String,
}

impl Notifier {
    pub fn new(client: Arc<dyn MessagingClient>, status: watch::Receiver<ConnectionStatus>) -> Self {
        Self {
            client,
            status,
            policy: RetryPolicy::default(),
            label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.label_prefix = prefix.into();
        self
    }

    pub fn alert_text(&self, rate: f64) -> String {
        format!("Alert: The current rate is {}{:.4}", self.label_prefix, rate)
    }

    /// Deliver one alert for `rate`.
    ///
    /// Retry delays are not cancellable; run this on its own task.
    pub async fn notify(&self, target: &NotifyTarget, rate: f64) -> NotifyOutcome {
        let status = *self.status.borrow();
        if status != ConnectionStatus::Connected {
            warn!(%status, rate, "Messaging not connected, skipping notification");
            return NotifyOutcome::Skipped;
        }

        let text = self.alert_text(rate);
        if let Some(recipient) = self.resolve(target).await {
            if let Some(attempts) = self.send_with_retry(&recipient, &text).await {
                info!(%recipient, attempts, rate, "Notification sent");
                return NotifyOutcome::Delivered { attempts };
            }
        }

        if !target.is_group() {
            error!(%target, rate, "Notification failed after all attempts");
            return NotifyOutcome::Exhausted;
        }
        self.fallback(&text).await
    }

    /// Group targets are matched again against the current group list.
    async fn resolve(&self, target: &NotifyTarget) -> Option<NotifyTarget> {
        let NotifyTarget::Group(id) = target else {
            return Some(target.clone());
        };
        match self.client.list_groups().await {
            Ok(groups) => match find_group(id, &groups) {
                Some(group) => Some(NotifyTarget::Group(group.short_id.clone())),
                None => {
                    warn!(group = %id, "Group no longer joined");
                    None
                }
            },
            Err(e) => {
                warn!(group = %id, error = %e, "Failed to list groups");
                None
            }
        }
    }

    async fn send_with_retry(&self, recipient: &NotifyTarget, text: &str) -> Option<u32> {
        let max_attempts = self.policy.max_attempts;
        for attempt in 1..=max_attempts {
            match self.client.send_message(recipient, text).await {
                Ok(()) => return Some(attempt),
                Err(e) => {
                    warn!(%recipient, attempt, max_attempts, error = %e, "Send failed");
                    if attempt < max_attempts {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
            }
        }
        None
    }

    async fn fallback(&self, text: &str) -> NotifyOutcome {
        let Some(own_id) = self.client.own_id() else {
            error!("Group notification failed and own identity is unknown");
            return NotifyOutcome::FallbackFailed;
        };
        let recipient = NotifyTarget::Personal(own_id);
        warn!(%recipient, "Group notification failed, sending to own chat");
        match self.client.send_message(&recipient, text).await {
            Ok(()) => NotifyOutcome::FallbackDelivered,
            Err(e) => {
                error!(%recipient, error = %e, "Fallback notification failed");
                NotifyOutcome::FallbackFailed
            }
        }
    }
}
