//! Messaging connection recovery.
//!
//! One task owns the connection status. It consumes the client's connection
//! events, reconnects while disconnected and re-authenticates after a
//! logout; everyone else reads the status through a watch channel.

use std::sync::Arc;
use std::time::Duration;

use ratewatch_protocols::{ConnectionEvent, ConnectionStatus, MessagingClient, MessagingError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "reconnect_tests.rs"]
mod tests;

/// Next status after `event`. A logged-out client only leaves that state
/// through a successful re-authentication, never through an event.
pub fn transition(status: ConnectionStatus, event: ConnectionEvent) -> ConnectionStatus {
    match (status, event) {
        (ConnectionStatus::LoggedOut, _) => ConnectionStatus::LoggedOut,
        (_, ConnectionEvent::LoggedOut) => ConnectionStatus::LoggedOut,
        (_, ConnectionEvent::Disconnected) => ConnectionStatus::Disconnected,
        (_, ConnectionEvent::Connected) => ConnectionStatus::Connected,
    }
}

/// Handle to the background recovery task.
pub struct ReconnectionManager {
    status: watch::Receiver<ConnectionStatus>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ReconnectionManager {
    /// Start the recovery task with the status observed at startup.
    pub fn spawn(
        client: Arc<dyn MessagingClient>,
        initial: ConnectionStatus,
        retry_delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, status) = watch::channel(initial);
        let events = client.subscribe();
        let task = tokio::spawn(
            Recovery {
                client,
                events,
                events_open: true,
                status: tx,
                retry_delay,
                cancel: cancel.clone(),
            }
            .run(),
        );
        Self {
            status,
            cancel,
            task,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Stop the task and wait for it to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Reconnection task ended abnormally");
        }
    }
}

struct Recovery {
    client: Arc<dyn MessagingClient>,
    events: broadcast::Receiver<ConnectionEvent>,
    events_open: bool,
    status: watch::Sender<ConnectionStatus>,
    retry_delay: Duration,
    cancel: CancellationToken,
}

impl Recovery {
    async fn run(mut self) {
        info!(client = self.client.name(), status = %self.current(), "Reconnection manager started");
        while !self.cancel.is_cancelled() {
            match self.current() {
                ConnectionStatus::Connected => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        event = next_event(&mut self.events, &mut self.events_open) => {
                            self.apply(event);
                        }
                    }
                }
                ConnectionStatus::Disconnected => {
                    let attempt = tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        result = self.client.connect() => result,
                    };
                    match attempt {
                        Ok(()) => self.set(ConnectionStatus::Connected),
                        Err(MessagingError::LoggedOut(reason)) => {
                            warn!(reason, "Session logged out while reconnecting");
                            self.set(ConnectionStatus::LoggedOut);
                        }
                        Err(e) => {
                            warn!(error = %e, "Reconnect failed, retrying in {:?}", self.retry_delay);
                            self.wait_retry().await;
                        }
                    }
                }
                ConnectionStatus::LoggedOut => {
                    let attempt = tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        result = self.client.reauthenticate() => result,
                    };
                    match attempt {
                        Ok(()) => {
                            info!("Re-authenticated");
                            self.set(ConnectionStatus::Connected);
                        }
                        Err(e) => {
                            warn!(
                                error = %e,
                                "Re-authentication failed, retrying in {:?}",
                                self.retry_delay
                            );
                            self.wait_retry().await;
                        }
                    }
                }
            }
        }
        debug!("Reconnection manager stopped");
    }

    fn current(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    fn set(&self, next: ConnectionStatus) {
        let previous = self.status.send_replace(next);
        if previous != next {
            info!(from = %previous, to = %next, "Connection status changed");
        }
    }

    fn apply(&self, event: Option<ConnectionEvent>) {
        if let Some(event) = event {
            debug!(?event, "Connection event");
            self.set(transition(self.current(), event));
        }
    }

    /// Sleep for the retry delay, applying any events that arrive meanwhile.
    async fn wait_retry(&mut self) {
        let sleep = tokio::time::sleep(self.retry_delay);
        tokio::pin!(sleep);
        let waiting_in = self.current();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = &mut sleep => return,
                event = next_event(&mut self.events, &mut self.events_open) => {
                    self.apply(event);
                    if self.current() != waiting_in {
                        return;
                    }
                }
            }
        }
    }
}

/// Next event; pending forever once the client's channel is gone.
async fn next_event(
    events: &mut broadcast::Receiver<ConnectionEvent>,
    open: &mut bool,
) -> Option<ConnectionEvent> {
    if !*open {
        std::future::pending::<()>().await;
    }
    loop {
        match events.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "Connection events lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Connection event channel closed");
                *open = false;
                return None;
            }
        }
    }
}
