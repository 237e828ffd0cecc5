//! Restart and interrupt requests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::MonitorError;

/// Control request delivered to the monitoring loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Stop the current run and return to configuration (`s` on the console).
    Restart,
    /// Shut down (SIGINT, SIGTERM).
    Interrupt,
}

impl std::fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlSignal::Restart => write!(f, "RESTART"),
            ControlSignal::Interrupt => write!(f, "INTERRUPT"),
        }
    }
}

/// Fan-out of control requests to whoever is listening.
#[derive(Clone)]
pub struct ControlSignals {
    sender: broadcast::Sender<ControlSignal>,
    interrupted: Arc<AtomicBool>,
}

impl ControlSignals {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            sender,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlSignal> {
        self.sender.subscribe()
    }

    pub fn send(&self, signal: ControlSignal) {
        debug!("Sending control signal: {}", signal);
        if signal == ControlSignal::Interrupt {
            self.interrupted.store(true, Ordering::SeqCst);
        }
        let _ = self.sender.send(signal);
    }

    pub fn request_restart(&self) {
        self.send(ControlSignal::Restart);
    }

    pub fn request_interrupt(&self) {
        self.send(ControlSignal::Interrupt);
    }

    /// Whether an interrupt has been requested at any point.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Forward SIGINT and SIGTERM as [`ControlSignal::Interrupt`].
    #[cfg(unix)]
    pub fn install_os_handlers(&self) -> Result<(), MonitorError> {
        use tokio::signal::unix::{SignalKind, signal};

        for (kind, name) in [
            (SignalKind::interrupt(), "SIGINT"),
            (SignalKind::terminate(), "SIGTERM"),
        ] {
            let mut stream = signal(kind).map_err(|e| MonitorError::SignalSetup(e.to_string()))?;
            let handler = self.clone();
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    info!("Received {}", name);
                    handler.request_interrupt();
                }
            });
        }

        info!("OS signal handlers installed (SIGINT, SIGTERM)");
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn install_os_handlers(&self) -> Result<(), MonitorError> {
        let handler = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C");
                handler.request_interrupt();
            }
        });

        info!("OS signal handlers installed (Ctrl+C only)");
        Ok(())
    }
}

impl Default for ControlSignals {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_display() {
        assert_eq!(ControlSignal::Restart.to_string(), "RESTART");
        assert_eq!(ControlSignal::Interrupt.to_string(), "INTERRUPT");
    }

    #[tokio::test]
    async fn test_broadcast_to_subscribers() {
        let signals = ControlSignals::new();
        let mut a = signals.subscribe();
        let mut b = signals.subscribe();

        signals.request_restart();
        assert_eq!(a.recv().await.unwrap(), ControlSignal::Restart);
        assert_eq!(b.recv().await.unwrap(), ControlSignal::Restart);
        assert!(!signals.is_interrupted());
    }

    #[tokio::test]
    async fn test_interrupt_is_sticky() {
        let signals = ControlSignals::new();
        // No subscribers: the flag still records the request.
        signals.request_interrupt();
        assert!(signals.is_interrupted());

        let clone = signals.clone();
        assert!(clone.is_interrupted());
    }
}
