//! Browser session supervision.
//!
//! The supervisor owns at most one live session. Each session carries the
//! helper processes its launcher spawned; releasing a session releases them,
//! and a session dropped without release kills them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ratewatch_protocols::{HelperProcess, LaunchedSession, PageFetcher, SessionLauncher};
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::MonitorError;

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;

/// Helper processes owned by one session.
#[derive(Default)]
pub struct HelperRegistry {
    helpers: Vec<Box<dyn HelperProcess>>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, helper: Box<dyn HelperProcess>) {
        debug!(pid = ?helper.pid(), "Registered helper process");
        self.helpers.push(helper);
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }

    pub fn pids(&self) -> Vec<u32> {
        self.helpers.iter().filter_map(|h| h.pid()).collect()
    }

    /// Terminate every helper, force-killing those that outlive `grace`.
    ///
    /// A helper stays registered until it has been dealt with, so an
    /// interrupted release still leaves the rest to `Drop`.
    pub async fn release(&mut self, grace: Duration) {
        while let Some(helper) = self.helpers.last_mut() {
            let pid = helper.pid();
            if helper.terminate(grace).await {
                debug!(?pid, "Helper process exited");
            } else {
                warn!(?pid, ?grace, "Helper process still running after grace period, killing");
                if let Err(e) = helper.kill() {
                    error!(?pid, error = %e, "Failed to kill helper process");
                }
            }
            self.helpers.pop();
        }
    }
}

impl Drop for HelperRegistry {
    fn drop(&mut self) {
        for helper in &mut self.helpers {
            warn!(pid = ?helper.pid(), "Helper process dropped without release, killing");
            if let Err(e) = helper.kill() {
                error!(pid = ?helper.pid(), error = %e, "Failed to kill helper process");
            }
        }
    }
}

/// One live browser session.
pub struct SessionHandle {
    generation: u64,
    fetcher: Arc<dyn PageFetcher>,
    cancel: CancellationToken,
    terminated: CancellationToken,
    helpers: HelperRegistry,
}

impl SessionHandle {
    fn from_launched(generation: u64, launched: LaunchedSession, cancel: CancellationToken) -> Self {
        let mut helpers = HelperRegistry::new();
        for helper in launched.helpers {
            helpers.register(helper);
        }
        Self {
            generation,
            fetcher: launched.fetcher,
            cancel,
            terminated: launched.terminated,
            helpers,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn helpers(&self) -> &HelperRegistry {
        &self.helpers
    }

    /// Whether the session died on its own.
    pub fn is_terminated(&self) -> bool {
        self.terminated.is_cancelled()
    }

    fn lease(&self) -> SessionLease {
        SessionLease {
            generation: self.generation,
            fetcher: self.fetcher.clone(),
            cancel: self.cancel.clone(),
        }
    }

    async fn release(mut self, grace: Duration) {
        self.cancel.cancel();
        if let Err(e) = self.fetcher.close().await {
            debug!(generation = self.generation, error = %e, "Session close failed");
        }
        self.helpers.release(grace).await;
        info!(generation = self.generation, "Browser session released");
    }
}

/// Borrowed access to the current session.
#[derive(Clone)]
pub struct SessionLease {
    generation: u64,
    fetcher: Arc<dyn PageFetcher>,
    cancel: CancellationToken,
}

impl SessionLease {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fetcher(&self) -> &dyn PageFetcher {
        self.fetcher.as_ref()
    }

    /// Cancelled when the session is superseded or destroyed.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl std::fmt::Debug for SessionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLease")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

type Published = Option<(u64, CancellationToken)>;

/// Creates, replaces and destroys the browser session.
pub struct SessionSupervisor {
    launcher: Arc<dyn SessionLauncher>,
    root: CancellationToken,
    kill_grace: Duration,
    current: Mutex<Option<SessionHandle>>,
    generation: AtomicU64,
    published: watch::Sender<Published>,
}

impl SessionSupervisor {
    /// Session tokens are children of `root`.
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        root: CancellationToken,
        kill_grace: Duration,
    ) -> Self {
        let (published, _) = watch::channel(None);
        Self {
            launcher,
            root,
            kill_grace,
            current: Mutex::new(None),
            generation: AtomicU64::new(0),
            published,
        }
    }

    pub fn root_token(&self) -> &CancellationToken {
        &self.root
    }

    /// Number of sessions created so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Return the current session, creating one if there is none.
    pub async fn acquire(&self) -> Result<SessionLease, MonitorError> {
        let mut current = self.current.lock().await;
        self.acquire_locked(&mut current).await
    }

    async fn acquire_locked(
        &self,
        current: &mut Option<SessionHandle>,
    ) -> Result<SessionLease, MonitorError> {
        if let Some(handle) = current.as_ref() {
            return Ok(handle.lease());
        }
        if self.root.is_cancelled() {
            return Err(MonitorError::Cancelled);
        }

        let launched = self.launcher.launch().await?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = SessionHandle::from_launched(generation, launched, self.root.child_token());
        info!(
            generation,
            helpers = ?handle.helpers.pids(),
            "Browser session created"
        );

        self.published
            .send_replace(Some((generation, handle.terminated.clone())));
        let lease = handle.lease();
        *current = Some(handle);
        Ok(lease)
    }

    /// Replace the current session with a fresh one.
    ///
    /// If another caller already replaced the session after this call was
    /// issued, the replacement is returned as-is.
    pub async fn recreate(&self) -> Result<SessionLease, MonitorError> {
        let seen = self.generation();
        let mut current = self.current.lock().await;

        if self.generation() != seen {
            if let Some(handle) = current.as_ref() {
                debug!(generation = handle.generation, "Session already recreated");
                return Ok(handle.lease());
            }
        }

        if let Some(old) = current.take() {
            info!(generation = old.generation, "Recreating browser session");
            self.published.send_replace(None);
            old.release(self.kill_grace).await;
        }
        self.acquire_locked(&mut current).await
    }

    /// Tear down the current session, if any.
    pub async fn destroy_all(&self) {
        let mut current = self.current.lock().await;
        if let Some(old) = current.take() {
            self.published.send_replace(None);
            old.release(self.kill_grace).await;
        }
    }

    /// Resolves when the current session dies on its own.
    ///
    /// Sessions released through the supervisor never resolve this; with no
    /// session it stays pending until one is created and later dies.
    pub async fn session_terminated(&self) {
        let mut rx = self.published.subscribe();
        loop {
            let published = rx.borrow_and_update().clone();
            match published {
                Some((generation, terminated)) => {
                    tokio::select! {
                        _ = terminated.cancelled() => {
                            let still_current =
                                matches!(&*rx.borrow(), Some((g, _)) if *g == generation);
                            if still_current {
                                warn!(generation, "Browser session terminated unexpectedly");
                                return;
                            }
                        }
                        _ = rx.changed() => {}
                    }
                }
                None => {
                    let _ = rx.changed().await;
                }
            }
        }
    }
}
