//! Page fetching protocol definitions.
//!
//! A page session is produced by a [`SessionLauncher`] and consists of a
//! [`PageFetcher`] plus every OS process the launcher had to spawn for it.
//! The caller owns those processes from then on and is responsible for
//! releasing them when the session is superseded.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

#[cfg(test)]
#[path = "fetcher_tests.rs"]
mod tests;

/// One live page automation session.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Navigate the page to `url` and wait for the document to load.
    async fn navigate(&self, url: &str) -> Result<(), FetchError>;

    /// Wait until `selector` matches a visible element.
    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<(), FetchError>;

    /// Read the rendered text of the first element matching `selector`.
    async fn read_text(&self, selector: &str) -> Result<String, FetchError>;

    /// Close the session cooperatively. Default is a no-op.
    async fn close(&self) -> Result<(), FetchError> {
        Ok(())
    }
}

/// An OS-level process owned by a page session.
#[async_trait]
pub trait HelperProcess: Send {
    /// Process ID, if the process is still known to the OS.
    fn pid(&self) -> Option<u32>;

    /// Ask the process to exit and wait up to `grace` for it.
    ///
    /// Returns `true` once the process has exited.
    async fn terminate(&mut self, grace: Duration) -> bool;

    /// Force-kill the process. Must not block; called from `Drop` paths.
    fn kill(&mut self) -> Result<(), FetchError>;
}

/// Result of launching a session.
pub struct LaunchedSession {
    /// The page automation handle.
    pub fetcher: Arc<dyn PageFetcher>,
    /// Processes spawned for this session.
    pub helpers: Vec<Box<dyn HelperProcess>>,
    /// Cancelled by the implementation when the session dies on its own
    /// (browser exit, lost debugger connection).
    pub terminated: CancellationToken,
}

impl LaunchedSession {
    /// Create a session with no helper processes.
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            helpers: Vec::new(),
            terminated: CancellationToken::new(),
        }
    }

    /// Attach a helper process.
    pub fn with_helper(mut self, helper: Box<dyn HelperProcess>) -> Self {
        self.helpers.push(helper);
        self
    }

    /// Use an externally owned termination token.
    pub fn with_terminated(mut self, terminated: CancellationToken) -> Self {
        self.terminated = terminated;
        self
    }
}

/// Creates fresh page sessions.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Launch a new session. Any process spawned before a failure must be
    /// released by the launcher itself.
    async fn launch(&self) -> Result<LaunchedSession, FetchError>;
}
