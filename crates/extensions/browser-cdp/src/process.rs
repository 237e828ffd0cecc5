//! Browser process ownership.
//!
//! Chrome forks renderer, GPU and utility processes. It is spawned as the
//! leader of its own process group so the whole tree can be signalled at
//! once when the session is released.

use std::time::Duration;

use async_trait::async_trait;
use ratewatch_protocols::{FetchError, HelperProcess};
use tempfile::TempDir;
use tokio::process::Child;
use tracing::{debug, warn};

/// A launched browser plus the throwaway profile directory it runs in.
///
/// Dropping it without a successful [`HelperProcess::kill`] kills the whole
/// process group; the profile directory is removed afterwards.
pub struct ChromeProcess {
    child: Child,
    pid: Option<u32>,
    released: bool,
    _profile: Option<TempDir>,
}

impl ChromeProcess {
    pub(crate) fn new(child: Child, profile: Option<TempDir>) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            released: false,
            _profile: profile,
        }
    }

    /// Whether the browser has already exited. Reaps it if so.
    pub(crate) fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    fn release_error(&self, reason: impl ToString) -> FetchError {
        FetchError::Release {
            pid: self.pid.unwrap_or_default(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl HelperProcess for ChromeProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    async fn terminate(&mut self, grace: Duration) -> bool {
        if self.has_exited() {
            return true;
        }

        #[cfg(unix)]
        if let Some(pid) = self.pid {
            if let Err(e) = signal_group(pid, nix::sys::signal::Signal::SIGTERM) {
                warn!("Failed to send SIGTERM to browser group {}: {}", pid, e);
                return false;
            }
        }

        #[cfg(not(unix))]
        if let Err(e) = self.child.start_kill() {
            warn!("Failed to stop browser {:?}: {}", self.pid, e);
            return false;
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Browser {:?} exited: {}", self.pid, status);
                true
            }
            Ok(Err(e)) => {
                warn!("Failed waiting for browser {:?}: {}", self.pid, e);
                false
            }
            Err(_) => false,
        }
    }

    fn kill(&mut self) -> Result<(), FetchError> {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            // Children may outlive the leader, so the group is signalled even
            // when the leader is already gone.
            match signal_group(pid, nix::sys::signal::Signal::SIGKILL) {
                Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
                Err(e) => return Err(self.release_error(e)),
            }
        }

        if !self.has_exited() {
            match self.child.start_kill() {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {}
                Err(e) => return Err(self.release_error(e)),
            }
        }
        self.released = true;
        Ok(())
    }
}

impl Drop for ChromeProcess {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        // kill_on_drop only reaches the leader; renderers share its group.
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            match signal_group(pid, nix::sys::signal::Signal::SIGKILL) {
                Ok(()) => debug!("Killed browser group {} on drop", pid),
                Err(nix::errno::Errno::ESRCH) => {}
                Err(e) => warn!("Failed to kill browser group {} on drop: {}", pid, e),
            }
        }
    }
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) -> Result<(), nix::errno::Errno> {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    killpg(Pid::from_raw(pid as i32), signal)
}
