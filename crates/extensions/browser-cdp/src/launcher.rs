//! Chrome launcher.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ratewatch_protocols::{FetchError, HelperProcess, LaunchedSession, SessionLauncher};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cdp::{CdpClient, CdpError};
use crate::fetcher::CdpPageFetcher;
use crate::process::ChromeProcess;

const PORT_FILE: &str = "DevToolsActivePort";
const PORT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Browser launch configuration.
#[derive(Debug, Clone)]
pub struct ChromeLaunchConfig {
    /// Executable to run. Auto-detected when `None`.
    pub chrome_path: Option<PathBuf>,
    /// Run with `--headless=new`.
    pub headless: bool,
    /// Where per-session profile directories are created.
    pub profile_root: Option<PathBuf>,
    /// How long to wait for the DevTools endpoint to appear.
    pub launch_timeout: Duration,
    /// Grace period given to a browser that failed during launch.
    pub kill_grace: Duration,
    /// Timeout for individual CDP commands.
    pub command_timeout: Duration,
    /// Extra command line flags, appended last.
    pub extra_args: Vec<String>,
}

impl Default for ChromeLaunchConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            profile_root: None,
            launch_timeout: Duration::from_secs(15),
            kill_grace: Duration::from_secs(2),
            command_timeout: Duration::from_secs(30),
            extra_args: Vec::new(),
        }
    }
}

/// Contents of the `DevToolsActivePort` file Chrome writes into its profile
/// directory when started with `--remote-debugging-port=0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevToolsActivePort {
    pub port: u16,
    pub browser_path: String,
}

impl DevToolsActivePort {
    /// Parse the two-line file: port, then browser WebSocket path.
    ///
    /// Returns `None` while the file is incomplete.
    pub fn parse(contents: &str) -> Option<Self> {
        let mut lines = contents.lines();
        let port = lines.next()?.trim().parse().ok()?;
        let browser_path = lines.next()?.trim();
        if !browser_path.starts_with('/') {
            return None;
        }
        Some(Self {
            port,
            browser_path: browser_path.to_string(),
        })
    }

    /// HTTP endpoint for discovery requests.
    pub fn http_endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

/// Launches a private headless Chrome per session.
pub struct ChromeLauncher {
    config: ChromeLaunchConfig,
}

impl ChromeLauncher {
    pub fn new(config: ChromeLaunchConfig) -> Self {
        Self { config }
    }

    /// Find a Chrome/Chromium executable in the usual install locations.
    pub fn find_chrome() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        let paths: &[&str] = &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        ];

        #[cfg(target_os = "linux")]
        let paths: &[&str] = &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ];

        #[cfg(target_os = "windows")]
        let paths: &[&str] = &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ];

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        let paths: &[&str] = &[];

        paths.iter().map(PathBuf::from).find(|p| p.exists())
    }

    /// Command line flags for a browser using `profile_dir`.
    pub fn chrome_args(&self, profile_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "--remote-debugging-port=0".to_string(),
            format!("--user-data-dir={}", profile_dir.display()),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-background-networking".to_string(),
            "--disable-sync".to_string(),
            "--disable-translate".to_string(),
            "--metrics-recording-only".to_string(),
        ];
        if self.config.headless {
            args.push("--headless=new".to_string());
        }
        args.extend(self.config.extra_args.iter().cloned());
        args.push("about:blank".to_string());
        args
    }

    fn executable(&self) -> Result<PathBuf, FetchError> {
        self.config
            .chrome_path
            .clone()
            .or_else(Self::find_chrome)
            .ok_or_else(|| FetchError::LaunchFailed("Chrome/Chromium not found".to_string()))
    }

    fn profile_dir(&self) -> Result<tempfile::TempDir, FetchError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ratewatch-chrome-");
        let dir = match &self.config.profile_root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|e| {
                    FetchError::LaunchFailed(format!("profile root {}: {}", root.display(), e))
                })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        };
        dir.map_err(|e| FetchError::LaunchFailed(format!("profile directory: {}", e)))
    }

    /// Wait for Chrome to publish its DevTools port.
    async fn wait_for_port(
        &self,
        process: &mut ChromeProcess,
        profile_dir: &Path,
    ) -> Result<DevToolsActivePort, FetchError> {
        let port_file = profile_dir.join(PORT_FILE);
        let deadline = Instant::now() + self.config.launch_timeout;

        loop {
            if let Ok(contents) = tokio::fs::read_to_string(&port_file).await {
                if let Some(active) = DevToolsActivePort::parse(&contents) {
                    return Ok(active);
                }
            }

            if process.has_exited() {
                return Err(FetchError::LaunchFailed(
                    "browser exited before opening its DevTools port".to_string(),
                ));
            }

            if Instant::now() >= deadline {
                return Err(FetchError::LaunchFailed(format!(
                    "no DevTools port after {:?}",
                    self.config.launch_timeout
                )));
            }

            tokio::time::sleep(PORT_POLL_INTERVAL).await;
        }
    }

    async fn attach(&self, active: &DevToolsActivePort) -> Result<CdpPageFetcher, CdpError> {
        let client = CdpClient::connect(&active.http_endpoint(), self.config.command_timeout).await?;
        let page = client.new_page().await?;
        Ok(CdpPageFetcher::new(client, page))
    }

    async fn abandon(&self, mut process: ChromeProcess) {
        if !process.terminate(self.config.kill_grace).await {
            if let Err(e) = process.kill() {
                warn!("{}", e);
            }
        }
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<LaunchedSession, FetchError> {
        let chrome_path = self.executable()?;
        let profile = self.profile_dir()?;
        let profile_path = profile.path().to_path_buf();

        let mut cmd = Command::new(&chrome_path);
        cmd.args(self.chrome_args(&profile_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .map_err(|e| FetchError::LaunchFailed(format!("{}: {}", chrome_path.display(), e)))?;
        let mut process = ChromeProcess::new(child, Some(profile));
        info!(
            "Chrome launched with PID {:?}, profile at {}",
            process.pid(),
            profile_path.display()
        );

        let active = match self.wait_for_port(&mut process, &profile_path).await {
            Ok(active) => active,
            Err(e) => {
                self.abandon(process).await;
                return Err(e);
            }
        };
        debug!("DevTools listening on port {}", active.port);

        match self.attach(&active).await {
            Ok(fetcher) => {
                let terminated = fetcher.closed_token();
                Ok(LaunchedSession::new(Arc::new(fetcher))
                    .with_helper(Box::new(process))
                    .with_terminated(terminated))
            }
            Err(e) => {
                self.abandon(process).await;
                Err(e.into())
            }
        }
    }
}
