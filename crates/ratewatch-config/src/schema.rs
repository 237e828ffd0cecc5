//! Configuration schema definitions.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub messaging: MessagingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The sampled page and the sampling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Page that renders the rate label.
    #[serde(default = "default_url")]
    pub url: String,

    /// CSS selector of the rate label.
    #[serde(default = "default_selector")]
    pub selector: String,

    /// Exact text preceding the number in the label.
    #[serde(default = "default_label_prefix")]
    pub label_prefix: String,

    /// Sampling period in seconds.
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,

    /// Fetch attempts per sample before the session is recreated.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between fetch attempts in seconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// How long to wait for the label to become visible, in seconds.
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,
}

fn default_url() -> String {
    "https://www.cimbclicks.com.sg/sgd-to-myr".to_string()
}

fn default_selector() -> String {
    "#rateStr".to_string()
}

fn default_label_prefix() -> String {
    "SGD 1.00 = MYR ".to_string()
}

fn default_sample_interval() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5
}

fn default_wait_timeout() -> u64 {
    30
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            selector: default_selector(),
            label_prefix: default_label_prefix(),
            sample_interval_secs: default_sample_interval(),
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay(),
            wait_timeout_secs: default_wait_timeout(),
        }
    }
}

impl MonitorConfig {
    /// Get the sampling period as a Duration.
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    /// Get the retry delay as a Duration.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Get the visibility wait timeout as a Duration.
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

/// Headless browser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Chrome/Chromium executable. Auto-detected when unset.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Run without a visible window.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Directory under which per-session profiles are created.
    /// The system temp directory is used when unset.
    #[serde(default)]
    pub profile_root: Option<PathBuf>,

    /// Seconds to wait for the DevTools endpoint after launch.
    #[serde(default = "default_launch_timeout")]
    pub launch_timeout_secs: u64,

    /// Milliseconds a released browser gets to exit before it is killed.
    #[serde(default = "default_kill_grace")]
    pub kill_grace_ms: u64,

    /// Additional command line flags.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_headless() -> bool {
    true
}

fn default_launch_timeout() -> u64 {
    15
}

fn default_kill_grace() -> u64 {
    2000
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: default_headless(),
            profile_root: None,
            launch_timeout_secs: default_launch_timeout(),
            kill_grace_ms: default_kill_grace(),
            extra_args: Vec::new(),
        }
    }
}

impl BrowserConfig {
    /// Get the launch timeout as a Duration.
    pub fn launch_timeout(&self) -> Duration {
        Duration::from_secs(self.launch_timeout_secs)
    }

    /// Get the kill grace period as a Duration.
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

/// Messaging channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Bot API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// File holding the bot credentials.
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,

    /// Chat that receives fallback notifications.
    #[serde(default)]
    pub owner_chat_id: Option<String>,

    /// Send attempts per notification.
    #[serde(default = "default_send_attempts")]
    pub send_attempts: u32,

    /// Delay between send attempts in seconds.
    #[serde(default = "default_send_retry_delay")]
    pub send_retry_delay_secs: u64,

    /// Delay between reconnect attempts in seconds.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    /// Interval of the connectivity probe in seconds.
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_credentials_file() -> PathBuf {
    ratewatch_dir().join("telegram.toml")
}

fn default_send_attempts() -> u32 {
    3
}

fn default_send_retry_delay() -> u64 {
    5
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_health_check_interval() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            credentials_file: default_credentials_file(),
            owner_chat_id: None,
            send_attempts: default_send_attempts(),
            send_retry_delay_secs: default_send_retry_delay(),
            reconnect_delay_secs: default_reconnect_delay(),
            health_check_interval_secs: default_health_check_interval(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl MessagingConfig {
    /// Get the send retry delay as a Duration.
    pub fn send_retry_delay(&self) -> Duration {
        Duration::from_secs(self.send_retry_delay_secs)
    }

    /// Get the reconnect delay as a Duration.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    /// Get the connectivity probe interval as a Duration.
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    /// Get the request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset.
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for rotated log files.
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// Number of daily log files to keep.
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    ratewatch_dir().join("logs")
}

fn default_max_log_files() -> usize {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            dir: default_log_dir(),
            max_log_files: default_max_log_files(),
        }
    }
}

/// The `~/.ratewatch` directory.
pub fn ratewatch_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".ratewatch"))
        .unwrap_or_else(|| PathBuf::from(".ratewatch"))
}
