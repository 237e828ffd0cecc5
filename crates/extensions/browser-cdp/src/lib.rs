//! Headless Chrome page fetching for ratewatch.
//!
//! Launches a private Chrome/Chromium instance per session and drives it
//! over the Chrome DevTools Protocol.
//!
//! ```text
//! ┌─────────────────┐    WebSocket     ┌──────────────────┐
//! │  ratewatch      │ ◄──────────────► │ headless Chrome  │
//! │  (this crate)   │       CDP        │ (own profile)    │
//! └─────────────────┘                  └──────────────────┘
//! ```
//!
//! Chrome is started with `--remote-debugging-port=0`; the port it picks is
//! read back from the `DevToolsActivePort` file in the session's profile
//! directory. The process runs in its own process group so that releasing a
//! session also takes down its renderer and GPU helpers.

pub mod cdp;
mod fetcher;
mod launcher;
mod process;

pub use fetcher::CdpPageFetcher;
pub use launcher::{ChromeLaunchConfig, ChromeLauncher, DevToolsActivePort};
pub use process::ChromeProcess;
