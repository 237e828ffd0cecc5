//! # ratewatch Protocols
//!
//! Interface definitions for the two unreliable collaborators the monitor
//! supervises. Contains only traits and plain data types - no implementations.
//!
//! ## Core Traits
//!
//! - [`PageFetcher`] - One live page automation session
//! - [`SessionLauncher`] - Creates page sessions and reports the helper processes they own
//! - [`HelperProcess`] - An OS-level process that must be released with its session
//! - [`MessagingClient`] - Chat service client that emits [`ConnectionEvent`]s

pub mod error;
pub mod fetcher;
pub mod messaging;

pub use error::{FetchError, MessagingError};
pub use fetcher::{HelperProcess, LaunchedSession, PageFetcher, SessionLauncher};
pub use messaging::{ConnectionEvent, ConnectionStatus, GroupInfo, MessagingClient, NotifyTarget};
