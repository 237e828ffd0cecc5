//! Chrome DevTools Protocol (CDP) client.
//!
//! A minimal client: connect to the browser endpoint, open a page, call
//! commands on it. Events are not consumed.

mod client;
mod connection;
mod error;
mod protocol;
mod session;

pub use client::CdpClient;
pub use error::CdpError;
pub use protocol::*;
pub use session::PageSession;
