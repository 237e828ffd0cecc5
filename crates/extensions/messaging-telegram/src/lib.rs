//! Telegram Bot API client for ratewatch.
//!
//! Implements [`MessagingClient`](ratewatch_protocols::MessagingClient) over
//! plain HTTPS calls:
//!
//! - `getMe` verifies the bot token and doubles as the health probe
//! - `sendMessage` delivers alerts to a user or group chat id
//! - `getUpdates` discovers the groups the bot has been added to
//!
//! The bot token lives in a small TOML credential file so it can be replaced
//! without touching the main configuration.

mod api;
mod client;
mod credentials;
mod error;

pub use api::{Chat, ChatMember, ChatMemberUpdated, Message, Update, User, groups_from_updates};
pub use client::{TelegramClient, TelegramConfig};
pub use credentials::{CredentialStore, TelegramCredentials};
pub use error::ApiError;
