//! Wiring from configuration to the concrete collaborators.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use ratewatch_browser_cdp::ChromeLaunchConfig;
use ratewatch_config::{BrowserConfig, MessagingConfig};
use ratewatch_messaging_telegram::{
    CredentialStore, TelegramClient, TelegramConfig, TelegramCredentials,
};
use ratewatch_protocols::{ConnectionStatus, MessagingClient, MessagingError};
use tracing::{info, warn};

use crate::console::Console;

pub(crate) fn chrome_config(browser: &BrowserConfig) -> ChromeLaunchConfig {
    ChromeLaunchConfig {
        chrome_path: browser.chrome_path.clone(),
        headless: browser.headless,
        profile_root: browser.profile_root.clone(),
        launch_timeout: browser.launch_timeout(),
        kill_grace: browser.kill_grace(),
        extra_args: browser.extra_args.clone(),
        ..Default::default()
    }
}

pub(crate) fn telegram_config(messaging: &MessagingConfig) -> TelegramConfig {
    TelegramConfig {
        api_base: messaging.api_base.clone(),
        owner_chat_id: messaging.owner_chat_id.clone(),
        request_timeout: messaging.request_timeout(),
        health_check_interval: messaging.health_check_interval(),
    }
}

/// Ask for a bot token when none is stored yet.
pub(crate) async fn ensure_credentials(store: &CredentialStore, console: &mut Console) -> Result<()> {
    if store.exists() {
        return Ok(());
    }

    println!();
    println!(
        "{} No bot token found at {}",
        "!".yellow().bold(),
        store.path().display()
    );
    println!("Create a bot with @BotFather and paste its token here.");

    loop {
        let Some(input) = console.prompt("Bot token: ").await else {
            bail!("no bot token entered");
        };
        let token = input.trim();
        if token.is_empty() {
            continue;
        }
        store
            .save(&TelegramCredentials::new(token))
            .context("failed to store bot token")?;
        return Ok(());
    }
}

/// Initial connection. Transport failures leave the client disconnected for
/// the reconnection manager to pick up; anything else is fatal.
pub(crate) async fn connect(client: &TelegramClient) -> Result<ConnectionStatus> {
    match client.connect().await {
        Ok(()) => Ok(ConnectionStatus::Connected),
        Err(e @ (MessagingError::ConnectionFailed(_) | MessagingError::NotConnected)) => {
            warn!("Telegram unreachable at startup, will keep retrying: {}", e);
            Ok(ConnectionStatus::Disconnected)
        }
        Err(e) => Err(e).context("messaging client could not be initialised"),
    }
}

pub(crate) fn log_identity(client: &TelegramClient) {
    if let Some(me) = client.bot_user() {
        info!(
            "Bot: {} (@{})",
            me.first_name,
            me.username.as_deref().unwrap_or("-")
        );
    }
    match client.own_id() {
        Some(id) => info!("Fallback chat: {}", id),
        None => warn!("messaging.owner_chat_id is not set; failed group alerts have no fallback"),
    }
}
