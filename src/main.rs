//! ratewatch - exchange-rate watcher with chat alerts
//!
//! Main entry point: configuration, logging, collaborator wiring and the
//! interactive console.

mod app;
mod bootstrap;
mod cli;
mod console;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ratewatch_browser_cdp::ChromeLauncher;
use ratewatch_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};
use ratewatch_messaging_telegram::{CredentialStore, TelegramClient};
use ratewatch_monitor::{ControlSignals, ReconnectionManager};
use ratewatch_protocols::MessagingClient;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::App;
use crate::cli::Cli;
use crate::console::Console;

/// Initialize tracing with console and file output.
///
/// Log files are written to the configured directory with daily rotation.
/// Precedence for the filter: `--log-level`, then `RUST_LOG`, then the config.
fn init_tracing(logging: &LoggingConfig, cli_level: Option<&str>) -> Result<()> {
    std::fs::create_dir_all(&logging.dir)
        .with_context(|| format!("failed to create log directory {}", logging.dir.display()))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("ratewatch")
        .filename_suffix("log")
        .max_log_files(logging.max_log_files)
        .build(&logging.dir)
        .context("failed to create log file appender")?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The guard flushes the file writer on drop; keep it for the whole run.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = match cli_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level)),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        // Console logs go to stderr so they do not interleave with prompts.
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(true)
                .with_writer(std::io::stderr),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => ConfigLoader::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => {
            let path = ConfigLoader::default_path();
            ConfigLoader::load_or_default(&path)
                .with_context(|| format!("failed to load config {}", path.display()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config.logging, cli.log_level.as_deref())?;

    info!("Starting ratewatch v{}", env!("CARGO_PKG_VERSION"));
    for warning in ConfigValidator::validate(&config).into_result()? {
        warn!("Config: {}", warning);
    }

    let signals = ControlSignals::new();
    signals.install_os_handlers()?;
    let interrupt = CancellationToken::new();
    app::forward_interrupt(&signals, interrupt.clone());
    let mut console = Console::spawn(interrupt);

    console::print_banner();

    let store = CredentialStore::new(&config.messaging.credentials_file);
    bootstrap::ensure_credentials(&store, &mut console).await?;

    let client = Arc::new(TelegramClient::new(
        bootstrap::telegram_config(&config.messaging),
        store,
    )?);
    let initial = bootstrap::connect(&client).await?;
    bootstrap::log_identity(&client);

    let recovery_cancel = CancellationToken::new();
    let recovery = ReconnectionManager::spawn(
        client.clone(),
        initial,
        config.messaging.reconnect_delay(),
        recovery_cancel,
    );

    let launcher = Arc::new(ChromeLauncher::new(bootstrap::chrome_config(&config.browser)));
    App::new(
        config,
        client.clone(),
        launcher,
        recovery.watch(),
        signals,
        console,
    )
    .run()
    .await;

    recovery.shutdown().await;
    client.disconnect().await;
    info!("ratewatch stopped");
    Ok(())
}
