//! CLI definitions for ratewatch.

use std::path::PathBuf;

use clap::Parser;

/// ratewatch CLI.
#[derive(Parser)]
#[command(name = "ratewatch")]
#[command(about = "Watch an exchange rate and send chat alerts when it crosses your thresholds")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: ~/.ratewatch/config.toml)
    #[arg(short, long, env = "RATEWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level filter, overrides the config file (e.g. "debug", "ratewatch_monitor=trace")
    #[arg(short, long)]
    pub log_level: Option<String>,
}
