//! Interactive console: menu, prompts and the live rate line.

use std::io::Write;

use chrono::Local;
use colored::Colorize;
use ratewatch_config::Config;
use ratewatch_monitor::{NotifyOutcome, RateSample, RateThresholds, RateTrend, SampleSink};
use ratewatch_protocols::{GroupInfo, NotifyTarget};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Main menu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MenuChoice {
    ListGroups,
    StartMonitoring,
    Help,
    Quit,
}

impl MenuChoice {
    pub(crate) fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::ListGroups),
            "2" => Some(MenuChoice::StartMonitoring),
            "h" | "H" => Some(MenuChoice::Help),
            "q" | "Q" => Some(MenuChoice::Quit),
            _ => None,
        }
    }
}

/// Whether a line typed during monitoring asks for a restart.
pub(crate) fn is_restart_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("s")
}

/// A rate typed by the operator: positive and finite.
pub(crate) fn parse_rate(input: &str) -> Option<f64> {
    input
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Line-oriented stdin reader that gives up on interrupt.
pub(crate) struct Console {
    lines: mpsc::Receiver<String>,
    interrupt: CancellationToken,
}

impl Console {
    /// Start reading stdin on a dedicated thread.
    pub(crate) fn spawn(interrupt: CancellationToken) -> Self {
        let (tx, lines) = mpsc::channel(16);
        std::thread::spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
            debug!("stdin closed");
        });
        Self { lines, interrupt }
    }

    /// Next input line. `None` once stdin is closed or an interrupt arrived.
    pub(crate) async fn read_line(&mut self) -> Option<String> {
        tokio::select! {
            biased;
            _ = self.interrupt.cancelled() => None,
            line = self.lines.recv() => line,
        }
    }

    pub(crate) async fn prompt(&mut self, text: &str) -> Option<String> {
        print!("{}", text);
        let _ = std::io::stdout().flush();
        self.read_line().await
    }

    async fn prompt_rate(&mut self, text: &str) -> Option<f64> {
        loop {
            let input = self.prompt(text).await?;
            match parse_rate(&input) {
                Some(rate) => return Some(rate),
                None => println!("{}", "Please enter a positive number, e.g. 3.05".yellow()),
            }
        }
    }

    /// Ask for the minimum and maximum rate; the maximum is asked again
    /// until it exceeds the minimum.
    pub(crate) async fn prompt_thresholds(&mut self) -> Option<RateThresholds> {
        let min = self.prompt_rate("Minimum rate: ").await?;
        loop {
            let max = self.prompt_rate("Maximum rate: ").await?;
            match RateThresholds::new(min, max) {
                Ok(thresholds) => return Some(thresholds),
                Err(_) => println!(
                    "{}",
                    format!("Maximum rate must be greater than {}", min).yellow()
                ),
            }
        }
    }

    /// Ask for the notify target. Blank input picks `default` when there is one.
    pub(crate) async fn prompt_target(&mut self, default: Option<&str>) -> Option<String> {
        let text = match default {
            Some(id) => format!("Notify chat id or group name [{}]: ", id),
            None => "Notify chat id or group name: ".to_string(),
        };
        loop {
            let input = self.prompt(&text).await?;
            let input = input.trim();
            if !input.is_empty() {
                return Some(input.to_string());
            }
            if let Some(id) = default {
                return Some(id.to_string());
            }
        }
    }
}

pub(crate) fn print_banner() {
    println!();
    println!(
        "{} {}",
        "ratewatch".cyan().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("{}", "Exchange rate alerts over Telegram".dimmed());
}

pub(crate) fn print_menu() {
    println!();
    println!("{}", "Menu:".bold());
    println!("  1  List joined groups");
    println!("  2  Start monitoring");
    println!("  H  Help");
    println!("  Q  Quit");
}

pub(crate) fn print_help(config: &Config) {
    println!();
    println!("{}", "Help".bold());
    println!(
        "  ratewatch reads the rate from {} every {}s",
        config.monitor.url,
        config.monitor.sample_interval_secs
    );
    println!("  and sends an alert when it is at or below the minimum,");
    println!("  or at or above the maximum. The same rate is never alerted twice in a row.");
    println!();
    println!("  The notify target is a chat id, or part of a group's name or id.");
    println!("  Add the bot to a group and post a message there so it shows up in the list.");
    println!();
    println!("  While monitoring:");
    println!("    s + Enter   restart with new settings");
    println!("    Ctrl+C      quit");
}

pub(crate) fn print_groups(groups: &[GroupInfo]) {
    println!();
    if groups.is_empty() {
        println!("{}", "No groups found. Add the bot to a group and send a message there.".yellow());
        return;
    }
    println!("{}", "Joined groups:".bold());
    for group in groups {
        println!(
            "  {}  id: {}  short id: {}  owner: {}",
            group.name.bold(),
            group.id,
            group.short_id,
            group.owner_id.as_deref().unwrap_or("-")
        );
    }
}

pub(crate) fn print_settings(thresholds: &RateThresholds, target: &NotifyTarget, config: &Config) {
    println!();
    println!("{}", "Monitoring settings:".bold());
    println!("  Minimum rate:   {}", thresholds.min());
    println!("  Maximum rate:   {}", thresholds.max());
    println!("  Notify target:  {}", target);
    println!("  Interval:       {}s", config.monitor.sample_interval_secs);
    println!("  Source:         {}", config.monitor.url);
    println!("{}", "Type s + Enter to restart, Ctrl+C to quit.".dimmed());
    println!();
}

/// Prints each sample as a coloured line.
pub(crate) struct RateLine {
    label_prefix: String,
}

impl RateLine {
    pub(crate) fn new(label_prefix: impl Into<String>) -> Self {
        Self {
            label_prefix: label_prefix.into(),
        }
    }

    pub(crate) fn format(&self, sample: &RateSample, trend: RateTrend) -> String {
        let text = format!("{}{:.4}", self.label_prefix, sample.value);
        let text = match trend {
            RateTrend::Up => text.green().to_string(),
            RateTrend::Down => text.red().to_string(),
            RateTrend::First | RateTrend::Flat => text,
        };
        let at = sample.observed_at.with_timezone(&Local);
        format!("[{}] {}", at.format("%Y-%m-%d %H:%M:%S"), text)
    }
}

impl SampleSink for RateLine {
    fn on_sample(&mut self, sample: &RateSample, trend: RateTrend) {
        println!("{}", self.format(sample, trend));
    }

    fn on_notification(&mut self, rate: f64, outcome: &NotifyOutcome) {
        let line = format!("  alert for {:.4}: {}", rate, outcome);
        match outcome {
            NotifyOutcome::Delivered { .. } => println!("{}", line.cyan()),
            NotifyOutcome::Skipped => println!("{}", line.dimmed()),
            _ => println!("{}", line.yellow()),
        }
    }
}
