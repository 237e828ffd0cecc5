//! Menu loop and monitoring runs.

use std::sync::Arc;

use colored::Colorize;
use ratewatch_browser_cdp::ChromeLauncher;
use ratewatch_config::Config;
use ratewatch_messaging_telegram::TelegramClient;
use ratewatch_monitor::{
    ControlSignal, ControlSignals, LoopExit, MonitorState, Notifier, OrchestratorLoop, PageTarget,
    RateParser, RateSampler, RateThresholds, RetryPolicy, SessionSupervisor, ShutdownReason,
    resolve_target,
};
use ratewatch_protocols::{ConnectionStatus, MessagingClient, NotifyTarget};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::console::{self, Console, MenuChoice, RateLine, is_restart_command};

/// What to do after a monitoring session ends.
enum Flow {
    Menu,
    Exit,
}

pub(crate) struct App {
    config: Config,
    client: Arc<TelegramClient>,
    launcher: Arc<ChromeLauncher>,
    status: watch::Receiver<ConnectionStatus>,
    signals: ControlSignals,
    console: Console,
}

impl App {
    pub(crate) fn new(
        config: Config,
        client: Arc<TelegramClient>,
        launcher: Arc<ChromeLauncher>,
        status: watch::Receiver<ConnectionStatus>,
        signals: ControlSignals,
        console: Console,
    ) -> Self {
        Self {
            config,
            client,
            launcher,
            status,
            signals,
            console,
        }
    }

    /// Run the main menu until the operator quits or an interrupt arrives.
    pub(crate) async fn run(mut self) {
        loop {
            console::print_menu();
            let Some(input) = self.console.prompt("> ").await else {
                break;
            };

            match MenuChoice::parse(&input) {
                Some(MenuChoice::ListGroups) => self.list_groups().await,
                Some(MenuChoice::StartMonitoring) => {
                    if let Flow::Exit = self.start_monitoring().await {
                        break;
                    }
                }
                Some(MenuChoice::Help) => console::print_help(&self.config),
                Some(MenuChoice::Quit) => break,
                None => println!("{}", "Unknown option, type H for help".yellow()),
            }
        }
    }

    async fn list_groups(&self) {
        match self.client.list_groups().await {
            Ok(groups) => console::print_groups(&groups),
            Err(e) => {
                warn!("Failed to list groups: {}", e);
                println!("{}", format!("Could not list groups: {}", e).red());
            }
        }
    }

    async fn start_monitoring(&mut self) -> Flow {
        loop {
            let Some(thresholds) = self.console.prompt_thresholds().await else {
                return Flow::Exit;
            };
            let default_target = self.client.own_id();
            let Some(input) = self.console.prompt_target(default_target.as_deref()).await else {
                return Flow::Exit;
            };
            let target = resolve_target(self.client.as_ref(), &input).await;
            console::print_settings(&thresholds, &target, &self.config);

            match self.run_once(thresholds, target).await {
                LoopExit::Restart if !self.signals.is_interrupted() => {
                    println!("{}", "Restarting, enter new settings.".cyan());
                }
                LoopExit::Restart | LoopExit::Shutdown(ShutdownReason::Interrupted) => {
                    return Flow::Exit;
                }
                LoopExit::Shutdown(ShutdownReason::SessionLost) => {
                    error!("Browser session ended unexpectedly, shutting down");
                    println!("{}", "The browser session ended unexpectedly.".red());
                    return Flow::Exit;
                }
            }
        }
    }

    /// One monitoring run with fresh components, sharing the messaging
    /// client and its connection status.
    async fn run_once(&mut self, thresholds: RateThresholds, target: NotifyTarget) -> LoopExit {
        let monitor = &self.config.monitor;
        let messaging = &self.config.messaging;

        let supervisor = Arc::new(SessionSupervisor::new(
            self.launcher.clone(),
            CancellationToken::new(),
            self.config.browser.kill_grace(),
        ));
        let sampler = RateSampler::new(
            supervisor,
            RateParser::new(monitor.label_prefix.clone()),
            PageTarget::new(monitor.url.clone(), monitor.selector.clone())
                .with_wait_timeout(monitor.wait_timeout()),
        )
        .with_policy(RetryPolicy::new(monitor.max_attempts, monitor.retry_delay()));

        let client: Arc<dyn MessagingClient> = self.client.clone();
        let notifier = Notifier::new(client, self.status.clone())
            .with_policy(RetryPolicy::new(
                messaging.send_attempts,
                messaging.send_retry_delay(),
            ))
            .with_label_prefix(monitor.label_prefix.clone());

        let run = OrchestratorLoop::new(
            MonitorState::new(thresholds, target),
            sampler,
            Arc::new(notifier),
            self.signals.subscribe(),
        )
        .with_interval(monitor.sample_interval())
        .with_sink(Box::new(RateLine::new(monitor.label_prefix.clone())))
        .run();
        tokio::pin!(run);

        let mut stdin_open = true;
        let exit = loop {
            tokio::select! {
                exit = &mut run => break exit,
                line = self.console.read_line(), if stdin_open => match line {
                    Some(line) if is_restart_command(&line) => self.signals.request_restart(),
                    Some(_) => {}
                    None => stdin_open = false,
                },
            }
        };

        info!("Monitoring run ended: {:?}", exit);
        exit
    }
}

/// Cancel `token` on the first interrupt request.
pub(crate) fn forward_interrupt(signals: &ControlSignals, token: CancellationToken) {
    let mut rx = signals.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ControlSignal::Interrupt) => break,
                Ok(ControlSignal::Restart) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            }
        }
        token.cancel();
    });
}
