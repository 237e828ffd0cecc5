//! The monitoring control loop.
//!
//! One task samples on a fixed period and arbitrates between the ticker,
//! restart and interrupt requests, the browser session dying, and finished
//! notification tasks. Every exit path goes through a single teardown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::MonitorError;
use crate::gate::MonitorState;
use crate::notifier::{Notifier, NotifyOutcome};
use crate::sample::{RateSample, RateTrend};
use crate::sampler::RateSampler;
use crate::signal::ControlSignal;
use crate::supervisor::SessionSupervisor;

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;

/// Why a run shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupted,
    SessionLost,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::Interrupted => write!(f, "interrupted"),
            ShutdownReason::SessionLost => write!(f, "browser session lost"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Go back to configuration and start a new run.
    Restart,
    Shutdown(ShutdownReason),
}

/// Loop phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Running,
    Restarting,
    ShuttingDown,
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestratorState::Running => write!(f, "running"),
            OrchestratorState::Restarting => write!(f, "restarting"),
            OrchestratorState::ShuttingDown => write!(f, "shutting_down"),
        }
    }
}

/// Receives every successful sample and every finished notification.
pub trait SampleSink: Send {
    fn on_sample(&mut self, sample: &RateSample, trend: RateTrend);

    fn on_notification(&mut self, _rate: f64, _outcome: &NotifyOutcome) {}
}

/// Sink that only logs.
pub struct LogSink;

impl SampleSink for LogSink {
    fn on_sample(&mut self, sample: &RateSample, trend: RateTrend) {
        info!(rate = sample.value, ?trend, "Rate sampled");
    }

    fn on_notification(&mut self, rate: f64, outcome: &NotifyOutcome) {
        info!(rate, %outcome, "Notification finished");
    }
}

struct InFlight {
    seq: u64,
    rate: f64,
    handle: AbortHandle,
}

/// One monitoring run.
pub struct OrchestratorLoop {
    state: MonitorState,
    phase: OrchestratorState,
    supervisor: Arc<SessionSupervisor>,
    sampler: RateSampler,
    notifier: Arc<Notifier>,
    control: broadcast::Receiver<ControlSignal>,
    interval: Duration,
    sink: Box<dyn SampleSink>,
    notifications: JoinSet<(u64, f64, NotifyOutcome)>,
    in_flight: Vec<InFlight>,
    next_seq: u64,
    recorded_seq: u64,
    previous: Option<RateSample>,
}

impl OrchestratorLoop {
    pub fn new(
        state: MonitorState,
        sampler: RateSampler,
        notifier: Arc<Notifier>,
        control: broadcast::Receiver<ControlSignal>,
    ) -> Self {
        Self {
            state,
            phase: OrchestratorState::Running,
            supervisor: sampler.supervisor().clone(),
            sampler,
            notifier,
            control,
            interval: Duration::from_secs(60),
            sink: Box::new(LogSink),
            notifications: JoinSet::new(),
            in_flight: Vec::new(),
            next_seq: 0,
            recorded_seq: 0,
            previous: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn SampleSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Run until a restart, an interrupt or the loss of the browser session.
    pub async fn run(mut self) -> LoopExit {
        info!(
            min = self.state.thresholds.min(),
            max = self.state.thresholds.max(),
            target = %self.state.notify_target,
            interval = ?self.interval,
            "Monitoring started"
        );

        let exit = match self.sample_cycle().await {
            Some(exit) => exit,
            None => self.periodic().await,
        };
        self.teardown(exit).await
    }

    async fn periodic(&mut self) -> LoopExit {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                signal = next_control(&mut self.control) => return exit_for(signal),
                _ = self.supervisor.session_terminated() => {
                    return LoopExit::Shutdown(ShutdownReason::SessionLost);
                }
                Some(joined) = self.notifications.join_next(), if !self.notifications.is_empty() => {
                    self.on_notification_done(joined);
                }
                _ = ticker.tick() => {
                    if let Some(exit) = self.sample_cycle().await {
                        return exit;
                    }
                }
            }
        }
    }

    /// Sample once with retry while still watching for control requests.
    async fn sample_cycle(&mut self) -> Option<LoopExit> {
        let cancel = self.supervisor.root_token().child_token();
        let result = tokio::select! {
            biased;
            signal = next_control(&mut self.control) => {
                cancel.cancel();
                return Some(exit_for(signal));
            }
            _ = self.supervisor.session_terminated() => {
                cancel.cancel();
                return Some(LoopExit::Shutdown(ShutdownReason::SessionLost));
            }
            result = self.sampler.sample_with_retry(&cancel) => result,
        };

        match result {
            Ok(sample) => self.on_sample(sample),
            Err(MonitorError::SessionExhausted { attempts, source }) => {
                error!(attempts, error = %source, "Sampling exhausted, recreating browser session");
                return self.recreate_session().await;
            }
            Err(MonitorError::Cancelled) => debug!("Sample cancelled"),
            Err(e) => warn!(error = %e, "Sampling failed"),
        }
        None
    }

    async fn recreate_session(&mut self) -> Option<LoopExit> {
        tokio::select! {
            biased;
            signal = next_control(&mut self.control) => Some(exit_for(signal)),
            result = self.supervisor.recreate() => {
                match result {
                    Ok(lease) => info!(generation = lease.generation(), "Browser session recreated"),
                    Err(e) => error!(error = %e, "Failed to recreate browser session, retrying on next sample"),
                }
                None
            }
        }
    }

    fn on_sample(&mut self, sample: RateSample) {
        let trend = RateTrend::between(self.previous.as_ref(), &sample);
        self.sink.on_sample(&sample, trend);

        let rate = sample.value;
        if self.state.should_notify(rate) {
            if self.in_flight.iter().any(|n| n.rate == rate) {
                debug!(rate, "Notification for this rate already in flight");
            } else {
                self.dispatch(rate);
            }
        }
        self.previous = Some(sample);
    }

    fn dispatch(&mut self, rate: f64) {
        self.next_seq += 1;
        let seq = self.next_seq;
        let notifier = self.notifier.clone();
        let target = self.state.notify_target.clone();
        info!(rate, %target, "Rate outside thresholds, notifying");

        let handle = self.notifications.spawn(async move {
            let outcome = notifier.notify(&target, rate).await;
            (seq, rate, outcome)
        });
        self.in_flight.push(InFlight { seq, rate, handle });
    }

    fn on_notification_done(&mut self, joined: Result<(u64, f64, NotifyOutcome), JoinError>) {
        match joined {
            Ok((seq, rate, outcome)) => {
                self.in_flight.retain(|n| n.seq != seq);
                // An older sequence finishing late must not overwrite a newer one.
                if outcome.is_completed() && seq > self.recorded_seq {
                    self.recorded_seq = seq;
                    self.state.record_notified(rate);
                }
                self.sink.on_notification(rate, &outcome);
            }
            Err(e) => {
                error!(error = %e, "Notification task failed");
                self.in_flight.retain(|n| !n.handle.is_finished());
            }
        }
    }

    /// Consumes the loop, so it runs exactly once per run.
    async fn teardown(mut self, exit: LoopExit) -> LoopExit {
        self.phase = match exit {
            LoopExit::Restart => OrchestratorState::Restarting,
            LoopExit::Shutdown(_) => OrchestratorState::ShuttingDown,
        };
        info!(state = %self.phase, ?exit, "Stopping monitoring");

        self.supervisor.root_token().cancel();
        if !self.in_flight.is_empty() {
            warn!(pending = self.in_flight.len(), "Aborting in-flight notifications");
        }
        self.notifications.shutdown().await;
        self.supervisor.destroy_all().await;
        exit
    }
}

fn exit_for(signal: ControlSignal) -> LoopExit {
    match signal {
        ControlSignal::Restart => LoopExit::Restart,
        ControlSignal::Interrupt => LoopExit::Shutdown(ShutdownReason::Interrupted),
    }
}

/// Next control request; pending forever once all senders are gone.
async fn next_control(control: &mut broadcast::Receiver<ControlSignal>) -> ControlSignal {
    loop {
        match control.recv().await {
            Ok(signal) => return signal,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "Control signals lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                std::future::pending::<()>().await;
            }
        }
    }
}
