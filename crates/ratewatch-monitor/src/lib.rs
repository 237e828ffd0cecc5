//! # ratewatch Monitor
//!
//! The monitoring core: a control loop that samples one rate from a browser
//! session on a fixed period, gates threshold notifications, and keeps the
//! browser session and messaging channel alive across failures.
//!
//! ## Key Components
//!
//! - [`OrchestratorLoop`]: periodic sampling and restart/shutdown arbitration
//! - [`SessionSupervisor`]: owns at most one browser session and its helper processes
//! - [`RateSampler`]: fetch + parse with bounded retry
//! - [`ReconnectionManager`]: single task owning the messaging connection status
//! - [`Notifier`]: one alert with bounded retry and a fallback recipient
//! - [`should_notify`]: the threshold/de-duplication gate

pub mod error;
pub mod gate;
pub mod notifier;
pub mod orchestrator;
pub mod parser;
pub mod reconnect;
pub mod retry;
pub mod sample;
pub mod sampler;
pub mod signal;
pub mod supervisor;
pub mod target;

#[cfg(test)]
mod test_support;

pub use error::{MonitorError, ParseError};
pub use gate::{MonitorState, RateThresholds, should_notify};
pub use notifier::{Notifier, NotifyOutcome};
pub use orchestrator::{
    LogSink, LoopExit, OrchestratorLoop, OrchestratorState, SampleSink, ShutdownReason,
};
pub use parser::{DEFAULT_LABEL_PREFIX, RateParser};
pub use reconnect::{ReconnectionManager, transition};
pub use retry::RetryPolicy;
pub use sample::{RateSample, RateTrend};
pub use sampler::{PageTarget, RateSampler};
pub use signal::{ControlSignal, ControlSignals};
pub use supervisor::{HelperRegistry, SessionHandle, SessionLease, SessionSupervisor};
pub use target::{find_group, is_group_identifier, match_group, resolve_target};
