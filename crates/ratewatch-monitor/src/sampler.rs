//! Rate sampling with bounded retry.

use std::sync::Arc;
use std::time::Duration;

use ratewatch_protocols::FetchError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::MonitorError;
use crate::parser::RateParser;
use crate::retry::RetryPolicy;
use crate::sample::RateSample;
use crate::supervisor::{SessionLease, SessionSupervisor};

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;

/// Where the rate label lives.
#[derive(Debug, Clone)]
pub struct PageTarget {
    pub url: String,
    pub selector: String,
    pub wait_timeout: Duration,
}

impl PageTarget {
    pub fn new(url: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            selector: selector.into(),
            wait_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }
}

/// Fetches and parses the rate from the supervisor's current session.
///
/// Exhaustion is reported, never handled: recreating the session is the
/// caller's decision.
pub struct RateSampler {
    supervisor: Arc<SessionSupervisor>,
    parser: RateParser,
    target: PageTarget,
    policy: RetryPolicy,
}

impl RateSampler {
    pub fn new(supervisor: Arc<SessionSupervisor>, parser: RateParser, target: PageTarget) -> Self {
        Self {
            supervisor,
            parser,
            target,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn supervisor(&self) -> &Arc<SessionSupervisor> {
        &self.supervisor
    }

    /// One navigate, wait, read, parse pass.
    pub async fn sample_once(&self, cancel: &CancellationToken) -> Result<RateSample, MonitorError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MonitorError::Cancelled),
            result = self.acquire_and_fetch() => result,
        }
    }

    async fn acquire_and_fetch(&self) -> Result<RateSample, MonitorError> {
        let lease = self.supervisor.acquire().await?;
        tokio::select! {
            biased;
            _ = lease.cancel_token().cancelled() => Err(FetchError::SessionClosed.into()),
            result = self.fetch(&lease) => result,
        }
    }

    async fn fetch(&self, lease: &SessionLease) -> Result<RateSample, MonitorError> {
        let page = lease.fetcher();
        page.navigate(&self.target.url).await?;
        page.wait_visible(&self.target.selector, self.target.wait_timeout)
            .await?;
        let label = page.read_text(&self.target.selector).await?;
        let value = self.parser.parse(&label)?;
        debug!(generation = lease.generation(), value, "Sampled rate");
        Ok(RateSample::new(value))
    }

    /// Sample with up to `max_attempts` tries, `delay` apart.
    ///
    /// Cancellation aborts the in-flight attempt or the delay immediately.
    pub async fn sample_with_retry(
        &self,
        cancel: &CancellationToken,
    ) -> Result<RateSample, MonitorError> {
        let max_attempts = self.policy.max_attempts;
        let mut attempt = 1;
        loop {
            let err = match self.sample_once(cancel).await {
                Ok(sample) => return Ok(sample),
                Err(MonitorError::Cancelled) => return Err(MonitorError::Cancelled),
                Err(e) => e,
            };

            if attempt >= max_attempts {
                warn!(attempt, max_attempts, error = %err, "Rate sample failed, giving up");
                return Err(MonitorError::SessionExhausted {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            warn!(
                attempt,
                max_attempts,
                error = %err,
                "Rate sample failed, retrying in {:?}",
                self.policy.delay
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(MonitorError::Cancelled),
                _ = tokio::time::sleep(self.policy.delay) => {}
            }
            attempt += 1;
        }
    }
}
