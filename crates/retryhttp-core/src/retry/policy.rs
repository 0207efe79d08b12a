//! Compose classifiers, waits and a stop condition into a retry policy.

use super::attempt::Attempt;
use super::classify::{ErrorClassSet, RetryCondition, StatusCodeSet};
use super::wait::{
    SharedWait, WaitContextAware, WaitExponential, WaitExponentialJitter, WaitFromHeader,
};
use std::sync::Arc;
use std::time::Duration;

/// Default maximum attempts (including the first).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("max_attempts must be at least 1")]
    InvalidMaxAttempts,
}

/// Ends a retry sequence regardless of classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopCondition {
    /// Stop once this many attempts have been made.
    AfterAttempt(u32),
    /// Stop once this much time has passed since the first attempt started.
    AfterDelay(Duration),
    /// Stop when any child says so.
    Any(Vec<StopCondition>),
    Never,
}

impl StopCondition {
    pub fn should_stop(&self, attempt: &Attempt<'_>) -> bool {
        match self {
            StopCondition::AfterAttempt(n) => attempt.number >= *n,
            StopCondition::AfterDelay(d) => attempt.elapsed >= *d,
            StopCondition::Any(children) => children.iter().any(|c| c.should_stop(attempt)),
            StopCondition::Never => false,
        }
    }
}

/// Everything that shapes a retry policy.
///
/// `Default` builds fresh default sets and strategies on every call, so no
/// two policies share a default instance. Build the policy with [`build`]
/// and treat it as immutable afterwards.
///
/// [`build`]: RetryOptions::build
#[derive(Debug, Clone)]
pub struct RetryOptions {
    pub max_attempts: u32,
    pub retry_server_errors: bool,
    pub retry_network_errors: bool,
    pub retry_network_timeouts: bool,
    pub retry_rate_limited: bool,
    pub wait_server_errors: SharedWait,
    pub wait_network_errors: SharedWait,
    pub wait_network_timeouts: SharedWait,
    /// Usually a [`WaitFromHeader`] so the server's hint is honored.
    pub wait_rate_limited: SharedWait,
    pub server_error_codes: StatusCodeSet,
    pub network_errors: ErrorClassSet,
    pub network_timeouts: ErrorClassSet,
    /// Replaces the OR of the enabled category conditions.
    pub retry_override: Option<RetryCondition>,
    /// Replaces the per-category dispatcher.
    pub wait_override: Option<SharedWait>,
    /// Replaces the stop-after-`max_attempts` condition.
    pub stop_override: Option<StopCondition>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_server_errors: true,
            retry_network_errors: true,
            retry_network_timeouts: true,
            retry_rate_limited: true,
            wait_server_errors: Arc::new(WaitExponentialJitter::default()),
            wait_network_errors: Arc::new(WaitExponential::default()),
            wait_network_timeouts: Arc::new(WaitExponentialJitter::default()),
            wait_rate_limited: Arc::new(WaitFromHeader::retry_after()),
            server_error_codes: StatusCodeSet::default(),
            network_errors: ErrorClassSet::network_errors(),
            network_timeouts: ErrorClassSet::network_timeouts(),
            retry_override: None,
            wait_override: None,
            stop_override: None,
        }
    }
}

impl RetryOptions {
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn retry_server_errors(mut self, enabled: bool) -> Self {
        self.retry_server_errors = enabled;
        self
    }

    pub fn retry_network_errors(mut self, enabled: bool) -> Self {
        self.retry_network_errors = enabled;
        self
    }

    pub fn retry_network_timeouts(mut self, enabled: bool) -> Self {
        self.retry_network_timeouts = enabled;
        self
    }

    pub fn retry_rate_limited(mut self, enabled: bool) -> Self {
        self.retry_rate_limited = enabled;
        self
    }

    pub fn server_error_codes(mut self, codes: impl Into<StatusCodeSet>) -> Self {
        self.server_error_codes = codes.into();
        self
    }

    pub fn network_errors(mut self, classes: impl Into<ErrorClassSet>) -> Self {
        self.network_errors = classes.into();
        self
    }

    pub fn network_timeouts(mut self, classes: impl Into<ErrorClassSet>) -> Self {
        self.network_timeouts = classes.into();
        self
    }

    pub fn wait_server_errors(mut self, wait: SharedWait) -> Self {
        self.wait_server_errors = wait;
        self
    }

    pub fn wait_network_errors(mut self, wait: SharedWait) -> Self {
        self.wait_network_errors = wait;
        self
    }

    pub fn wait_network_timeouts(mut self, wait: SharedWait) -> Self {
        self.wait_network_timeouts = wait;
        self
    }

    pub fn wait_rate_limited(mut self, wait: SharedWait) -> Self {
        self.wait_rate_limited = wait;
        self
    }

    pub fn retry_override(mut self, condition: RetryCondition) -> Self {
        self.retry_override = Some(condition);
        self
    }

    pub fn wait_override(mut self, wait: SharedWait) -> Self {
        self.wait_override = Some(wait);
        self
    }

    pub fn stop_override(mut self, stop: StopCondition) -> Self {
        self.stop_override = Some(stop);
        self
    }

    /// OR of the enabled category conditions.
    fn retry_condition(&self) -> RetryCondition {
        let mut conditions = Vec::with_capacity(4);
        if self.retry_server_errors {
            conditions.push(RetryCondition::ServerError(self.server_error_codes.clone()));
        }
        if self.retry_network_errors {
            conditions.push(RetryCondition::NetworkError(self.network_errors.clone()));
        }
        if self.retry_network_timeouts {
            conditions.push(RetryCondition::NetworkTimeout(self.network_timeouts.clone()));
        }
        if self.retry_rate_limited {
            conditions.push(RetryCondition::RateLimited);
        }
        RetryCondition::Any(conditions)
    }

    // Waits of disabled categories are unreachable since the retry condition
    // never approves those failures.
    fn dispatcher(&self) -> WaitContextAware {
        WaitContextAware {
            server_errors: Arc::clone(&self.wait_server_errors),
            network_errors: Arc::clone(&self.wait_network_errors),
            network_timeouts: Arc::clone(&self.wait_network_timeouts),
            rate_limited: Arc::clone(&self.wait_rate_limited),
            server_error_codes: self.server_error_codes.clone(),
            network_error_classes: self.network_errors.clone(),
            network_timeout_classes: self.network_timeouts.clone(),
        }
    }

    pub fn build(&self) -> Result<RetryPolicy, PolicyError> {
        if self.max_attempts == 0 {
            return Err(PolicyError::InvalidMaxAttempts);
        }
        let retry = self
            .retry_override
            .clone()
            .unwrap_or_else(|| self.retry_condition());
        let wait = self
            .wait_override
            .clone()
            .unwrap_or_else(|| Arc::new(self.dispatcher()));
        let stop = self
            .stop_override
            .clone()
            .unwrap_or(StopCondition::AfterAttempt(self.max_attempts));
        Ok(RetryPolicy { retry, wait, stop })
    }
}

/// Decision for a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The failure is not retryable; surface it now.
    NoRetry,
    /// Retryable, but the stop condition fired; surface it now.
    Exhausted,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Composed retry policy handed to the attempt executor.
///
/// Holds only immutable data and may be shared across threads and
/// concurrent retry sequences.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    retry: RetryCondition,
    wait: SharedWait,
    stop: StopCondition,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry: RetryOptions::default().retry_condition(),
            wait: Arc::new(WaitContextAware::default()),
            stop: StopCondition::AfterAttempt(DEFAULT_MAX_ATTEMPTS),
        }
    }
}

impl RetryPolicy {
    pub fn new(retry: RetryCondition, wait: SharedWait, stop: StopCondition) -> Self {
        Self { retry, wait, stop }
    }

    pub fn should_retry(&self, attempt: &Attempt<'_>) -> bool {
        self.retry.should_retry(attempt)
    }

    pub fn compute_wait(&self, attempt: &Attempt<'_>) -> Duration {
        self.wait.wait(attempt)
    }

    pub fn should_stop(&self, attempt: &Attempt<'_>) -> bool {
        self.stop.should_stop(attempt)
    }

    /// Classification first, then the stop condition, then the wait.
    pub fn decide(&self, attempt: &Attempt<'_>) -> RetryDecision {
        if !self.should_retry(attempt) {
            return RetryDecision::NoRetry;
        }
        if self.should_stop(attempt) {
            return RetryDecision::Exhausted;
        }
        RetryDecision::RetryAfter(self.compute_wait(attempt))
    }

    pub fn retry_condition(&self) -> &RetryCondition {
        &self.retry
    }

    pub fn stop_condition(&self) -> &StopCondition {
        &self.stop
    }
}
