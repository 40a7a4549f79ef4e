// Retry policy: failure classification and capped exponential backoff
// Author: kelexine (https://github.com/kelexine)

use crate::error::{Result, SessionError};
use std::time::Duration;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default delay before the first retry.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;
/// Default cap on any single delay.
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

/// Immutable retry budget and delay bounds for one executor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    max_retries: u32,
    initial_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
}

impl RetryConfig {
    /// Builds a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidRetryConfig` if `initial_delay_ms` is zero
    /// or `max_delay_ms` is below `initial_delay_ms`.
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Result<Self> {
        if initial_delay_ms == 0 {
            return Err(SessionError::InvalidRetryConfig(
                "initial_delay_ms must be greater than zero".to_string(),
            ));
        }
        if max_delay_ms < initial_delay_ms {
            return Err(SessionError::InvalidRetryConfig(format!(
                "max_delay_ms ({}) must be >= initial_delay_ms ({})",
                max_delay_ms, initial_delay_ms
            )));
        }

        Ok(Self {
            max_retries,
            initial_delay_ms,
            max_delay_ms,
            jitter_factor: 0.0,
        })
    }

    /// Returns a copy that shortens each delay by a random share of up to
    /// `factor` (0.0 disables jitter, 1.0 allows a delay to shrink to zero).
    pub fn with_jitter(mut self, factor: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&factor) {
            return Err(SessionError::InvalidRetryConfig(format!(
                "jitter_factor must be within [0, 1], got {}",
                factor
            )));
        }
        self.jitter_factor = factor;
        Ok(self)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn initial_delay_ms(&self) -> u64 {
        self.initial_delay_ms
    }

    pub fn max_delay_ms(&self) -> u64 {
        self.max_delay_ms
    }

    pub fn jitter_factor(&self) -> f64 {
        self.jitter_factor
    }

    /// Upper bound on invocations of a wrapped operation.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_factor: 0.0,
        }
    }
}

/// Coarse class of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// No response: connection failure, unreachable network, exhausted
    /// local resources, time-out.
    Network,
    /// Response with status >= 500.
    Server,
    /// 4xx other than 401/403.
    Client,
    /// 401 or 403.
    Auth,
    /// Anything else that must not be retried.
    Terminal,
}

impl FailureClass {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => FailureClass::Auth,
            400..=499 => FailureClass::Client,
            s if s >= 500 => FailureClass::Server,
            _ => FailureClass::Terminal,
        }
    }

    pub fn is_retryable(self) -> bool {
        matches!(self, FailureClass::Network | FailureClass::Server)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureClass::Network => "network",
            FailureClass::Server => "server",
            FailureClass::Client => "client",
            FailureClass::Auth => "auth",
            FailureClass::Terminal => "terminal",
        }
    }
}

/// Errors the policy can reason about.
pub trait ClassifyFailure {
    fn failure_class(&self) -> FailureClass;
}

/// Errors that can represent a caller-initiated abort.
pub trait Abortable {
    fn aborted() -> Self;
}

/// Decision for one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// Result of one attempt after classification.
#[derive(Debug)]
pub enum AttemptOutcome<T, E> {
    Success(T),
    RetryableFailure { error: E, delay: Duration },
    TerminalFailure(E),
}

/// `min(initial * 2^(attempt-1), max)`, saturating for large attempts.
pub fn backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let exponent = attempt.saturating_sub(1).min(63);
    let raw = config.initial_delay_ms.saturating_mul(1u64 << exponent);
    Duration::from_millis(raw.min(config.max_delay_ms))
}

/// Decides whether `attempt` (1-indexed) should be followed by another.
pub fn should_retry<E>(error: &E, attempt: u32, config: &RetryConfig) -> RetryDecision
where
    E: ClassifyFailure + ?Sized,
{
    if attempt > config.max_retries {
        return RetryDecision::NoRetry;
    }

    if error.failure_class().is_retryable() {
        RetryDecision::RetryAfter(backoff_delay(attempt, config))
    } else {
        RetryDecision::NoRetry
    }
}

/// Folds the result of an attempt into an `AttemptOutcome`.
pub fn classify_attempt<T, E>(
    result: std::result::Result<T, E>,
    attempt: u32,
    config: &RetryConfig,
) -> AttemptOutcome<T, E>
where
    E: ClassifyFailure,
{
    match result {
        Ok(value) => AttemptOutcome::Success(value),
        Err(error) => match should_retry(&error, attempt, config) {
            RetryDecision::RetryAfter(delay) => AttemptOutcome::RetryableFailure { error, delay },
            RetryDecision::NoRetry => AttemptOutcome::TerminalFailure(error),
        },
    }
}

/// Shortens `delay` by a random share of up to `factor`. Never lengthens it.
pub fn apply_jitter(delay: Duration, factor: f64) -> Duration {
    if factor <= 0.0 || delay.is_zero() {
        return delay;
    }
    delay.mul_f64(1.0 - factor.min(1.0) * fastrand::f64())
}
