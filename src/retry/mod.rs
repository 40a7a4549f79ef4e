//! Retry classification and the backoff executor.
//!
//! `policy` decides, as a pure function of error class, attempt number and
//! configuration, whether another attempt is made and after what delay.
//! `executor` drives an async operation under that policy.
//!
//! Author: kelexine (<https://github.com/kelexine>)

mod executor;
mod policy;

pub use executor::BackoffExecutor;
pub use policy::{
    apply_jitter, backoff_delay, classify_attempt, should_retry, Abortable, AttemptOutcome,
    ClassifyFailure, FailureClass, RetryConfig, RetryDecision,
};
