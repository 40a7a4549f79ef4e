// Backoff executor
// Author: kelexine (https://github.com/kelexine)

use super::policy::{apply_jitter, classify_attempt, Abortable, AttemptOutcome, ClassifyFailure};
use super::RetryConfig;
use std::future::Future;

/// Runs an async operation until it succeeds or the retry policy gives up.
///
/// Attempts for one `execute` call are strictly sequential. The executor
/// holds no shared state, so independent calls may overlap freely, and it
/// does not log; callers wrap it with whatever telemetry they need.
#[derive(Debug, Clone, Default)]
pub struct BackoffExecutor {
    config: RetryConfig,
}

impl BackoffExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Invokes `operation`, sleeping between retryable failures.
    ///
    /// Terminal failures are returned exactly as the operation produced them.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ClassifyFailure,
    {
        let mut attempt = 1u32;

        loop {
            match classify_attempt(operation().await, attempt, &self.config) {
                AttemptOutcome::Success(value) => return Ok(value),
                AttemptOutcome::TerminalFailure(error) => return Err(error),
                AttemptOutcome::RetryableFailure { delay, .. } => {
                    tokio::time::sleep(apply_jitter(delay, self.config.jitter_factor())).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Same as [`execute`](Self::execute), but gives up with `E::aborted()`
    /// as soon as `abort` completes. An abort is never retried.
    pub async fn execute_cancellable<F, Fut, T, E, A>(&self, operation: F, abort: A) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ClassifyFailure + Abortable,
        A: Future<Output = ()>,
    {
        tokio::select! {
            result = self.execute(operation) => result,
            () = abort => Err(E::aborted()),
        }
    }
}
