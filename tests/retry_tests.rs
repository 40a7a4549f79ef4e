// Retry policy and backoff executor tests
// Author: kelexine (https://github.com/kelexine)

use session_recovery::error::{RequestError, TransportCode};
use session_recovery::retry::{
    backoff_delay, should_retry, BackoffExecutor, RetryConfig, RetryDecision,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn server_error() -> RequestError {
    RequestError::Status {
        status: 503,
        body: "unavailable".to_string(),
    }
}

#[test]
fn test_delay_for_every_attempt_in_budget() {
    let config = RetryConfig::new(5, 250, 3000).unwrap();
    let expected = [250u64, 500, 1000, 2000, 3000, 3000];

    for (i, ms) in expected.iter().enumerate() {
        assert_eq!(backoff_delay(i as u32 + 1, &config), Duration::from_millis(*ms));
    }
}

#[test]
fn test_last_attempt_never_retries() {
    let config = RetryConfig::new(3, 1000, 10000).unwrap();
    let error = RequestError::Network("offline".to_string());

    assert_eq!(
        should_retry(&error, 3, &config),
        RetryDecision::RetryAfter(Duration::from_millis(4000))
    );
    assert_eq!(should_retry(&error, 4, &config), RetryDecision::NoRetry);
}

#[test]
fn test_retryable_transport_codes() {
    let config = RetryConfig::default();
    for code in [
        TransportCode::NetworkUnreachable,
        TransportCode::ResourceExhausted,
        TransportCode::TimedOut,
    ] {
        let error = RequestError::Transport {
            code,
            message: String::new(),
        };
        assert!(matches!(
            should_retry(&error, 1, &config),
            RetryDecision::RetryAfter(_)
        ));
    }
}

#[tokio::test(start_paused = true)]
async fn test_network_failures_then_success() {
    let executor = BackoffExecutor::new(RetryConfig::new(3, 1000, 10000).unwrap());
    let calls = AtomicU32::new(0);
    let start = Instant::now();

    let value = executor
        .execute(|| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt < 4 {
                    Err(RequestError::Network("no response".to_string()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, 4);
    assert_eq!(start.elapsed(), Duration::from_millis(1000 + 2000 + 4000));
}

#[tokio::test(start_paused = true)]
async fn test_invocations_bounded_by_budget() {
    for max_retries in 0..5u32 {
        let executor = BackoffExecutor::new(RetryConfig::new(max_retries, 10, 40).unwrap());
        let calls = AtomicU32::new(0);

        let result: Result<(), RequestError> = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(server_error()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), max_retries + 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_not_found_rethrown_immediately() {
    let executor = BackoffExecutor::default();
    let calls = AtomicU32::new(0);
    let start = Instant::now();

    let error = executor
        .execute(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(RequestError::Status {
                    status: 404,
                    body: "missing".to_string(),
                })
            }
        })
        .await
        .unwrap_err();

    match error {
        RequestError::Status { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "missing");
        }
        other => panic!("error was rewrapped: {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_independent_calls_overlap() {
    let executor = Arc::new(BackoffExecutor::new(RetryConfig::new(2, 1000, 1000).unwrap()));
    let start = Instant::now();

    let run = |executor: Arc<BackoffExecutor>| async move {
        let calls = AtomicU32::new(0);
        executor
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(server_error())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
    };

    let (a, b) = tokio::join!(run(executor.clone()), run(executor.clone()));

    assert_eq!(a.unwrap(), 2);
    assert_eq!(b.unwrap(), 2);
    // Both calls waited 2s each, concurrently.
    assert_eq!(start.elapsed(), Duration::from_millis(2000));
}

#[tokio::test(start_paused = true)]
async fn test_jitter_stays_within_bounded_delay() {
    let config = RetryConfig::new(3, 1000, 10000)
        .unwrap()
        .with_jitter(0.5)
        .unwrap();
    let executor = BackoffExecutor::new(config);
    let start = Instant::now();

    let result: Result<(), RequestError> = executor
        .execute(|| async { Err(RequestError::Network("down".to_string())) })
        .await;

    assert!(result.is_err());
    let elapsed = start.elapsed();
    assert!(elapsed <= Duration::from_millis(7000));
    assert!(elapsed >= Duration::from_millis(3500));
}
