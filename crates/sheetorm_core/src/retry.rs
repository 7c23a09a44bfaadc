//! Retry with bounded exponential backoff and cooperative cancellation.
//!
//! A single idempotent remote call moves through these states:
//!
//! ```text
//! Idle -> Attempting -> Success
//!                    -> Exhausted     (attempt ceiling reached, last error returned)
//!                    -> NonRetryable  (predicate rejected the error)
//!                    -> Cancelled     (token fired)
//!                    -> BackingOff -> Attempting
//! ```
//!
//! The policy knows nothing about what the call does. Errors are returned
//! unmodified so callers can still match on them.

use crate::config::RetryPolicy;
use crate::error::{SheetError, SheetResult};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// The retry predicate used for spreadsheet API calls: rate limiting (429) and
/// temporary unavailability (503) are worth another try, nothing else is.
pub fn should_retry_api_call(err: &SheetError) -> bool {
    err.is_retryable()
}

/// Executes `operation` until it succeeds, fails for good, or is cancelled.
///
/// # Retry Strategy
///
/// - At most `policy.max_attempts` attempts in total
/// - After the `n`-th failure, waits `min(base * 2^n + jitter, max_delay)`
/// - Errors for which `should_retry` returns false are returned immediately
///
/// # Cancellation Semantics
///
/// - Already cancelled at call time: returns [`SheetError::Cancelled`] without
///   calling `operation`
/// - Cancelled during an attempt: the in-flight attempt is dropped
/// - Cancelled during a backoff wait: the wait is interrupted
///
/// In every case the cancellation is reported, never the last operation error.
pub async fn with_retry<F, Fut, T, P>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    should_retry: P,
    mut operation: F,
) -> SheetResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SheetResult<T>>,
    P: Fn(&SheetError) -> bool,
{
    if cancel.is_cancelled() {
        return Err(SheetError::Cancelled);
    }

    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        tracing::debug!(attempt, max_attempts, "attempting retryable request");

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(attempt, max_attempts, "request cancelled");
                return Err(SheetError::Cancelled);
            }
            result = operation() => result,
        };

        let err = match result {
            Ok(value) => {
                tracing::debug!(attempt, max_attempts, "retryable request succeeded");
                return Ok(value);
            }
            Err(err) => err,
        };

        if attempt >= max_attempts {
            tracing::warn!(attempt, max_attempts, error = %err, "retry limit reached, giving up");
            return Err(err);
        }
        if !should_retry(&err) {
            tracing::warn!(attempt, max_attempts, error = %err, "error is not retryable, giving up");
            return Err(err);
        }

        let delay = policy.delay_for_attempt(attempt, policy.random_jitter());
        tracing::debug!(
            attempt,
            max_attempts,
            backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "request failed, scheduled a retry"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(attempt, max_attempts, "cancelled while backing off");
                return Err(SheetError::Cancelled);
            }
            () = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy::default()
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
            .with_max_jitter(Duration::ZERO)
    }

    fn unavailable() -> SheetError {
        SheetError::transport_status(503, "backend unavailable")
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();

        let result = with_retry(&quick_policy(), &token, should_retry_api_call, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, SheetError>("done") }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();

        let result = with_retry(&quick_policy(), &token, should_retry_api_call, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(SheetError::transport_status(429, "slow down"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn does_all_attempts_if_it_can() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();
        let policy = RetryPolicy::default().with_max_jitter(Duration::ZERO);
        let start = tokio::time::Instant::now();

        let result: SheetResult<()> = with_retry(&policy, &token, |_| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(unavailable()) }
        })
        .await;

        assert!(matches!(result, Err(SheetError::Transport { status: Some(503), .. })));
        assert_eq!(calls.load(Ordering::SeqCst), RetryPolicy::DEFAULT_MAX_ATTEMPTS);
        // 2 + 4 + 8 + 16 + 32 + 32 seconds of backoff
        assert_eq!(start.elapsed(), Duration::from_secs(94));
    }

    #[tokio::test]
    async fn does_not_retry_if_it_should_not() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();

        let result: SheetResult<()> = with_retry(&quick_policy(), &token, |_| false, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(unavailable()) }
        })
        .await;

        assert!(matches!(result, Err(SheetError::Transport { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_retryable_error_is_returned_unmodified() {
        let token = CancellationToken::new();

        let result: SheetResult<()> =
            with_retry(&quick_policy(), &token, should_retry_api_call, || async {
                Err(SheetError::transport_status(404, "no such sheet"))
            })
            .await;

        match result {
            Err(SheetError::Transport { status, message }) => {
                assert_eq!(status, Some(404));
                assert_eq!(message, "no such sheet");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_cancel_during_attempt() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let result: SheetResult<()> = with_retry(&RetryPolicy::default(), &token, |_| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_millis(150)).await;
                Err(unavailable())
            }
        })
        .await;

        assert!(matches!(result, Err(SheetError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_cancel_during_backoff() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            // the first backoff is at least 2 seconds long
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let result: SheetResult<()> = with_retry(&RetryPolicy::default(), &token, |_| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(unavailable()) }
        })
        .await;

        assert!(matches!(result, Err(SheetError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn already_cancelled_makes_no_attempt() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();
        token.cancel();

        let result = with_retry(&quick_policy(), &token, |_| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, SheetError>(()) }
        })
        .await;

        assert!(matches!(result, Err(SheetError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
