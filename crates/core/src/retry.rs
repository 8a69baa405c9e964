//! Bounded exponential-backoff retry for transient external failures.
//!
//! Used for storage reads/writes and task progress publication. Every wait
//! between attempts observes the job's [`CancellationToken`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: 4,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

/// Calculate the next backoff delay from the current delay and policy.
///
/// The result is clamped to [`RetryPolicy::max_delay`].
pub fn next_delay(current: Duration, policy: &RetryPolicy) -> Duration {
    let next_ms = (current.as_millis() as f64 * policy.multiplier) as u64;
    Duration::from_millis(next_ms).min(policy.max_delay)
}

/// Why a retried operation gave up.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("cancelled")]
    Cancelled,

    #[error("failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// The operation failed with an error the caller does not retry.
    #[error("{0}")]
    Permanent(E),
}

impl<E> RetryError<E> {
    /// The underlying error, if the operation ran and failed.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Cancelled => None,
            Self::Exhausted { last, .. } | Self::Permanent(last) => Some(last),
        }
    }
}

/// Run `op` until it succeeds, the policy is exhausted, `is_transient`
/// rejects the error, or `cancel` fires.
///
/// `op` receives the 1-based attempt number.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: &str,
    is_transient: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut delay = policy.initial_delay;
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !is_transient(&err) {
            return Err(RetryError::Permanent(err));
        }
        if attempt == max_attempts {
            tracing::error!(operation, attempt, error = %err, "Giving up after all retries");
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: err,
            });
        }

        tracing::warn!(
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Attempt failed, retrying",
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        delay = next_delay(delay, policy);
    }

    unreachable!("loop returns on the last attempt")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use assert_matches::assert_matches;

    use super::*;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            max_attempts,
        }
    }

    #[test]
    fn full_backoff_sequence() {
        let policy = RetryPolicy::default();
        let mut delay = policy.initial_delay;
        let expected = [1, 2, 4, 8, 16, 30, 30];

        for &expected_secs in &expected {
            assert_eq!(delay.as_secs(), expected_secs);
            delay = next_delay(delay, &policy);
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let out: Result<u32, RetryError<String>> = retry_with_backoff(
            &fast(5),
            &CancellationToken::new(),
            "test",
            |_| true,
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err("transient".to_string())
                    } else {
                        Ok(attempt)
                    }
                }
            },
        )
        .await;
        assert_eq!(out.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let out: Result<(), RetryError<String>> = retry_with_backoff(
            &fast(3),
            &CancellationToken::new(),
            "test",
            |_| true,
            |_| async { Err("down".to_string()) },
        )
        .await;
        assert_matches!(out, Err(RetryError::Exhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let out: Result<(), RetryError<String>> = retry_with_backoff(
            &fast(5),
            &CancellationToken::new(),
            "test",
            |e: &String| e != "not found",
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("not found".to_string()) }
            },
        )
        .await;
        assert_matches!(out, Err(RetryError::Permanent(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out: Result<(), RetryError<String>> =
            retry_with_backoff(&fast(3), &cancel, "test", |_| true, |_| async { Ok(()) }).await;
        assert_matches!(out, Err(RetryError::Cancelled));
    }
}
