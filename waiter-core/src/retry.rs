//! Bounded retry with a fixed delay for remote calls
//!
//! Every outbound call to the authorization and tracking services goes through
//! [`with_retry`]. Each failed attempt is logged before the next one starts; once
//! the attempts are exhausted the last error is returned, tagged with the name of
//! the operation.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Attempts used when a call site does not configure its own policy
const DEFAULT_ATTEMPTS: u32 = 3;

/// Delay between attempts used when a call site does not configure its own policy
const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// How often and how patiently a remote call is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of invocations, including the first one
    pub attempts: u32,
    /// Fixed delay between a failure and the next attempt
    pub interval: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and fixed delay.
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Single attempt, no retry.
    pub const fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Attempt budget with the `attempts >= 1` invariant applied.
    pub fn effective_attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPTS, DEFAULT_INTERVAL)
    }
}

/// Failure of a retried operation after its attempt budget ran out.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed after {attempts} attempt(s): {source}")]
pub struct RetryError<E> {
    /// Name of the wrapped operation, for diagnostics
    pub operation: &'static str,
    /// Number of invocations made
    pub attempts: u32,
    /// Error returned by the last attempt
    #[source]
    pub source: E,
}

impl<E> RetryError<E> {
    /// Consumes the wrapper and returns the last underlying error.
    pub fn into_inner(self) -> E {
        self.source
    }
}

/// Runs `call` until it succeeds or `policy` is exhausted.
///
/// `call` is invoked at most `policy.attempts` times (at least once). Between a
/// failure and the next attempt the current task sleeps for `policy.interval`;
/// other tasks keep running. An attempt either fully succeeds or is discarded.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use waiter_core::retry::{RetryPolicy, with_retry};
///
/// # tokio_test::block_on(async {
/// let policy = RetryPolicy::new(2, Duration::ZERO);
/// let result: Result<u32, _> =
///     with_retry("lookup", policy, || async { Err::<u32, _>("down") }).await;
///
/// assert_eq!(result.unwrap_err().attempts, 2);
/// # });
/// ```
///
/// # Errors
///
/// - `RetryError` - If every attempt failed; carries the last error
pub async fn with_retry<T, E, F, Fut>(
    operation: &'static str,
    policy: RetryPolicy,
    mut call: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.effective_attempts();
    let mut attempt = 1;

    loop {
        match call().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "Remote call succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Remote call failed"
                );

                if attempt >= max_attempts {
                    return Err(RetryError {
                        operation,
                        attempts: attempt,
                        source: e,
                    });
                }

                if !policy.interval.is_zero() {
                    tokio::time::sleep(policy.interval).await;
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    use super::*;

    fn failure(message: &str) -> std::io::Error {
        std::io::Error::other(message.to_string())
    }

    #[tokio::test]
    async fn test_succeeds_after_two_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = with_retry("flaky", RetryPolicy::new(3, Duration::ZERO), || {
            let counter = counter.clone();
            async move {
                let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if call < 3 {
                    Err(failure("not yet"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_return_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> =
            with_retry("always_down", RetryPolicy::new(4, Duration::ZERO), || {
                let counter = counter.clone();
                async move {
                    let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Err(failure(&format!("attempt {call}")))
                }
            })
            .await;

        let error = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(error.operation, "always_down");
        assert_eq!(error.attempts, 4);
        assert_eq!(error.into_inner().to_string(), "attempt 4");
    }

    #[tokio::test]
    async fn test_zero_attempts_still_calls_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> =
            with_retry("zero", RetryPolicy::new(0, Duration::ZERO), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(failure("down")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_interval_separates_attempts() {
        let started = Instant::now();

        let result: Result<(), _> = with_retry(
            "slow",
            RetryPolicy::new(3, Duration::from_millis(20)),
            || async { Err(failure("down")) },
        )
        .await;

        assert!(result.is_err());
        // Two sleeps between three attempts, none after the last one
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_error_message_names_operation() {
        let error = RetryError {
            operation: "fetch_token",
            attempts: 5,
            source: failure("connection refused"),
        };

        assert_eq!(
            error.to_string(),
            "fetch_token failed after 5 attempt(s): connection refused"
        );
    }
}
