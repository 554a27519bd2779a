//! Retry policy with exponential backoff.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Tunable retry behavior, injected wherever a network call may be retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. 2 means one retry.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling for the backoff.
    pub max_delay: Duration,
    /// Backoff multiplier applied after each retry.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Never retries; useful in tests.
    #[must_use]
    pub fn none() -> Self {
        Self::new(1)
    }
}

/// What happened across all attempts.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success(T),
    Failed { last_error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryResult::Success(value) => Ok(value),
            RetryResult::Failed { last_error, .. } => Err(last_error),
        }
    }
}

/// Determines if an error is worth another attempt. Permanent failures
/// (auth, malformed requests) must return false so misconfiguration is not
/// masked as flakiness.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Execute an async operation under the given policy.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> RetryResult<T, E>
where
    E: Retryable + std::fmt::Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempts = 0;
    let mut delay = policy.initial_delay;

    loop {
        attempts += 1;

        match operation().await {
            Ok(value) => return RetryResult::Success(value),
            Err(error) => {
                if attempts >= policy.max_attempts || !error.is_retryable() {
                    return RetryResult::Failed {
                        last_error: error,
                        attempts,
                    };
                }

                tracing::debug!(attempt = attempts, ?error, "retrying after backoff");
                sleep(delay).await;

                delay = Duration::from_secs_f64(delay.as_secs_f64() * policy.multiplier)
                    .min(policy.max_delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError(&'static str);

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.0 == "transient"
        }
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let counter = AtomicU32::new(0);
        let result = with_retry(&RetryPolicy::default(), || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, TestError>("ok")
        })
        .await;

        assert!(matches!(result, RetryResult::Success("ok")));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_error_retried_once() {
        let counter = AtomicU32::new(0);
        let policy = RetryPolicy::default().with_initial_delay(Duration::from_millis(5));
        let result = with_retry(&policy, || async {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(TestError("transient"))
            } else {
                Ok("ok")
            }
        })
        .await;

        assert!(matches!(result, RetryResult::Success("ok")));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let counter = AtomicU32::new(0);
        let result = with_retry(&RetryPolicy::default(), || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(TestError("permanent"))
        })
        .await;

        match result {
            RetryResult::Failed { attempts, .. } => assert_eq!(attempts, 1),
            RetryResult::Success(_) => panic!("expected failure"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_bounded() {
        let counter = AtomicU32::new(0);
        let policy = RetryPolicy::new(2).with_initial_delay(Duration::from_millis(5));
        let result = with_retry(&policy, || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(TestError("transient"))
        })
        .await;

        match result {
            RetryResult::Failed { attempts, .. } => assert_eq!(attempts, 2),
            RetryResult::Success(_) => panic!("expected failure"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
