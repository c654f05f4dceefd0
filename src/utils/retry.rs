use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Exponential backoff policy for transient store failures.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Errors worth retrying versus ones that will never succeed.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

#[derive(Debug)]
pub enum RetryError<E> {
    /// Still failing after the final attempt.
    Exhausted(E),
    /// Non-transient error; retrying would not help.
    Permanent(E),
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted(e) | RetryError::Permanent(e) => e,
        }
    }
}

/// Runs `op` until it succeeds, fails permanently, or exhausts the
/// policy, doubling the delay between attempts up to `max_delay`.
pub async fn retry<F, Fut, T, E>(policy: &RetryPolicy, mut op: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display + Transient,
{
    let mut delay = policy.initial_delay;

    for attempt in 1..=policy.max_attempts {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if !error.is_transient() => {
                return Err(RetryError::Permanent(error));
            }
            Err(error) if attempt == policy.max_attempts => {
                tracing::error!(
                    attempt,
                    error = %error,
                    "operation failed after all retries"
                );
                return Err(RetryError::Exhausted(error));
            }
            Err(error) => {
                tracing::warn!(
                    attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "transient failure, retrying after delay"
                );
                sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
            }
        }
    }

    unreachable!("max_attempts is at least 1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct TestError {
        transient: bool,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (transient: {})", self.transient)
        }
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_eventually() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry(&fast_policy(), || {
            let counter = counter_clone.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TestError { transient: true })
                } else {
                    Ok("success")
                }
            }
        })
        .await;

        assert!(matches!(result, Ok("success")));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_on_persistent_transient_failure() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: Result<(), _> = retry(&fast_policy(), || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(TestError { transient: true })
            }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Exhausted(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_short_circuits() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: Result<(), _> = retry(&fast_policy(), || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(TestError { transient: false })
            }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Permanent(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
