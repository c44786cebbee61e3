//! Bounded retry policy for per-item work.
//!
//! The policy distinguishes two failure classes: a provider throttle gets
//! a fixed blocking wait before the re-attempt, anything else is retried
//! immediately. Sleeping goes through the [`Sleeper`] trait so tests run
//! without real time.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::RetryConfig;
use crate::error::is_rate_limited;
use crate::progress::{ProgressEvent, ProgressReporter};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per operation, the first one included.
    pub max_attempts: u32,
    /// Fixed wait before re-attempting a rate-limited operation.
    pub rate_limit_wait: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            rate_limit_wait: Duration::from_secs(config.rate_limit_wait_secs),
        }
    }
}

/// Sleep abstraction so the wait-and-retry behavior is testable.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Run `operation` under `policy`. Returns the first success or the error
/// of the final attempt.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    reporter: &dyn ProgressReporter,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_attempts {
                    return Err(err);
                }
                if is_rate_limited(&err) {
                    reporter.report(ProgressEvent::RateLimitWait {
                        wait_secs: policy.rate_limit_wait.as_secs(),
                    });
                    sleeper.sleep(policy.rate_limit_wait).await;
                }
            }
        }
    }
}

/// Records requested sleeps instead of waiting. Test-only.
#[cfg(test)]
pub(crate) struct RecordingSleeper {
    pub(crate) slept: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl RecordingSleeper {
    pub(crate) fn new() -> Self {
        Self {
            slept: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::progress::NoProgress;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            rate_limit_wait: Duration::from_secs(300),
        }
    }

    #[tokio::test]
    async fn succeeds_first_try_without_sleeping() {
        let sleeper = RecordingSleeper::new();
        let result = run_with_retry(&policy(), &sleeper, &NoProgress, || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rate_limit_waits_then_retries_once() {
        let sleeper = RecordingSleeper::new();
        let calls = AtomicU32::new(0);

        let result = run_with_retry(&policy(), &sleeper, &NoProgress, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(anyhow::Error::from(ApiError::RateLimited { reset: None }))
                } else {
                    Ok("recovered")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            *sleeper.slept.lock().unwrap(),
            vec![Duration::from_secs(300)]
        );
    }

    #[tokio::test]
    async fn transient_failure_retries_immediately() {
        let sleeper = RecordingSleeper::new();
        let calls = AtomicU32::new(0);

        let result = run_with_retry(&policy(), &sleeper, &NoProgress, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(anyhow::anyhow!("connection reset"))
                } else {
                    Ok(1)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // No wait for non-throttle failures.
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_failure_is_returned() {
        let sleeper = RecordingSleeper::new();
        let calls = AtomicU32::new(0);

        let result: Result<()> = run_with_retry(&policy(), &sleeper, &NoProgress, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::anyhow!("still broken")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
