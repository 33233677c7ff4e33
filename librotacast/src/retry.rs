//! Bounded retry with backoff for content fetches
//!
//! Only failures are retried. A successful result is returned immediately
//! even when it is empty, so a quiet feed never triggers a retry storm.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed,
    /// Delay doubles after each failed attempt
    Exponential,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
    /// Upper bound on a single attempt; an attempt that overruns counts as failed
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
            backoff: Backoff::Exponential,
            attempt_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries once and never waits
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
            backoff: Backoff::Fixed,
            attempt_timeout: None,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.delay.saturating_mul(factor)
            }
        }
    }

    /// Run `op` until it succeeds or attempts are exhausted.
    ///
    /// Returns `None` after the final failure instead of the underlying
    /// error; callers treat that the same as an empty result.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let outcome = match self.attempt_timeout {
                Some(limit) => match timeout(limit, op()).await {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(_) => Err(format!("timed out after {:?}", limit)),
                },
                None => op().await.map_err(|e| e.to_string()),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        info!(label, attempt, "Succeeded after retry");
                    }
                    return Some(value);
                }
                Err(e) if attempt < max_attempts => {
                    let wait = self.delay_for(attempt);
                    warn!(
                        label,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Attempt failed, retrying in {:?}",
                        wait
                    );
                    if !wait.is_zero() {
                        sleep(wait).await;
                    }
                }
                Err(e) => {
                    warn!(label, attempts = max_attempts, error = %e, "Giving up");
                }
            }
        }

        debug!(label, "Retries exhausted, returning no result");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::ZERO,
            backoff: Backoff::Fixed,
            attempt_timeout: None,
        }
    }

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy {
            delay: Duration::from_secs(1),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[test]
    fn test_fixed_delays() {
        let policy = RetryPolicy {
            delay: Duration::from_millis(500),
            backoff: Backoff::Fixed,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(5), Duration::from_millis(500));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let policy = RetryPolicy::default();
        let _ = policy.delay_for(200);
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let calls = AtomicU32::new(0);
        let result = instant_policy(3)
            .run("fetch", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(vec![1, 2])
            })
            .await;

        assert_eq!(result, Some(vec![1, 2]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_result_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result = instant_policy(3)
            .run("fetch", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<Vec<u8>, String>(vec![])
            })
            .await;

        assert_eq!(result, Some(vec![]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_failures() {
        let calls = AtomicU32::new(0);
        let result = instant_policy(3)
            .run("fetch", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("boom {}", n))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_none() {
        let calls = AtomicU32::new(0);
        let result: Option<u32> = instant_policy(3)
            .run("fetch", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>("connection refused")
            })
            .await;

        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let _ = instant_policy(0)
            .run("fetch", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("nope")
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out_and_retries() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            attempt_timeout: Some(Duration::from_millis(20)),
            ..instant_policy(2)
        };

        let result = policy
            .run("fetch", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 1 {
                    sleep(Duration::from_secs(5)).await;
                }
                Ok::<_, String>(n)
            })
            .await;

        assert_eq!(result, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
