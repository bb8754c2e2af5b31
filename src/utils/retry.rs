use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff policy for external calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first try.
    pub max_attempts: u32,
    /// Delay before the second attempt, in seconds.
    pub initial_delay_secs: f64,
    /// Upper bound on the delay between attempts, in seconds.
    pub max_delay_secs: f64,
    /// Multiplier applied to the previous delay on each retry.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_secs: 2.0,
            max_delay_secs: 60.0,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy for unit tests: same attempt counts, no real waiting.
    pub fn instant() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_secs: 0.001,
            max_delay_secs: 0.01,
            multiplier: 2.0,
        }
    }
}

/// Retries an async operation, doubling the delay after each failure
/// (capped at `max_delay_secs`). Returns the first success or the last
/// error once all attempts are exhausted.
pub async fn retry_with_backoff<F, Fut, T, E>(policy: &RetryPolicy, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = policy.initial_delay_secs;
    let mut last_err: Option<E> = None;

    for attempt in 1..=policy.max_attempts.max(1) {
        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "retry succeeded");
                }
                return Ok(value);
            }
            Err(e) => {
                if attempt < policy.max_attempts {
                    tracing::warn!(
                        "Attempt {}/{} failed: {}. Retrying in {:.1}s...",
                        attempt,
                        policy.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                    delay = (delay * policy.multiplier).min(policy.max_delay_secs);
                } else {
                    tracing::warn!("Failed after {} attempts: {}", policy.max_attempts, e);
                    last_err = Some(e);
                }
            }
        }
    }

    Err(last_err.expect("retry loop ended without setting last_err"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_on_first_attempt() {
        let policy = RetryPolicy::instant();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result: Result<u32, String> = retry_with_backoff(&policy, || {
            let c = calls2.clone();
            async move {
                c.fetch_add(1, Ordering::Relaxed);
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt() {
        let policy = RetryPolicy::instant();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result: Result<u32, String> = retry_with_backoff(&policy, || {
            let c = calls2.clone();
            async move {
                let n = c.fetch_add(1, Ordering::Relaxed) + 1;
                if n < 3 {
                    Err(format!("attempt {} failed", n))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn returns_last_error_after_all_attempts() {
        let policy = RetryPolicy::instant();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result: Result<u32, String> = retry_with_backoff(&policy, || {
            let c = calls2.clone();
            async move {
                c.fetch_add(1, Ordering::Relaxed);
                Err("permanent error".to_string())
            }
        })
        .await;

        assert_eq!(result.unwrap_err(), "permanent error");
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn delay_is_capped_at_max() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay_secs: 0.001,
            max_delay_secs: 0.005,
            multiplier: 10.0,
        };
        let start = std::time::Instant::now();

        let _: Result<(), String> =
            retry_with_backoff(&policy, || async { Err("fail".to_string()) }).await;

        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
