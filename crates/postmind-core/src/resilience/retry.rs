//! Bounded exponential-backoff retry with a retryability classifier.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::defaults;
use crate::error::{Error, Result};

/// Retry policy: attempt count and backoff shape.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Cap applied after each multiplication.
    pub max_delay: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::RETRY_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(defaults::RETRY_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(defaults::RETRY_MAX_DELAY_MS),
            multiplier: defaults::RETRY_MULTIPLIER,
        }
    }
}

/// Whether an error is worth retrying.
///
/// Cancellation and circuit rejection never retry. Otherwise the decision
/// is a case-sensitive substring match on the rendered message, the same
/// contract external callers observe.
pub fn is_retryable(err: &Error) -> bool {
    if matches!(err, Error::Cancelled | Error::CircuitOpen) {
        return false;
    }

    const RETRYABLE_MARKERS: [&str; 6] = [
        "timeout",
        "connection",
        "network",
        "temporary",
        "rate limit",
        "too many requests",
    ];

    let message = err.to_string();
    RETRYABLE_MARKERS.iter().any(|m| message.contains(m))
}

/// Run `op` up to `cfg.max_attempts` times.
///
/// Delays only between attempts, never after the last. A non-retryable
/// error short-circuits immediately. Dropping the returned future cancels
/// between attempts.
pub async fn retry<T, F, Fut>(cfg: &RetryConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = cfg.initial_delay;
    let mut last_err = Error::Internal("retry invoked with zero attempts".into());

    for attempt in 0..cfg.max_attempts.max(1) {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retryable(&err) {
                    return Err(err);
                }
                warn!(attempt, error = %err, "retrying after transient failure");
                last_err = err;
            }
        }

        if attempt + 1 < cfg.max_attempts {
            tokio::time::sleep(delay).await;
            delay = delay.mul_f64(cfg.multiplier).min(cfg.max_delay);
        }
    }

    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_default_config() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.initial_delay, Duration::from_secs(1));
        assert_eq!(cfg.max_delay, Duration::from_secs(10));
        assert_eq!(cfg.multiplier, 2.0);
    }

    #[test]
    fn test_cancelled_is_not_retryable() {
        assert!(!is_retryable(&Error::Cancelled));
    }

    #[test]
    fn test_circuit_open_is_not_retryable() {
        assert!(!is_retryable(&Error::CircuitOpen));
    }

    #[test]
    fn test_timeout_is_retryable() {
        assert!(is_retryable(&Error::Inference("request timeout".into())));
    }

    #[test]
    fn test_connection_and_rate_limit_are_retryable() {
        assert!(is_retryable(&Error::Broker("connection refused".into())));
        assert!(is_retryable(&Error::Inference("rate limit exceeded".into())));
        assert!(is_retryable(&Error::Inference(
            "429 too many requests".into()
        )));
    }

    #[test]
    fn test_markers_are_case_sensitive() {
        assert!(!is_retryable(&Error::Inference("Timeout".into())));
    }

    #[test]
    fn test_plain_failure_is_not_retryable() {
        assert!(!is_retryable(&Error::Inference("invalid api key".into())));
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_second_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = retry(&fast_config(), move || {
            let calls = calls_clone.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Error::Inference("timeout".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<()> = retry(&fast_config(), move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Inference("timeout".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_short_circuits() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<()> = retry(&fast_config(), move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Inference("quota exhausted".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
