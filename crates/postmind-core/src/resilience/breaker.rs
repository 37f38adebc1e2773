//! Three-state circuit breaker guarding a flaky dependency.

use std::future::Future;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::defaults;
use crate::error::{Error, Result};

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; consecutive failures are counted.
    Closed,
    /// Calls are rejected until the reset timeout elapses.
    Open,
    /// One trial call is admitted; success fully closes the breaker.
    HalfOpen,
}

struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_fail_time: Option<Instant>,
}

/// Circuit breaker with mutex-guarded state transitions.
///
/// Critical sections are short and hold no I/O; the guarded call runs
/// with no lock held.
pub struct CircuitBreaker {
    max_failures: u32,
    reset_timeout: Duration,
    inner: RwLock<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(max_failures: u32, reset_timeout: Duration) -> Self {
        Self {
            max_failures,
            reset_timeout,
            inner: RwLock::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_fail_time: None,
            }),
        }
    }

    /// Breaker with the service defaults: 5 consecutive failures, 30s reset.
    pub fn with_defaults() -> Self {
        Self::new(
            defaults::CIRCUIT_MAX_FAILURES,
            Duration::from_secs(defaults::CIRCUIT_RESET_SECS),
        )
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner).state
    }

    /// Run `op` through the breaker.
    ///
    /// While open, returns [`Error::CircuitOpen`] without invoking `op`.
    /// Once the reset timeout has elapsed the next call transitions to
    /// half-open and is admitted as the trial.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let state = self.state();

        if state == CircuitState::Open {
            // Upgrade to a write lock for the Open -> HalfOpen transition.
            let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            let elapsed = inner
                .last_fail_time
                .map(|t| t.elapsed() >= self.reset_timeout)
                .unwrap_or(true);
            if elapsed {
                inner.state = CircuitState::HalfOpen;
                inner.failure_count = 0;
            } else {
                return Err(Error::CircuitOpen);
            }
        }

        let result = op().await;

        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        match &result {
            Err(_) => {
                inner.failure_count += 1;
                inner.last_fail_time = Some(Instant::now());
                if inner.failure_count >= self.max_failures {
                    if inner.state != CircuitState::Open {
                        warn!(
                            failures = inner.failure_count,
                            "circuit breaker opened"
                        );
                    }
                    inner.state = CircuitState::Open;
                }
            }
            Ok(_) => {
                inner.failure_count = 0;
                if inner.state == CircuitState::HalfOpen {
                    inner.state = CircuitState::Closed;
                }
            }
        }

        result
    }
}
