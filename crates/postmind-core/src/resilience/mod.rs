//! Resilience primitives: retry with classified errors and a circuit
//! breaker, composed as breaker(retry(call)) around unreliable
//! dependencies.

mod breaker;
mod retry;

pub use breaker::{CircuitBreaker, CircuitState};
pub use retry::{is_retryable, retry, RetryConfig};
