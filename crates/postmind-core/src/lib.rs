//! # postmind-core
//!
//! Shared foundation for the postmind services:
//!
//! - Domain models and broker wire formats
//! - The common [`Error`] type and HTTP status mapping
//! - Repository trait contracts implemented by `postmind-db`
//! - Structured-logging field constants
//! - Resilience primitives (retry + circuit breaker)

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod resilience;
pub mod traits;

pub use error::{Error, Result};
pub use models::{
    normalize_email, EmailIntegration, ParsedEmail, RawEmail, RawEmailMessage, RawEmailsEnvelope,
    Task, TaskFilter, TaskPriority, TaskStats, TaskStatus, TaskUpdate, User,
};
pub use resilience::{is_retryable, retry, CircuitBreaker, CircuitState, RetryConfig};
pub use traits::{
    IntegrationRepository, RawEmailRepository, TaskRepository, TokenBlacklist, UserRepository,
};
