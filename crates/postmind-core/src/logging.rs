//! Structured logging field names used across every postmind service.
//!
//! All crates log through these constants so aggregation tools can query
//! by the same field names regardless of which service emitted the event.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, sync/consume completions |
//! | DEBUG | Decision points, config choices |
//! | TRACE | Per-message iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated request → broker message → consumer.
pub const REQUEST_ID: &str = "request_id";

/// Service originating the event.
/// Values: "auth", "mailbox", "analyzer", "collector", "gateway"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a service.
/// Examples: "scheduler", "syncer", "breaker", "publisher", "consumer"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "sync_integration", "publish", "validate", "ingest"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

pub const USER_ID: &str = "user_id";
pub const INTEGRATION_ID: &str = "integration_id";
pub const EMAIL_ID: &str = "email_id";
pub const TASK_ID: &str = "task_id";
pub const QUEUE: &str = "queue";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Messages found / rows returned.
pub const RESULT_COUNT: &str = "result_count";

/// Emails in the published batch.
pub const BATCH_SIZE: &str = "batch_size";

// ─── Outcome fields ────────────────────────────────────────────────────────

pub const SUCCESS: &str = "success";
pub const ERROR_MSG: &str = "error";
