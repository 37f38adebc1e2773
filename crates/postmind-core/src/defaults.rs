//! Tunable defaults shared across the postmind services.
//!
//! Each constant documents the environment variable that overrides it.

/// Mailbox sync tick interval in seconds (`SYNC_INTERVAL`).
pub const SYNC_INTERVAL_SECS: u64 = 30;

/// Integrations fetched per sync tick (`BATCH_SIZE`).
pub const SYNC_BATCH_SIZE: usize = 10;

/// Sync worker pool size (`MAX_WORKERS`).
pub const SYNC_MAX_WORKERS: usize = 5;

/// Raw emails per published envelope. Matches the analyzer's per-envelope
/// concurrency budget: one batch is one consumer's in-flight work item.
pub const PUBLISH_BATCH_SIZE: usize = 7;

/// IMAP per-call timeout in seconds (`IMAP_TIMEOUT`).
pub const IMAP_TIMEOUT_SECS: u64 = 30;

/// Window searched on the first sync of an integration, in hours.
pub const FIRST_SYNC_LOOKBACK_HOURS: i64 = 24;

/// Analyzer workers per envelope.
pub const ANALYZER_WORKERS: usize = 4;

/// LLM request timeout in seconds (`TIMEOUT`).
pub const LLM_TIMEOUT_SECS: u64 = 30;

/// Consecutive failures before the circuit breaker opens.
pub const CIRCUIT_MAX_FAILURES: u32 = 5;

/// Seconds the breaker stays open before admitting a trial call.
pub const CIRCUIT_RESET_SECS: u64 = 30;

/// Retry attempts around the LLM call (`RETRIES`).
pub const RETRY_MAX_ATTEMPTS: u32 = 3;

/// Initial retry delay in milliseconds.
pub const RETRY_INITIAL_DELAY_MS: u64 = 1_000;

/// Retry delay cap in milliseconds.
pub const RETRY_MAX_DELAY_MS: u64 = 10_000;

/// Retry delay multiplier.
pub const RETRY_MULTIPLIER: f64 = 2.0;

/// Concurrent broker readers per queue (`CONSUMER_READERS`).
pub const CONSUMER_READERS: usize = 4;

/// Access token lifetime in seconds (15 minutes).
pub const ACCESS_TOKEN_TTL_SECS: i64 = 900;

/// Refresh token lifetime in seconds (7 days).
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 3600;

/// Database pool sizing: 25 open / 25 idle, 5-minute connection lifetime.
pub const DB_MAX_CONNECTIONS: u32 = 25;
pub const DB_MIN_CONNECTIONS: u32 = 25;
pub const DB_CONN_LIFETIME_SECS: u64 = 300;

/// Graceful HTTP shutdown budget in seconds.
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;
