//! Repository trait contracts.
//!
//! Handlers and services depend on these seams, never on concrete storage
//! types; the Postgres implementations live in `postmind-db` and tests
//! substitute in-memory doubles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    EmailIntegration, RawEmail, Task, TaskFilter, TaskStats, TaskUpdate, User,
};

/// Account storage with version discipline.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a user with `version = 1`. A duplicate email surfaces as
    /// [`crate::Error::EmailAlreadyExists`].
    async fn create(&self, email: &str, password_hash: &str) -> Result<User>;

    async fn find_by_email(&self, email: &str) -> Result<User>;

    async fn find_by_id(&self, id: Uuid) -> Result<User>;

    /// Write the new hash and bump `version` in one statement.
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()>;
}

/// Revoked-token store keyed by hex(SHA-256(token)).
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Insert a token id with its expiry. Re-inserting is a no-op.
    async fn add(&self, token_id: &str, expires_at: DateTime<Utc>) -> Result<()>;

    /// Whether the token id is currently blacklisted.
    async fn contains(&self, token_id: &str) -> Result<bool>;

    /// Remove entries whose expiry has passed. TTL-enforcing backends
    /// return 0.
    async fn sweep_expired(&self) -> Result<u64>;
}

/// Mailbox integration storage.
#[async_trait]
pub trait IntegrationRepository: Send + Sync {
    async fn create(&self, integration: &EmailIntegration) -> Result<()>;

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<EmailIntegration>>;

    async fn find_by_id(&self, id: Uuid) -> Result<EmailIntegration>;

    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Up to `limit` integrations ordered oldest-synced first, with
    /// never-synced rows ahead of everything.
    async fn due_for_sync(&self, limit: i64) -> Result<Vec<EmailIntegration>>;

    /// Bump `last_sync_at` to now.
    async fn mark_synced(&self, id: Uuid) -> Result<()>;
}

/// Raw email storage; `(user_id, message_id)` is the idempotency key.
#[async_trait]
pub trait RawEmailRepository: Send + Sync {
    async fn exists(&self, user_id: Uuid, message_id: &str) -> Result<bool>;

    async fn insert(&self, email: &RawEmail) -> Result<()>;

    async fn mark_processed(&self, id: Uuid) -> Result<()>;
}

/// Task storage and the filtered query engine.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn exists(&self, user_id: Uuid, email_id: Uuid) -> Result<bool>;

    async fn insert(&self, task: &Task) -> Result<()>;

    async fn find(&self, user_id: Uuid, task_id: Uuid) -> Result<Task>;

    /// Ordering contract: `deadline ASC NULLS LAST, created_at DESC`.
    async fn list(&self, user_id: Uuid, filter: &TaskFilter) -> Result<Vec<Task>>;

    /// Partial update; setting `status = completed` also sets
    /// `completed_at` in the same write. An empty update succeeds silently.
    async fn update(&self, user_id: Uuid, task_id: Uuid, update: &TaskUpdate) -> Result<()>;

    async fn delete(&self, user_id: Uuid, task_id: Uuid) -> Result<()>;

    async fn complete(&self, user_id: Uuid, task_id: Uuid) -> Result<()>;

    async fn stats(&self, user_id: Uuid) -> Result<TaskStats>;
}
