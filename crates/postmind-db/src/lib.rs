//! # postmind-db
//!
//! PostgreSQL storage layer for postmind.
//!
//! One repository per entity, all runtime-checked sqlx queries behind the
//! trait contracts in `postmind-core`. Every user-scoped query carries
//! `user_id` in its predicate; cross-user access is impossible at this
//! layer.

pub mod blacklist;
pub mod integrations;
pub mod pool;
pub mod raw_emails;
pub mod tasks;
pub mod users;

use std::sync::Arc;

pub use blacklist::PgTokenBlacklist;
pub use integrations::PgIntegrationRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use raw_emails::PgRawEmailRepository;
pub use tasks::PgTaskRepository;
pub use users::PgUserRepository;

use postmind_core::Result;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub users: Arc<PgUserRepository>,
    pub blacklist: Arc<PgTokenBlacklist>,
    pub integrations: Arc<PgIntegrationRepository>,
    pub raw_emails: Arc<PgRawEmailRepository>,
    pub tasks: Arc<PgTaskRepository>,
}

impl Database {
    /// Connect with the default pool configuration (25/25, 5-minute
    /// connection lifetime).
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::from_pool(pool))
    }

    /// Build the repository set over an existing pool.
    pub fn from_pool(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            blacklist: Arc::new(PgTokenBlacklist::new(pool.clone())),
            integrations: Arc::new(PgIntegrationRepository::new(pool.clone())),
            raw_emails: Arc::new(PgRawEmailRepository::new(pool.clone())),
            tasks: Arc::new(PgTaskRepository::new(pool.clone())),
            pool,
        }
    }
}

/// Recognize a Postgres unique violation.
///
/// Checks the driver code (23505) first, with a message substring
/// fallback for drivers that do not surface codes.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if db_err.code().as_deref() == Some("23505") {
            return true;
        }
        let message = db_err.message();
        return message.contains("duplicate key") || message.contains("unique constraint");
    }
    false
}
