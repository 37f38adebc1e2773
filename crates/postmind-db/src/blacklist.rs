//! Postgres token blacklist.
//!
//! Rows are keyed by hex(SHA-256(token)); expiry enforcement is a
//! periodic sweep rather than storage-level TTL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use postmind_core::{Result, TokenBlacklist};

/// PostgreSQL implementation of [`TokenBlacklist`].
pub struct PgTokenBlacklist {
    pool: Pool<Postgres>,
}

impl PgTokenBlacklist {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenBlacklist for PgTokenBlacklist {
    async fn add(&self, token_id: &str, expires_at: DateTime<Utc>) -> Result<()> {
        // ON CONFLICT DO NOTHING makes double-logout a no-op.
        sqlx::query(
            r#"INSERT INTO blacklisted_tokens (token_id, expires_at, created_at)
               VALUES ($1, $2, $3)
               ON CONFLICT (token_id) DO NOTHING"#,
        )
        .bind(token_id)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn contains(&self, token_id: &str) -> Result<bool> {
        let row = sqlx::query(
            r#"SELECT COUNT(*) AS count FROM blacklisted_tokens
               WHERE token_id = $1 AND expires_at > $2"#,
        )
        .bind(token_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    async fn sweep_expired(&self) -> Result<u64> {
        let result = sqlx::query(r#"DELETE FROM blacklisted_tokens WHERE expires_at < $1"#)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
