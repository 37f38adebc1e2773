//! Raw email repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use postmind_core::{RawEmail, RawEmailRepository, Result};

/// PostgreSQL implementation of [`RawEmailRepository`].
pub struct PgRawEmailRepository {
    pool: Pool<Postgres>,
}

impl PgRawEmailRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RawEmailRepository for PgRawEmailRepository {
    async fn exists(&self, user_id: Uuid, message_id: &str) -> Result<bool> {
        let row = sqlx::query(
            r#"SELECT EXISTS(
                 SELECT 1 FROM raw_emails WHERE user_id = $1 AND message_id = $2
               ) AS found"#,
        )
        .bind(user_id)
        .bind(message_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("found"))
    }

    async fn insert(&self, email: &RawEmail) -> Result<()> {
        // (user_id, message_id) is the sync idempotency key; overlapping
        // tick cycles may race the exists() check, so the conflict is
        // swallowed here.
        sqlx::query(
            r#"INSERT INTO raw_emails
               (id, user_id, message_id, from_address, subject, body_text,
                date_received, processed, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               ON CONFLICT (user_id, message_id) DO NOTHING"#,
        )
        .bind(email.id)
        .bind(email.user_id)
        .bind(&email.message_id)
        .bind(&email.from_address)
        .bind(&email.subject)
        .bind(&email.body_text)
        .bind(email.date_received)
        .bind(email.processed)
        .bind(email.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_processed(&self, id: Uuid) -> Result<()> {
        sqlx::query(r#"UPDATE raw_emails SET processed = TRUE WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
