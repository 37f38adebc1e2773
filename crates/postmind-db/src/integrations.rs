//! Email integration repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use postmind_core::{EmailIntegration, Error, IntegrationRepository, Result};

use crate::is_unique_violation;

/// PostgreSQL implementation of [`IntegrationRepository`].
pub struct PgIntegrationRepository {
    pool: Pool<Postgres>,
}

impl PgIntegrationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> EmailIntegration {
        EmailIntegration {
            id: row.get("id"),
            user_id: row.get("user_id"),
            email_address: row.get("email_address"),
            imap_host: row.get("imap_host"),
            imap_port: row.get("imap_port"),
            use_ssl: row.get("use_ssl"),
            password: row.get("password"),
            last_sync_at: row.get("last_sync_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

const INTEGRATION_COLUMNS: &str = r#"id, user_id, email_address, imap_host, imap_port, use_ssl,
       password, last_sync_at, created_at, updated_at"#;

#[async_trait]
impl IntegrationRepository for PgIntegrationRepository {
    async fn create(&self, integration: &EmailIntegration) -> Result<()> {
        let result = sqlx::query(
            r#"INSERT INTO email_integrations
               (id, user_id, email_address, imap_host, imap_port, use_ssl,
                password, last_sync_at, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(integration.id)
        .bind(integration.user_id)
        .bind(&integration.email_address)
        .bind(&integration.imap_host)
        .bind(integration.imap_port)
        .bind(integration.use_ssl)
        .bind(&integration.password)
        .bind(integration.last_sync_at)
        .bind(integration.created_at)
        .bind(integration.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::Conflict(
                "Integration already exists for this email address".into(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<EmailIntegration>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {INTEGRATION_COLUMNS}
               FROM email_integrations
               WHERE user_id = $1
               ORDER BY created_at DESC"#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<EmailIntegration> {
        let row = sqlx::query(&format!(
            r#"SELECT {INTEGRATION_COLUMNS}
               FROM email_integrations
               WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::parse_row)
            .ok_or(Error::IntegrationNotFound(id))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        // No cascade: raw emails and tasks keep their history, and the
        // (user_id, message_id) guard still blocks re-ingest.
        let result = sqlx::query(r#"DELETE FROM email_integrations WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::IntegrationNotFound(id));
        }
        Ok(())
    }

    async fn due_for_sync(&self, limit: i64) -> Result<Vec<EmailIntegration>> {
        // Never-synced first, then oldest sync first. Fairness without a
        // priority queue.
        let rows = sqlx::query(&format!(
            r#"SELECT {INTEGRATION_COLUMNS}
               FROM email_integrations
               ORDER BY last_sync_at ASC NULLS FIRST
               LIMIT $1"#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn mark_synced(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"UPDATE email_integrations SET last_sync_at = $1, updated_at = $1 WHERE id = $2"#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
