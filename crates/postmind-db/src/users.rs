//! User repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use postmind_core::{Error, Result, User, UserRepository};

use crate::is_unique_violation;

/// PostgreSQL implementation of [`UserRepository`].
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> User {
        User {
            id: row.get("id"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            version: row.get("version"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, email: &str, password_hash: &str) -> Result<User> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let result = sqlx::query(
            r#"INSERT INTO users (id, email, password_hash, version, created_at, updated_at)
               VALUES ($1, $2, $3, 1, $4, $4)"#,
        )
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(User {
                id,
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                version: 1,
                created_at: now,
                updated_at: now,
            }),
            Err(e) if is_unique_violation(&e) => Err(Error::EmailAlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<User> {
        let row = sqlx::query(
            r#"SELECT id, email, password_hash, version, created_at, updated_at
               FROM users WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::parse_row)
            .ok_or_else(|| Error::NotFound("user".into()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<User> {
        let row = sqlx::query(
            r#"SELECT id, email, password_hash, version, created_at, updated_at
               FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::parse_row)
            .ok_or_else(|| Error::NotFound("user".into()))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        // Hash and version move together so old refresh tokens die with
        // the old password.
        let result = sqlx::query(
            r#"UPDATE users
               SET password_hash = $1, version = version + 1, updated_at = $2
               WHERE id = $3"#,
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound("user".into()));
        }
        Ok(())
    }
}
