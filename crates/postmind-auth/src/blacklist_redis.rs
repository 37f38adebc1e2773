//! Redis-backed token blacklist with storage-level TTL.
//!
//! The deployment-selectable alternative to the Postgres table: entries
//! expire on their own, so no sweeper runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use postmind_core::{Error, Result, TokenBlacklist};

const KEY_PREFIX: &str = "blacklist:token:";

/// Redis implementation of [`TokenBlacklist`].
#[derive(Clone)]
pub struct RedisTokenBlacklist {
    connection: ConnectionManager,
}

impl RedisTokenBlacklist {
    /// Connect to Redis at `url` (e.g. `redis://localhost:6379/0`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::Config(format!("invalid redis url: {e}")))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::Internal(format!("redis connect: {e}")))?;

        info!(subsystem = "auth", component = "blacklist", "Redis blacklist connected");
        Ok(Self { connection })
    }
}

#[async_trait]
impl TokenBlacklist for RedisTokenBlacklist {
    async fn add(&self, token_id: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let ttl = (expires_at - Utc::now()).num_seconds();
        // Already past its expiry: nothing to revoke.
        if ttl <= 0 {
            return Ok(());
        }

        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(format!("{KEY_PREFIX}{token_id}"), "1", ttl as u64)
            .await
            .map_err(|e| Error::Internal(format!("add token to blacklist: {e}")))?;
        Ok(())
    }

    async fn contains(&self, token_id: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let found: bool = conn
            .exists(format!("{KEY_PREFIX}{token_id}"))
            .await
            .map_err(|e| Error::Internal(format!("check blacklist: {e}")))?;
        Ok(found)
    }

    async fn sweep_expired(&self) -> Result<u64> {
        // Redis TTL handles expiry.
        Ok(0)
    }
}
