//! Auth operations over the repository seams.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::info;

use postmind_core::{defaults, Error, Result, TokenBlacklist, User, UserRepository};
use postmind_crypto::{hash_password, token_id, verify_password};

use crate::tokens::TokenService;

/// Issued token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Registration, login, token lifecycle, and password change.
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    blacklist: Arc<dyn TokenBlacklist>,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        blacklist: Arc<dyn TokenBlacklist>,
        tokens: TokenService,
    ) -> Self {
        Self {
            users,
            blacklist,
            tokens,
        }
    }

    /// Create a user with a bcrypt hash and `version = 1`.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<User> {
        let hash =
            hash_password(password).map_err(|e| Error::Internal(format!("hash password: {e}")))?;
        let user = self.users.create(email, &hash).await?;
        info!(
            subsystem = "auth",
            op = "sign_up",
            user_id = %user.id,
            "User registered"
        );
        Ok(user)
    }

    /// Verify credentials and issue an access/refresh pair.
    ///
    /// Unknown user and bad password produce the same error so account
    /// existence cannot be probed.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<TokenPair> {
        let user = self
            .users
            .find_by_email(email)
            .await
            .map_err(|_| Error::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            return Err(Error::InvalidCredentials);
        }

        Ok(TokenPair {
            access_token: self.tokens.generate_access(&user)?,
            refresh_token: self.tokens.generate_refresh(&user)?,
        })
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Checks, in order: blacklist, signature + expiry, token type, and
    /// version match against the user's current version.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        if self.blacklist.contains(&token_id(refresh_token)).await? {
            return Err(Error::Revoked);
        }

        let claims = self.tokens.validate_refresh(refresh_token)?;
        let user = self.users.find_by_id(claims.user_id).await?;

        if user.version != claims.version {
            return Err(Error::VersionMismatch);
        }

        self.tokens.generate_access(&user)
    }

    /// Validate an access token and return the referenced user.
    ///
    /// A blacklist store failure is fatal to the request: validation
    /// fails closed.
    pub async fn validate(&self, access_token: &str) -> Result<User> {
        if self.blacklist.contains(&token_id(access_token)).await? {
            return Err(Error::Revoked);
        }

        let claims = self.tokens.validate_access(access_token)?;
        self.users.find_by_id(claims.user_id).await
    }

    /// Blacklist both tokens under their own expiries.
    ///
    /// Unparseable tokens fall back to the default TTL so logout still
    /// lands; double logout is a no-op at the store.
    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<()> {
        let access_exp = self
            .tokens
            .expiry(access_token)
            .unwrap_or_else(|| Utc::now() + Duration::seconds(defaults::ACCESS_TOKEN_TTL_SECS));
        let refresh_exp = self
            .tokens
            .expiry(refresh_token)
            .unwrap_or_else(|| Utc::now() + Duration::seconds(defaults::REFRESH_TOKEN_TTL_SECS));

        self.blacklist.add(&token_id(access_token), access_exp).await?;
        self.blacklist
            .add(&token_id(refresh_token), refresh_exp)
            .await?;

        Ok(())
    }

    /// Verify the old password and write the new hash; the version bump
    /// rides the same update, invalidating prior refresh tokens.
    pub async fn change_password(
        &self,
        user_id: uuid::Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let user = self.users.find_by_id(user_id).await?;

        if !verify_password(old_password, &user.password_hash) {
            return Err(Error::InvalidCredentials);
        }

        let hash = hash_password(new_password)
            .map_err(|e| Error::Internal(format!("hash password: {e}")))?;
        self.users.update_password(user_id, &hash).await?;

        info!(
            subsystem = "auth",
            op = "change_password",
            user_id = %user_id,
            "Password changed, refresh tokens invalidated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct MemUsers {
        rows: Mutex<HashMap<Uuid, User>>,
    }

    #[async_trait]
    impl UserRepository for MemUsers {
        async fn create(&self, email: &str, password_hash: &str) -> Result<User> {
            let mut rows = self.rows.lock().unwrap();
            if rows.values().any(|u| u.email == email) {
                return Err(Error::EmailAlreadyExists);
            }
            let now = Utc::now();
            let user = User {
                id: Uuid::new_v4(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                version: 1,
                created_at: now,
                updated_at: now,
            };
            rows.insert(user.id, user.clone());
            Ok(user)
        }

        async fn find_by_email(&self, email: &str) -> Result<User> {
            self.rows
                .lock()
                .unwrap()
                .values()
                .find(|u| u.email == email)
                .cloned()
                .ok_or_else(|| Error::NotFound("user".into()))
        }

        async fn find_by_id(&self, id: Uuid) -> Result<User> {
            self.rows
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| Error::NotFound("user".into()))
        }

        async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            let user = rows.get_mut(&id).ok_or_else(|| Error::NotFound("user".into()))?;
            user.password_hash = password_hash.to_string();
            user.version += 1;
            user.updated_at = Utc::now();
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemBlacklist {
        rows: Mutex<HashMap<String, DateTime<Utc>>>,
    }

    #[async_trait]
    impl TokenBlacklist for MemBlacklist {
        async fn add(&self, token_id: &str, expires_at: DateTime<Utc>) -> Result<()> {
            self.rows
                .lock()
                .unwrap()
                .entry(token_id.to_string())
                .or_insert(expires_at);
            Ok(())
        }

        async fn contains(&self, token_id: &str) -> Result<bool> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .get(token_id)
                .map(|exp| *exp > Utc::now())
                .unwrap_or(false))
        }

        async fn sweep_expired(&self) -> Result<u64> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|_, exp| *exp > Utc::now());
            Ok((before - rows.len()) as u64)
        }
    }

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(MemUsers::default()),
            Arc::new(MemBlacklist::default()),
            TokenService::new("test-secret"),
        )
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in_then_validate() {
        let svc = service();
        let user = svc.sign_up("a@b.io", "password123").await.unwrap();
        assert_eq!(user.version, 1);

        let pair = svc.sign_in("a@b.io", "password123").await.unwrap();
        let validated = svc.validate(&pair.access_token).await.unwrap();
        assert_eq!(validated.id, user.id);
        assert_eq!(validated.email, "a@b.io");

        let new_access = svc.refresh(&pair.refresh_token).await.unwrap();
        assert!(svc.validate(&new_access).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let svc = service();
        svc.sign_up("a@b.io", "password123").await.unwrap();
        let result = svc.sign_up("a@b.io", "password456").await;
        assert!(matches!(result, Err(Error::EmailAlreadyExists)));
    }

    #[tokio::test]
    async fn test_wrong_password_and_missing_user_are_identical() {
        let svc = service();
        svc.sign_up("a@b.io", "password123").await.unwrap();

        let wrong = svc.sign_in("a@b.io", "nope12").await.unwrap_err();
        let missing = svc.sign_in("ghost@b.io", "password123").await.unwrap_err();
        assert_eq!(wrong.to_string(), missing.to_string());
    }

    #[tokio::test]
    async fn test_logout_revokes_both_tokens() {
        let svc = service();
        svc.sign_up("a@b.io", "password123").await.unwrap();
        let pair = svc.sign_in("a@b.io", "password123").await.unwrap();

        svc.logout(&pair.access_token, &pair.refresh_token)
            .await
            .unwrap();

        assert!(matches!(
            svc.validate(&pair.access_token).await,
            Err(Error::Revoked)
        ));
        assert!(matches!(
            svc.refresh(&pair.refresh_token).await,
            Err(Error::Revoked)
        ));
    }

    #[tokio::test]
    async fn test_double_logout_is_noop() {
        let svc = service();
        svc.sign_up("a@b.io", "password123").await.unwrap();
        let pair = svc.sign_in("a@b.io", "password123").await.unwrap();

        svc.logout(&pair.access_token, &pair.refresh_token)
            .await
            .unwrap();
        svc.logout(&pair.access_token, &pair.refresh_token)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_password_change_invalidates_old_refresh() {
        let svc = service();
        let user = svc.sign_up("a@b.io", "password123").await.unwrap();
        let pair = svc.sign_in("a@b.io", "password123").await.unwrap();

        svc.change_password(user.id, "password123", "password456")
            .await
            .unwrap();

        assert!(matches!(
            svc.refresh(&pair.refresh_token).await,
            Err(Error::VersionMismatch)
        ));

        // New credentials work and yield a fresh, valid pair.
        let fresh = svc.sign_in("a@b.io", "password456").await.unwrap();
        assert!(svc.refresh(&fresh.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_change_password_requires_old_password() {
        let svc = service();
        let user = svc.sign_up("a@b.io", "password123").await.unwrap();
        let result = svc.change_password(user.id, "wrong-old", "password456").await;
        assert!(matches!(result, Err(Error::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_validate_rejects_refresh_token() {
        let svc = service();
        svc.sign_up("a@b.io", "password123").await.unwrap();
        let pair = svc.sign_in("a@b.io", "password123").await.unwrap();
        assert!(svc.validate(&pair.refresh_token).await.is_err());
    }
}
