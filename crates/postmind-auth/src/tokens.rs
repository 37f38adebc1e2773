//! HS256 token minting and validation.
//!
//! Two JWTs: a short-lived access token carrying the user's email, and a
//! long-lived refresh token pinned to the user's `version` so a password
//! change mass-invalidates old refresh tokens. The signing algorithm is
//! pinned to HS256 on parse.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use postmind_core::{defaults, Error, Result, User};

/// Claims embedded in an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: Uuid,
    pub email: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims embedded in a refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub token_type: String,
    pub version: i32,
    pub iat: i64,
    pub exp: i64,
}

/// Minimal claims read when only the expiry matters (logout).
#[derive(Debug, Deserialize)]
struct ExpOnly {
    exp: i64,
}

/// Token mint/verify over one HMAC secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    fn validation() -> Validation {
        // Pinning HS256 rejects alg:none and RS256 confusion outright.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation
    }

    /// Mint a 15-minute access token.
    pub fn generate_access(&self, user: &User) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            user_id: user.id,
            email: user.email.clone(),
            token_type: "access".to_string(),
            iat: now,
            exp: now + defaults::ACCESS_TOKEN_TTL_SECS,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| Error::Internal(format!("sign access token: {e}")))
    }

    /// Mint a 7-day refresh token pinned to the user's current version.
    pub fn generate_refresh(&self, user: &User) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = RefreshClaims {
            user_id: user.id,
            token_type: "refresh".to_string(),
            version: user.version,
            iat: now,
            exp: now + defaults::REFRESH_TOKEN_TTL_SECS,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| Error::Internal(format!("sign refresh token: {e}")))
    }

    /// Verify an access token: signature, expiry, and `type == "access"`.
    pub fn validate_access(&self, token: &str) -> Result<AccessClaims> {
        let data = decode::<AccessClaims>(token, &self.decoding, &Self::validation())
            .map_err(map_jwt_error)?;
        if data.claims.token_type != "access" {
            return Err(Error::Unauthorized(
                "invalid token type: expected access token".into(),
            ));
        }
        Ok(data.claims)
    }

    /// Verify a refresh token: signature, expiry, and `type == "refresh"`.
    pub fn validate_refresh(&self, token: &str) -> Result<RefreshClaims> {
        let data = decode::<RefreshClaims>(token, &self.decoding, &Self::validation())
            .map_err(map_jwt_error)?;
        if data.claims.token_type != "refresh" {
            return Err(Error::Unauthorized(
                "invalid token type: expected refresh token".into(),
            ));
        }
        Ok(data.claims)
    }

    /// Extract a token's own expiry for blacklisting, verifying the
    /// signature but not the expiry. Returns `None` when the token does
    /// not parse; callers fall back to the default TTL.
    pub fn expiry(&self, token: &str) -> Option<DateTime<Utc>> {
        let mut validation = Self::validation();
        validation.validate_exp = false;
        let data = decode::<ExpOnly>(token, &self.decoding, &validation).ok()?;
        Utc.timestamp_opt(data.claims.exp, 0).single()
    }
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> Error {
    use jsonwebtoken::errors::ErrorKind;
    match e.kind() {
        ErrorKind::ExpiredSignature => Error::Expired,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            Error::SignatureMismatch
        }
        _ => Error::Unauthorized("invalid token".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "a@b.io".to_string(),
            password_hash: String::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_access_round_trip() {
        let tokens = TokenService::new("secret");
        let u = user();
        let token = tokens.generate_access(&u).unwrap();
        let claims = tokens.validate_access(&token).unwrap();
        assert_eq!(claims.user_id, u.id);
        assert_eq!(claims.email, "a@b.io");
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_refresh_round_trip_carries_version() {
        let tokens = TokenService::new("secret");
        let mut u = user();
        u.version = 3;
        let token = tokens.generate_refresh(&u).unwrap();
        let claims = tokens.validate_refresh(&token).unwrap();
        assert_eq!(claims.version, 3);
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 3600);
    }

    #[test]
    fn test_access_rejected_as_refresh() {
        let tokens = TokenService::new("secret");
        let token = tokens.generate_access(&user()).unwrap();
        assert!(matches!(
            tokens.validate_refresh(&token),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn test_refresh_rejected_as_access() {
        let tokens = TokenService::new("secret");
        let token = tokens.generate_refresh(&user()).unwrap();
        assert!(matches!(
            tokens.validate_access(&token),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn test_wrong_secret_is_signature_mismatch() {
        let token = TokenService::new("secret-a")
            .generate_access(&user())
            .unwrap();
        let result = TokenService::new("secret-b").validate_access(&token);
        assert!(matches!(result, Err(Error::SignatureMismatch)));
    }

    #[test]
    fn test_expired_token() {
        let tokens = TokenService::new("secret");
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            user_id: Uuid::new_v4(),
            email: "a@b.io".into(),
            token_type: "access".into(),
            iat: now - 1000,
            exp: now - 100,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(matches!(tokens.validate_access(&token), Err(Error::Expired)));
    }

    #[test]
    fn test_non_hs256_algorithm_rejected() {
        let tokens = TokenService::new("secret");
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            user_id: Uuid::new_v4(),
            email: "a@b.io".into(),
            token_type: "access".into(),
            iat: now,
            exp: now + 900,
        };
        // HS384-signed token with the same secret must not validate.
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(tokens.validate_access(&token).is_err());
    }

    #[test]
    fn test_garbage_token() {
        let tokens = TokenService::new("secret");
        assert!(tokens.validate_access("not.a.jwt").is_err());
        assert!(tokens.expiry("not.a.jwt").is_none());
    }

    #[test]
    fn test_expiry_extraction_survives_expiry() {
        let tokens = TokenService::new("secret");
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            user_id: Uuid::new_v4(),
            email: "a@b.io".into(),
            token_type: "access".into(),
            iat: now - 1000,
            exp: now - 100,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        let exp = tokens.expiry(&token).unwrap();
        assert_eq!(exp.timestamp(), now - 100);
    }
}
