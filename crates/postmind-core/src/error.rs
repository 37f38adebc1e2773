//! Error types shared across the postmind services.

use thiserror::Error;

/// Result type alias using postmind's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for postmind operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Task not found
    #[error("Task not found: {0}")]
    TaskNotFound(uuid::Uuid),

    /// Email integration not found
    #[error("Integration not found: {0}")]
    IntegrationNotFound(uuid::Uuid),

    /// Registration attempted with an email that is already taken
    #[error("Email already registered")]
    EmailAlreadyExists,

    /// Login failed; deliberately identical for unknown user and bad password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Token has been blacklisted
    #[error("Token has been revoked")]
    Revoked,

    /// Token is past its expiry
    #[error("Token has expired")]
    Expired,

    /// Token signature or signing algorithm rejected
    #[error("Invalid token signature")]
    SignatureMismatch,

    /// Refresh token version does not match the user's current version
    #[error("Token version mismatch - please login again")]
    VersionMismatch,

    /// Malformed or invalid client input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication required or failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unique-constraint style conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Downstream service failed (502 at the gateway)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Message broker failure
    #[error("Broker error: {0}")]
    Broker(String),

    /// LLM call failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// IMAP protocol or connection failure
    #[error("IMAP error: {0}")]
    Imap(String),

    /// Vault encryption/decryption failure
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Mailbox password could not be decrypted for this integration
    #[error("Failed to decrypt password for integration {0}")]
    DecryptPassword(uuid::Uuid),

    /// Circuit breaker rejected the call without invoking it
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// Operation was cancelled before completion
    #[error("Operation cancelled")]
    Cancelled,

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// HTTP status code for this error, used by every handler layer.
    ///
    /// SQL and broker internals collapse to 500/502 so driver text never
    /// reaches a client.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidRequest(_) | Error::Serialization(_) => 400,
            Error::InvalidCredentials
            | Error::Revoked
            | Error::Expired
            | Error::SignatureMismatch
            | Error::VersionMismatch
            | Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,
            Error::NotFound(_) | Error::TaskNotFound(_) | Error::IntegrationNotFound(_) => 404,
            Error::EmailAlreadyExists | Error::Conflict(_) => 409,
            Error::Upstream(_) => 502,
            _ => 500,
        }
    }

    /// Message safe to return to a client.
    ///
    /// 4xx/502 errors surface their own message; everything else is
    /// flattened to a constant.
    pub fn public_message(&self) -> String {
        if self.http_status() < 500 || matches!(self, Error::Upstream(_)) {
            self.to_string()
        } else {
            "Internal server error".to_string()
        }
    }
}
