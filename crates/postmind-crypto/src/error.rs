//! Error types for vault operations.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Encryption failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Ciphertext is not valid base64.
    #[error("Invalid base64 ciphertext: {0}")]
    InvalidEncoding(String),

    /// Ciphertext shorter than the nonce prefix.
    #[error("Ciphertext too short")]
    CiphertextTooShort,

    /// Authentication tag mismatch - wrong key or tampered data.
    #[error("Decryption failed - data may be tampered")]
    Tampered,

    /// Password hashing failed.
    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// Result type for vault operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
