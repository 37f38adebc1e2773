//! Bcrypt password hashing.
//!
//! No plaintext is retained past the call scope; comparison is
//! constant-time inside bcrypt itself.

use crate::error::{CryptoError, CryptoResult};

/// Hash a password with bcrypt at the default cost (12).
pub fn hash_password(password: &str) -> CryptoResult<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| CryptoError::Hashing(e.to_string()))
}

/// Verify a password against a stored bcrypt hash.
///
/// Returns `false` both for a mismatch and for an unparseable hash, so
/// callers cannot distinguish the two.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}
