//! Token identifiers for the revocation blacklist.

use sha2::{Digest, Sha256};

/// Blacklist key for a token: lowercase hex of its SHA-256 digest.
///
/// Only the digest is ever stored, so a blacklist leak does not expose
/// usable tokens.
pub fn token_id(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
