//! AES-256-GCM cipher for mailbox passwords at rest.
//!
//! Wire format: `base64(nonce || ciphertext || tag)` with a random
//! 12-byte nonce per encryption.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};

/// AES-256-GCM nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// Normalize a deployment key string to exactly 32 bytes.
///
/// Longer keys are truncated; shorter keys are right-padded with `'0'`.
/// This is a hard contract: the same key string must produce the same
/// bytes in every service.
pub fn normalize_key(key: &str) -> [u8; KEY_SIZE] {
    let mut out = [b'0'; KEY_SIZE];
    let bytes = key.as_bytes();
    let len = bytes.len().min(KEY_SIZE);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

/// Generate a random 12-byte nonce.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Symmetric cipher holding the normalized deployment key.
///
/// The key is loaded once at startup and treated as immutable.
#[derive(Clone)]
pub struct PasswordCipher {
    key: [u8; KEY_SIZE],
}

impl PasswordCipher {
    /// Build a cipher from the deployment key string.
    pub fn new(key: &str) -> Self {
        Self {
            key: normalize_key(key),
        }
    }

    /// Encrypt a plaintext password for storage.
    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let nonce_bytes = generate_nonce();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Encryption("AES-GCM encryption failed".into()))?;

        let mut data = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        data.extend_from_slice(&nonce_bytes);
        data.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(data))
    }

    /// Decrypt a stored password.
    ///
    /// Rejects truncated inputs with [`CryptoError::CiphertextTooShort`]
    /// and tag mismatches with [`CryptoError::Tampered`].
    pub fn decrypt(&self, encrypted: &str) -> CryptoResult<String> {
        let data = base64::engine::general_purpose::STANDARD
            .decode(encrypted)
            .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;

        if data.len() < NONCE_SIZE {
            return Err(CryptoError::CiphertextTooShort);
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| CryptoError::Tampered)?;
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::Tampered)?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))
    }
}
