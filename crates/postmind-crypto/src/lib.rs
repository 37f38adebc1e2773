//! # postmind-crypto
//!
//! Credential vault primitives:
//!
//! - AES-256-GCM cipher for mailbox passwords at rest, with the
//!   deployment-wide key normalized to exactly 32 bytes
//! - Bcrypt hashing for account passwords
//! - SHA-256 token ids for the revocation blacklist

pub mod cipher;
pub mod error;
pub mod password;
pub mod token;

pub use cipher::{generate_nonce, normalize_key, PasswordCipher, KEY_SIZE, NONCE_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use password::{hash_password, verify_password};
pub use token::token_id;
