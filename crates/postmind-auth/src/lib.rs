//! # postmind-auth
//!
//! Authentication service: registration, login, HS256 token lifecycle
//! with version-based refresh invalidation, and a revocation blacklist
//! behind a swappable store (Postgres table or Redis TTL keys).

pub mod blacklist_redis;
pub mod config;
pub mod handlers;
pub mod service;
pub mod tokens;

pub use blacklist_redis::RedisTokenBlacklist;
pub use config::{AuthConfig, BlacklistBackend};
pub use handlers::{router, AppState};
pub use service::{AuthService, TokenPair};
pub use tokens::{AccessClaims, RefreshClaims, TokenService};
