//! # postmind-gateway
//!
//! API gateway: terminates client requests, validates access tokens with
//! the auth service, injects the internal identity headers, rewrites
//! versioned client paths onto the downstream services, and auto-derives
//! IMAP settings for well-known mail providers.

pub mod autoconfig;
pub mod config;
pub mod middleware;
pub mod proxy;
pub mod state;

pub use autoconfig::{apply_auto_config, imap_settings_for_email, ImapSettings};
pub use config::GatewayConfig;
pub use middleware::{authenticate, auto_imap_config, AuthenticatedUser};
pub use proxy::{proxy, resolve_route, ResolvedRoute};
pub use state::GatewayState;
