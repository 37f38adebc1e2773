//! # postmind-mailbox
//!
//! The mailbox (core) service: user-owned IMAP integration CRUD with
//! passwords encrypted at rest, plus the process-wide sync scheduler
//! that polls mailboxes and publishes raw email batches.

pub mod config;
pub mod http;

pub use config::MailboxConfig;
pub use http::{router, AppState};
