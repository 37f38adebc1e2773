//! # postmind-sync
//!
//! Mailbox polling for postmind: an async IMAP client with charset-aware
//! plain-text extraction, the per-integration syncer, and the
//! fixed-interval scheduler that fans syncs out over a bounded worker
//! pool.

pub mod body;
pub mod client;
pub mod scheduler;
pub mod syncer;

pub use body::extract_plain_text;
pub use client::{FetchedMessage, ImapClient};
pub use scheduler::{SchedulerConfig, SchedulerHandle, SyncScheduler};
pub use syncer::{ImapConnector, Mailbox, MailboxConnector, Syncer, MAX_BATCH_SIZE};
