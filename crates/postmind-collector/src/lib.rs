//! # postmind-collector
//!
//! Collector service: consumes parsed emails, materializes tasks
//! idempotently with deadline-derived priority, and exposes the
//! authenticated task API (filtered listing, partial update, completion,
//! stats).

pub mod handler;
pub mod http;
pub mod service;

pub use handler::ParsedEmailsHandler;
pub use http::{router, AppState, UserId};
pub use service::{TaskService, MAX_TITLE_LEN};
