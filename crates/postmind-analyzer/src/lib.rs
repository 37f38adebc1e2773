//! # postmind-analyzer
//!
//! Analyzer service: consumes raw email envelopes, extracts structured
//! reminders through an LLM guarded by retry and a circuit breaker, and
//! publishes parsed emails. While the breaker is open every email is
//! degraded to a fallback reminder instead of being dropped.

pub mod agent;
pub mod handler;
pub mod llm;

pub use agent::{AggregateError, EmailAnalyzer, FALLBACK_DESCRIPTION};
pub use handler::RawEmailsHandler;
pub use llm::{ChatBackend, MistralBackend, MistralConfig};
