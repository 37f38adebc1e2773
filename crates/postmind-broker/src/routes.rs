//! Per-message-type routing names.
//!
//! The on-the-wire names are the contract between services. They are
//! declared as explicit constants - grep-able and refactor-proof - rather
//! than derived from type names at runtime.

use postmind_core::{ParsedEmail, RawEmailsEnvelope};

/// Exchange for raw email batches.
pub const RAW_EMAILS: &str = "raw_emails";

/// Exchange for parsed emails.
pub const PARSED_EMAILS: &str = "parsed_emails";

/// A message type with a fixed exchange/routing name.
///
/// For each route the topology is: durable exchange `ROUTE`, durable
/// queue `{ROUTE}_queue`, binding with routing key equal to the exchange
/// name. Either side may declare first; declarations are idempotent.
pub trait MessageRoute {
    /// Exchange name and routing key.
    const ROUTE: &'static str;

    /// Queue bound to the exchange.
    fn queue_name() -> String {
        format!("{}_queue", Self::ROUTE)
    }
}

impl MessageRoute for RawEmailsEnvelope {
    const ROUTE: &'static str = RAW_EMAILS;
}

impl MessageRoute for ParsedEmail {
    const ROUTE: &'static str = PARSED_EMAILS;
}
