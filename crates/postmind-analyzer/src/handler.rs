//! Broker handler: raw envelope in, parsed emails out.

use std::sync::Arc;

use async_trait::async_trait;

use postmind_broker::MessageHandler;
use postmind_core::{Error, RawEmailsEnvelope, Result};

use crate::agent::EmailAnalyzer;

/// Consumes `raw_emails` envelopes and drives the analyzer.
pub struct RawEmailsHandler {
    analyzer: Arc<EmailAnalyzer>,
}

impl RawEmailsHandler {
    pub fn new(analyzer: Arc<EmailAnalyzer>) -> Self {
        Self { analyzer }
    }
}

#[async_trait]
impl MessageHandler for RawEmailsHandler {
    async fn handle(&self, payload: &[u8], correlation_id: Option<String>) -> Result<()> {
        let envelope: RawEmailsEnvelope = serde_json::from_slice(payload)?;
        self.analyzer
            .process_envelope(envelope, correlation_id)
            .await
            .map_err(Error::from)
    }
}
