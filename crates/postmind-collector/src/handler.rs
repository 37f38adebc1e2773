//! Broker handler: parsed email in, task row out.

use std::sync::Arc;

use async_trait::async_trait;

use postmind_broker::MessageHandler;
use postmind_core::{ParsedEmail, Result};

use crate::service::TaskService;

/// Consumes `parsed_emails` messages.
pub struct ParsedEmailsHandler {
    service: Arc<TaskService>,
}

impl ParsedEmailsHandler {
    pub fn new(service: Arc<TaskService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessageHandler for ParsedEmailsHandler {
    async fn handle(&self, payload: &[u8], _correlation_id: Option<String>) -> Result<()> {
        let parsed: ParsedEmail = serde_json::from_slice(payload)?;
        self.service.ingest(&parsed).await
    }
}
