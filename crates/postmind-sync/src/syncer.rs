//! Mailbox syncer: decrypt, poll, dedupe, persist, publish.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use postmind_broker::{publish, MessagePublisher};
use postmind_core::{
    defaults, EmailIntegration, Error, IntegrationRepository, RawEmail, RawEmailMessage,
    RawEmailRepository, RawEmailsEnvelope, Result,
};
use postmind_crypto::PasswordCipher;

use crate::client::{FetchedMessage, ImapClient};

/// Raw emails per published envelope.
pub const MAX_BATCH_SIZE: usize = defaults::PUBLISH_BATCH_SIZE;

/// An open mailbox session.
#[async_trait]
pub trait Mailbox: Send {
    async fn fetch_unseen_since(
        &mut self,
        since: chrono::DateTime<Utc>,
    ) -> Result<Vec<FetchedMessage>>;

    async fn logout(self: Box<Self>) -> Result<()>;
}

/// Opens mailbox sessions for integrations. The IMAP implementation is
/// [`ImapConnector`]; tests script an in-memory mailbox.
#[async_trait]
pub trait MailboxConnector: Send + Sync {
    async fn connect(
        &self,
        integration: &EmailIntegration,
        password: &str,
    ) -> Result<Box<dyn Mailbox>>;
}

#[async_trait]
impl Mailbox for ImapClient {
    async fn fetch_unseen_since(
        &mut self,
        since: chrono::DateTime<Utc>,
    ) -> Result<Vec<FetchedMessage>> {
        ImapClient::fetch_unseen_since(self, since).await
    }

    async fn logout(self: Box<Self>) -> Result<()> {
        ImapClient::logout(*self).await
    }
}

/// Connector dialing real IMAP servers with the configured timeout.
pub struct ImapConnector {
    timeout: Duration,
}

impl ImapConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl MailboxConnector for ImapConnector {
    async fn connect(
        &self,
        integration: &EmailIntegration,
        password: &str,
    ) -> Result<Box<dyn Mailbox>> {
        let client = ImapClient::connect(
            &integration.imap_host,
            u16::try_from(integration.imap_port)
                .map_err(|_| Error::InvalidRequest("invalid IMAP port".into()))?,
            integration.use_ssl,
            &integration.email_address,
            password,
            self.timeout,
        )
        .await?;
        Ok(Box::new(client))
    }
}

/// Syncs one integration at a time; driven by the scheduler's worker pool.
pub struct Syncer {
    integrations: Arc<dyn IntegrationRepository>,
    raw_emails: Arc<dyn RawEmailRepository>,
    publisher: Arc<dyn MessagePublisher>,
    cipher: PasswordCipher,
    connector: Arc<dyn MailboxConnector>,
}

impl Syncer {
    pub fn new(
        integrations: Arc<dyn IntegrationRepository>,
        raw_emails: Arc<dyn RawEmailRepository>,
        publisher: Arc<dyn MessagePublisher>,
        cipher: PasswordCipher,
        connector: Arc<dyn MailboxConnector>,
    ) -> Self {
        Self {
            integrations,
            raw_emails,
            publisher,
            cipher,
            connector,
        }
    }

    /// Sync one integration end to end.
    ///
    /// `last_sync_at` is bumped on every successful path, including "no
    /// new messages"; a publish failure leaves it untouched so the next
    /// tick re-covers the window. The mailbox is logged out on all exit
    /// paths.
    pub async fn sync_integration(&self, integration: &EmailIntegration) -> Result<()> {
        let password = self
            .cipher
            .decrypt(&integration.password)
            .map_err(|_| Error::DecryptPassword(integration.id))?;

        let mut mailbox = self.connector.connect(integration, &password).await?;
        drop(password);

        let result = self.pull_and_publish(&mut mailbox, integration).await;

        if let Err(e) = mailbox.logout().await {
            warn!(
                subsystem = "mailbox",
                component = "syncer",
                integration_id = %integration.id,
                error = %e,
                "Logout failed"
            );
        }

        let processed = result?;
        self.integrations.mark_synced(integration.id).await?;

        info!(
            subsystem = "mailbox",
            component = "syncer",
            op = "sync_integration",
            integration_id = %integration.id,
            result_count = processed,
            "Sync done"
        );
        Ok(())
    }

    async fn pull_and_publish(
        &self,
        mailbox: &mut Box<dyn Mailbox>,
        integration: &EmailIntegration,
    ) -> Result<usize> {
        let since = integration.last_sync_at.unwrap_or_else(|| {
            Utc::now() - ChronoDuration::hours(defaults::FIRST_SYNC_LOOKBACK_HOURS)
        });

        let messages = mailbox.fetch_unseen_since(since).await?;

        info!(
            subsystem = "mailbox",
            component = "syncer",
            integration_id = %integration.id,
            result_count = messages.len(),
            "Messages found"
        );

        if messages.is_empty() {
            return Ok(0);
        }

        let mut batch: Vec<RawEmailMessage> = Vec::with_capacity(MAX_BATCH_SIZE);
        let mut processed = 0usize;

        for message in &messages {
            match self.process_message(integration, message).await {
                Ok(Some(wire)) => {
                    batch.push(wire);
                    processed += 1;

                    if batch.len() >= MAX_BATCH_SIZE {
                        self.publish_batch(&mut batch, integration).await?;
                    }
                }
                Ok(None) => {} // already ingested
                Err(e) => {
                    warn!(
                        subsystem = "mailbox",
                        component = "syncer",
                        integration_id = %integration.id,
                        error = %e,
                        "Message processing failed"
                    );
                }
            }
        }

        // Residual batch: publish only when non-empty.
        if !batch.is_empty() {
            self.publish_batch(&mut batch, integration).await?;
        }

        Ok(processed)
    }

    async fn process_message(
        &self,
        integration: &EmailIntegration,
        message: &FetchedMessage,
    ) -> Result<Option<RawEmailMessage>> {
        // Broken senders omit Message-ID; the internal date stands in.
        let message_id = message
            .message_id
            .clone()
            .unwrap_or_else(|| message.date_received.to_rfc3339());

        if self
            .raw_emails
            .exists(integration.user_id, &message_id)
            .await?
        {
            return Ok(None);
        }

        let now = Utc::now();
        let email = RawEmail {
            id: Uuid::new_v4(),
            user_id: integration.user_id,
            message_id: message_id.clone(),
            from_address: message.from_address.clone(),
            subject: message.subject.clone(),
            body_text: message.body_text.clone(),
            date_received: message.date_received,
            processed: false,
            created_at: now,
        };

        self.raw_emails.insert(&email).await?;

        Ok(Some(RawEmailMessage {
            email_id: email.id,
            user_id: email.user_id,
            message_id,
            from_address: email.from_address,
            subject: email.subject,
            body_text: email.body_text,
            date_received: email.date_received,
            sync_timestamp: now,
        }))
    }

    async fn publish_batch(
        &self,
        batch: &mut Vec<RawEmailMessage>,
        integration: &EmailIntegration,
    ) -> Result<()> {
        let envelope = RawEmailsEnvelope {
            batch_size: batch.len(),
            sync_timestamp: Utc::now(),
            emails: std::mem::take(batch),
        };

        publish(&*self.publisher, &envelope, None)
            .await
            .map_err(Error::from)?;

        info!(
            subsystem = "mailbox",
            component = "syncer",
            integration_id = %integration.id,
            batch_size = envelope.batch_size,
            "Batch published"
        );
        Ok(())
    }
}
