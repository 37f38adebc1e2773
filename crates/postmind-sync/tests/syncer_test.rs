//! Syncer behavior against an in-memory mailbox and stores: idempotency,
//! batching boundaries, and last-sync bookkeeping.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use postmind_broker::{BrokerResult, MessagePublisher};
use postmind_core::{
    EmailIntegration, Error, IntegrationRepository, RawEmail, RawEmailRepository,
    RawEmailsEnvelope, Result,
};
use postmind_crypto::PasswordCipher;
use postmind_sync::{FetchedMessage, Mailbox, MailboxConnector, Syncer};

// ---------------------------------------------------------------------------
// In-memory doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemIntegrations {
    synced: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl IntegrationRepository for MemIntegrations {
    async fn create(&self, _integration: &EmailIntegration) -> Result<()> {
        Ok(())
    }

    async fn find_by_user(&self, _user_id: Uuid) -> Result<Vec<EmailIntegration>> {
        Ok(vec![])
    }

    async fn find_by_id(&self, id: Uuid) -> Result<EmailIntegration> {
        Err(Error::IntegrationNotFound(id))
    }

    async fn delete(&self, _id: Uuid) -> Result<()> {
        Ok(())
    }

    async fn due_for_sync(&self, _limit: i64) -> Result<Vec<EmailIntegration>> {
        Ok(vec![])
    }

    async fn mark_synced(&self, id: Uuid) -> Result<()> {
        self.synced.lock().unwrap().push(id);
        Ok(())
    }
}

#[derive(Default)]
struct MemRawEmails {
    rows: Mutex<HashMap<(Uuid, String), RawEmail>>,
}

#[async_trait]
impl RawEmailRepository for MemRawEmails {
    async fn exists(&self, user_id: Uuid, message_id: &str) -> Result<bool> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .contains_key(&(user_id, message_id.to_string())))
    }

    async fn insert(&self, email: &RawEmail) -> Result<()> {
        self.rows
            .lock()
            .unwrap()
            .entry((email.user_id, email.message_id.clone()))
            .or_insert_with(|| email.clone());
        Ok(())
    }

    async fn mark_processed(&self, _id: Uuid) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingPublisher {
    envelopes: Mutex<Vec<RawEmailsEnvelope>>,
    fail: Mutex<bool>,
}

#[async_trait]
impl MessagePublisher for RecordingPublisher {
    async fn publish_raw(
        &self,
        _route: &str,
        payload: Vec<u8>,
        _correlation_id: Option<String>,
    ) -> BrokerResult<()> {
        if *self.fail.lock().unwrap() {
            return Err(postmind_broker::BrokerError::Publish(
                "connection reset".into(),
            ));
        }
        let envelope: RawEmailsEnvelope = serde_json::from_slice(&payload)?;
        self.envelopes.lock().unwrap().push(envelope);
        Ok(())
    }
}

struct ScriptedMailbox {
    messages: Vec<FetchedMessage>,
    logged_out: Arc<Mutex<u32>>,
}

#[async_trait]
impl Mailbox for ScriptedMailbox {
    async fn fetch_unseen_since(
        &mut self,
        _since: DateTime<Utc>,
    ) -> Result<Vec<FetchedMessage>> {
        Ok(self.messages.clone())
    }

    async fn logout(self: Box<Self>) -> Result<()> {
        *self.logged_out.lock().unwrap() += 1;
        Ok(())
    }
}

struct ScriptedConnector {
    messages: Vec<FetchedMessage>,
    logged_out: Arc<Mutex<u32>>,
}

#[async_trait]
impl MailboxConnector for ScriptedConnector {
    async fn connect(
        &self,
        _integration: &EmailIntegration,
        _password: &str,
    ) -> Result<Box<dyn Mailbox>> {
        Ok(Box::new(ScriptedMailbox {
            messages: self.messages.clone(),
            logged_out: self.logged_out.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn message(id: &str) -> FetchedMessage {
    FetchedMessage {
        message_id: Some(id.to_string()),
        from_address: "boss@work.io".to_string(),
        subject: format!("subject {id}"),
        body_text: "please review by Friday".to_string(),
        date_received: Utc::now(),
    }
}

fn integration(cipher: &PasswordCipher) -> EmailIntegration {
    let now = Utc::now();
    EmailIntegration {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        email_address: "user@example.com".to_string(),
        imap_host: "imap.example.com".to_string(),
        imap_port: 993,
        use_ssl: true,
        password: cipher.encrypt("mailbox-pass").unwrap(),
        last_sync_at: None,
        created_at: now,
        updated_at: now,
    }
}

struct Harness {
    syncer: Syncer,
    integrations: Arc<MemIntegrations>,
    raw_emails: Arc<MemRawEmails>,
    publisher: Arc<RecordingPublisher>,
    logged_out: Arc<Mutex<u32>>,
}

fn harness(messages: Vec<FetchedMessage>) -> Harness {
    let cipher = PasswordCipher::new("test-key");
    let integrations = Arc::new(MemIntegrations::default());
    let raw_emails = Arc::new(MemRawEmails::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let logged_out = Arc::new(Mutex::new(0));

    let connector = Arc::new(ScriptedConnector {
        messages,
        logged_out: logged_out.clone(),
    });

    let syncer = Syncer::new(
        integrations.clone(),
        raw_emails.clone(),
        publisher.clone(),
        cipher,
        connector,
    );

    Harness {
        syncer,
        integrations,
        raw_emails,
        publisher,
        logged_out,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sync_twice_persists_and_publishes_once() {
    let h = harness(vec![message("<m1>")]);
    let cipher = PasswordCipher::new("test-key");
    let integration = integration(&cipher);

    h.syncer.sync_integration(&integration).await.unwrap();
    h.syncer.sync_integration(&integration).await.unwrap();

    let rows = h.raw_emails.rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows.contains_key(&(integration.user_id, "<m1>".to_string())));

    let envelopes = h.publisher.envelopes.lock().unwrap();
    assert_eq!(envelopes.len(), 1, "exactly one broker publish expected");
    assert_eq!(envelopes[0].emails[0].message_id, "<m1>");
}

#[tokio::test]
async fn batches_split_at_seven() {
    let messages: Vec<_> = (0..16).map(|i| message(&format!("<m{i}>"))).collect();
    let h = harness(messages);
    let cipher = PasswordCipher::new("test-key");
    let integration = integration(&cipher);

    h.syncer.sync_integration(&integration).await.unwrap();

    let envelopes = h.publisher.envelopes.lock().unwrap();
    let sizes: Vec<usize> = envelopes.iter().map(|e| e.emails.len()).collect();
    assert_eq!(sizes, vec![7, 7, 2]);
    for envelope in envelopes.iter() {
        assert_eq!(envelope.batch_size, envelope.emails.len());
    }

    // Fetch order survives within each batch.
    let published: Vec<String> = envelopes
        .iter()
        .flat_map(|e| e.emails.iter().map(|m| m.message_id.clone()))
        .collect();
    let expected: Vec<String> = (0..16).map(|i| format!("<m{i}>")).collect();
    assert_eq!(published, expected);
}

#[tokio::test]
async fn empty_mailbox_still_bumps_last_sync() {
    let h = harness(vec![]);
    let cipher = PasswordCipher::new("test-key");
    let integration = integration(&cipher);

    h.syncer.sync_integration(&integration).await.unwrap();

    assert!(h.publisher.envelopes.lock().unwrap().is_empty());
    assert_eq!(
        h.integrations.synced.lock().unwrap().as_slice(),
        &[integration.id]
    );
    assert_eq!(*h.logged_out.lock().unwrap(), 1);
}

#[tokio::test]
async fn publish_failure_keeps_last_sync_and_logs_out() {
    let h = harness(vec![message("<m1>")]);
    *h.publisher.fail.lock().unwrap() = true;
    let cipher = PasswordCipher::new("test-key");
    let integration = integration(&cipher);

    let result = h.syncer.sync_integration(&integration).await;
    assert!(result.is_err());

    assert!(h.integrations.synced.lock().unwrap().is_empty());
    assert_eq!(*h.logged_out.lock().unwrap(), 1, "logout on publish failure");
}

#[tokio::test]
async fn garbage_ciphertext_aborts_with_decrypt_error() {
    let h = harness(vec![message("<m1>")]);
    let cipher = PasswordCipher::new("test-key");
    let mut integration = integration(&cipher);
    integration.password = "AAAA".to_string();

    let result = h.syncer.sync_integration(&integration).await;
    assert!(matches!(result, Err(Error::DecryptPassword(id)) if id == integration.id));
    assert_eq!(*h.logged_out.lock().unwrap(), 0);
}

#[tokio::test]
async fn missing_message_id_falls_back_to_internal_date() {
    let mut msg = message("ignored");
    msg.message_id = None;
    let date = msg.date_received;
    let h = harness(vec![msg]);
    let cipher = PasswordCipher::new("test-key");
    let integration = integration(&cipher);

    h.syncer.sync_integration(&integration).await.unwrap();

    let rows = h.raw_emails.rows.lock().unwrap();
    let keys: HashSet<String> = rows.keys().map(|(_, m)| m.clone()).collect();
    assert!(keys.contains(&date.to_rfc3339()));
}
