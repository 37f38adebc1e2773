//! Async IMAP client for mailbox polling.
//!
//! Connects over TLS or plain TCP, logs in with the decrypted mailbox
//! password, and fetches unseen messages newer than the last sync. Every
//! network step runs under the configured per-call timeout.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use async_imap::types::Fetch;
use async_imap::Session;
use async_native_tls::TlsStream;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use postmind_core::{Error, Result};

use crate::body::{decode_header_value, extract_plain_text};

/// Fetch items requested per message. `BODY.PEEK[]` leaves `\Seen` alone.
const FETCH_QUERY: &str = "(ENVELOPE INTERNALDATE BODY.PEEK[])";

type TlsSession = Session<TlsStream<TcpStream>>;
type PlainSession = Session<TcpStream>;

enum InnerSession {
    Tls(Box<TlsSession>),
    Plain(Box<PlainSession>),
}

/// One message pulled from the mailbox.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    /// Envelope Message-ID; absent for broken senders.
    pub message_id: Option<String>,
    pub from_address: String,
    pub subject: String,
    pub body_text: String,
    pub date_received: DateTime<Utc>,
}

/// A logged-in IMAP session.
pub struct ImapClient {
    session: InnerSession,
    timeout: Duration,
}

impl ImapClient {
    /// Connect and authenticate against a mailbox.
    pub async fn connect(
        host: &str,
        port: u16,
        use_ssl: bool,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self> {
        debug!(
            subsystem = "mailbox",
            component = "imap",
            host,
            port,
            use_ssl,
            "Connecting to IMAP server"
        );

        let tcp = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| Error::Imap(format!("connect to {host}:{port}: operation timeout")))?
            .map_err(|e| Error::Imap(format!("connect to {host}:{port}: {e}")))?;

        let session = if use_ssl {
            let tls = async_native_tls::TlsConnector::new();
            let tls_stream = tokio::time::timeout(timeout, tls.connect(host, tcp))
                .await
                .map_err(|_| Error::Imap(format!("TLS handshake with {host}: operation timeout")))?
                .map_err(|e| Error::Imap(format!("TLS handshake with {host}: {e}")))?;

            let client = async_imap::Client::new(tls_stream);
            let session = tokio::time::timeout(timeout, client.login(username, password))
                .await
                .map_err(|_| Error::Imap("login: operation timeout".into()))?
                .map_err(|(e, _)| Error::Imap(format!("login failed: {e}")))?;
            InnerSession::Tls(Box::new(session))
        } else {
            let client = async_imap::Client::new(tcp);
            let session = tokio::time::timeout(timeout, client.login(username, password))
                .await
                .map_err(|_| Error::Imap("login: operation timeout".into()))?
                .map_err(|(e, _)| Error::Imap(format!("login failed: {e}")))?;
            InnerSession::Plain(Box::new(session))
        };

        Ok(Self { session, timeout })
    }

    /// Fetch unseen messages received since `since`, in mailbox order.
    pub async fn fetch_unseen_since(&mut self, since: DateTime<Utc>) -> Result<Vec<FetchedMessage>> {
        let timeout = self.timeout;
        match &mut self.session {
            InnerSession::Tls(session) => fetch_unseen(session, since, timeout).await,
            InnerSession::Plain(session) => fetch_unseen(session, since, timeout).await,
        }
    }

    /// Log out and drop the connection. Called on every exit path of a
    /// sync, including publish failures.
    pub async fn logout(mut self) -> Result<()> {
        let timeout = self.timeout;
        let result = match &mut self.session {
            InnerSession::Tls(session) => run_imap(timeout, "logout", session.logout()).await,
            InnerSession::Plain(session) => run_imap(timeout, "logout", session.logout()).await,
        };
        result.map(|_| ())
    }
}

async fn run_imap<T>(
    timeout: Duration,
    what: &str,
    fut: impl Future<Output = async_imap::error::Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Error::Imap(format!("{what}: {e}"))),
        Err(_) => Err(Error::Imap(format!("{what}: operation timeout"))),
    }
}

async fn fetch_unseen<T>(
    session: &mut Session<T>,
    since: DateTime<Utc>,
    timeout: Duration,
) -> Result<Vec<FetchedMessage>>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Debug,
{
    // Read-only select: polling must not mutate mailbox state.
    run_imap(timeout, "examine INBOX", session.examine("INBOX")).await?;

    // IMAP SEARCH dates are day-granular: "02-Jan-2006".
    let query = format!("UNSEEN SINCE {}", since.format("%d-%b-%Y"));
    let seqs = run_imap(timeout, "search", session.search(&query)).await?;

    if seqs.is_empty() {
        return Ok(Vec::new());
    }

    let mut ordered: Vec<u32> = seqs.into_iter().collect();
    ordered.sort_unstable();
    let seq_set = ordered
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(",");

    let messages = tokio::time::timeout(timeout, async {
        let stream = session
            .fetch(&seq_set, FETCH_QUERY)
            .await
            .map_err(|e| Error::Imap(format!("fetch: {e}")))?;
        futures::pin_mut!(stream);

        let mut items = Vec::new();
        while let Some(result) = stream.next().await {
            match result {
                Ok(fetch) => items.push(parse_fetch(&fetch)),
                // Skip individual unparseable responses rather than
                // failing the whole mailbox.
                Err(e) => warn!(
                    subsystem = "mailbox",
                    component = "imap",
                    error = %e,
                    "Skipping unparseable FETCH response"
                ),
            }
        }
        Ok::<_, Error>(items)
    })
    .await
    .map_err(|_| Error::Imap("fetch: operation timeout".into()))??;

    Ok(messages)
}

fn parse_fetch(fetch: &Fetch) -> FetchedMessage {
    let envelope = fetch.envelope();

    let subject = envelope
        .and_then(|e| e.subject.as_ref())
        .map(|s| decode_header_value(String::from_utf8_lossy(s).trim()))
        .unwrap_or_default();

    let from_address = envelope
        .and_then(|e| e.from.as_ref())
        .and_then(|addresses| addresses.first())
        .map(|addr| {
            let mailbox = addr
                .mailbox
                .as_ref()
                .map(|m| String::from_utf8_lossy(m).to_string())
                .unwrap_or_default();
            let host = addr
                .host
                .as_ref()
                .map(|h| String::from_utf8_lossy(h).to_string())
                .unwrap_or_default();
            format!("{mailbox}@{host}")
        })
        .unwrap_or_else(|| "unknown@unknown.com".to_string());

    let message_id = envelope
        .and_then(|e| e.message_id.as_ref())
        .map(|m| String::from_utf8_lossy(m).trim().to_string())
        .filter(|m| !m.is_empty());

    let date_received = fetch
        .internal_date()
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let body_text = fetch.body().map(extract_plain_text).unwrap_or_default();

    FetchedMessage {
        message_id,
        from_address,
        subject,
        body_text,
        date_received,
    }
}
