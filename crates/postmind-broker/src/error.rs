//! Broker error types, split into retryable and terminal kinds.

use thiserror::Error;

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Broker failure modes.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Could not reach the broker; retryable with backoff.
    #[error("Broker connection failed: {0}")]
    Connect(String),

    /// Channel creation or topology declaration failed.
    #[error("Broker channel error: {0}")]
    Channel(String),

    /// Publish was rejected or the confirm failed.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// The delivery stream closed; the supervising task reconnects.
    #[error("Delivery stream closed for queue {0}")]
    StreamClosed(String),

    /// Message body could not be encoded.
    #[error("Message serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BrokerError {
    /// Whether the operation is worth repeating against the same broker.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BrokerError::Connect(_) | BrokerError::Publish(_) | BrokerError::StreamClosed(_)
        )
    }
}

impl From<lapin::Error> for BrokerError {
    fn from(e: lapin::Error) -> Self {
        match e {
            lapin::Error::IOError(_) | lapin::Error::ProtocolError(_) => {
                BrokerError::Connect(e.to_string())
            }
            other => BrokerError::Channel(other.to_string()),
        }
    }
}

impl From<BrokerError> for postmind_core::Error {
    fn from(e: BrokerError) -> Self {
        postmind_core::Error::Broker(e.to_string())
    }
}
