//! JSON message publisher with lazy, idempotent topology declaration.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Connection, ExchangeKind};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::config::BrokerConfig;
use crate::error::{BrokerError, BrokerResult};
use crate::routes::MessageRoute;

/// Publish seam; the AMQP implementation is [`BrokerPublisher`] and tests
/// substitute an in-memory recorder.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish an already-encoded JSON body to a route.
    async fn publish_raw(
        &self,
        route: &str,
        payload: Vec<u8>,
        correlation_id: Option<String>,
    ) -> BrokerResult<()>;
}

/// Serialize a routed message and publish it.
pub async fn publish<M>(
    publisher: &dyn MessagePublisher,
    message: &M,
    correlation_id: Option<String>,
) -> BrokerResult<()>
where
    M: MessageRoute + Serialize + Sync,
{
    let payload = serde_json::to_vec(message)?;
    publisher.publish_raw(M::ROUTE, payload, correlation_id).await
}

/// AMQP publisher.
///
/// Opens a fresh channel per publish and re-declares the durable exchange
/// each time; declarations are idempotent so either side of a route may
/// run first.
pub struct BrokerPublisher {
    conn: Arc<Connection>,
    kind: ExchangeKind,
}

impl BrokerPublisher {
    pub fn new(conn: Arc<Connection>, config: &BrokerConfig) -> Self {
        Self {
            conn,
            kind: config.kind(),
        }
    }
}

#[async_trait]
impl MessagePublisher for BrokerPublisher {
    async fn publish_raw(
        &self,
        route: &str,
        payload: Vec<u8>,
        correlation_id: Option<String>,
    ) -> BrokerResult<()> {
        let channel = self.conn.create_channel().await?;

        channel
            .exchange_declare(
                route,
                self.kind.clone(),
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2)
            .with_message_id(Uuid::new_v4().to_string().into())
            .with_correlation_id(correlation_id.unwrap_or_default().into())
            .with_timestamp(Utc::now().timestamp() as u64);

        // Routing key equals the exchange name; the binding identity is
        // the contract regardless of exchange kind.
        channel
            .basic_publish(route, route, BasicPublishOptions::default(), &payload, properties)
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;

        debug!(
            subsystem = "broker",
            component = "publisher",
            route,
            bytes = payload.len(),
            "Message published"
        );

        let _ = channel.close(200, "publish done").await;
        Ok(())
    }
}
