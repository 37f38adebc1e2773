//! Manual-ack consumer with concurrent readers per queue.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Connection, ExchangeKind};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::BrokerConfig;
use crate::error::BrokerResult;
use crate::routes::MessageRoute;

/// Message handler seam.
///
/// `Ok` acks the delivery; `Err` nacks it back onto the queue. The
/// delivery's correlation id rides along so handlers that publish
/// downstream can propagate it.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(
        &self,
        payload: &[u8],
        correlation_id: Option<String>,
    ) -> postmind_core::Result<()>;
}

/// AMQP consumer spawning `readers` concurrent reader tasks against one
/// queue, letting the broker round-robin deliveries between them.
pub struct BrokerConsumer {
    conn: Arc<Connection>,
    kind: ExchangeKind,
    readers: usize,
}

impl BrokerConsumer {
    pub fn new(conn: Arc<Connection>, config: &BrokerConfig) -> Self {
        Self {
            conn,
            kind: config.kind(),
            readers: config.readers,
        }
    }

    /// Declare the route topology and start the reader tasks.
    ///
    /// Returns the reader handles; a closed delivery stream ends its
    /// reader cleanly and the supervising task is expected to restart the
    /// consumer after reconnecting.
    pub async fn start<M>(&self, handler: Arc<dyn MessageHandler>) -> BrokerResult<Vec<JoinHandle<()>>>
    where
        M: MessageRoute,
    {
        let queue = M::queue_name();
        let mut handles = Vec::with_capacity(self.readers);

        for reader in 0..self.readers {
            let channel = self.conn.create_channel().await?;

            channel
                .exchange_declare(
                    M::ROUTE,
                    self.kind.clone(),
                    ExchangeDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await?;

            channel
                .queue_declare(
                    &queue,
                    QueueDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await?;

            channel
                .queue_bind(
                    &queue,
                    M::ROUTE,
                    M::ROUTE,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await?;

            let mut consumer = channel
                .basic_consume(
                    &queue,
                    &format!("{queue}-reader-{reader}"),
                    BasicConsumeOptions::default(),
                    FieldTable::default(),
                )
                .await?;

            let handler = handler.clone();
            let queue_name = queue.clone();

            handles.push(tokio::spawn(async move {
                info!(
                    subsystem = "broker",
                    component = "consumer",
                    queue = %queue_name,
                    reader,
                    "Waiting for messages"
                );

                while let Some(delivery) = consumer.next().await {
                    let delivery = match delivery {
                        Ok(d) => d,
                        Err(e) => {
                            error!(
                                subsystem = "broker",
                                component = "consumer",
                                queue = %queue_name,
                                error = %e,
                                "Delivery error"
                            );
                            continue;
                        }
                    };

                    let correlation_id = delivery
                        .properties
                        .correlation_id()
                        .as_ref()
                        .map(|id| id.to_string())
                        .filter(|id| !id.is_empty());

                    match handler.handle(&delivery.data, correlation_id).await {
                        Ok(()) => {
                            // Only an acked message counts as processed.
                            if let Err(ack_err) = delivery.ack(BasicAckOptions::default()).await {
                                error!(
                                    subsystem = "broker",
                                    component = "consumer",
                                    queue = %queue_name,
                                    error = %ack_err,
                                    "Failed to ack delivery"
                                );
                                let nack = delivery
                                    .nack(BasicNackOptions {
                                        requeue: true,
                                        ..Default::default()
                                    })
                                    .await;
                                if let Err(nack_err) = nack {
                                    warn!(
                                        subsystem = "broker",
                                        component = "consumer",
                                        queue = %queue_name,
                                        error = %nack_err,
                                        "Failed to nack after ack error"
                                    );
                                }
                            }
                        }
                        Err(handler_err) => {
                            error!(
                                subsystem = "broker",
                                component = "consumer",
                                queue = %queue_name,
                                error = %handler_err,
                                "Handler error, requeueing"
                            );
                            let nack = delivery
                                .nack(BasicNackOptions {
                                    requeue: true,
                                    ..Default::default()
                                })
                                .await;
                            if let Err(nack_err) = nack {
                                warn!(
                                    subsystem = "broker",
                                    component = "consumer",
                                    queue = %queue_name,
                                    error = %nack_err,
                                    "Failed to nack delivery"
                                );
                            }
                        }
                    }
                }

                info!(
                    subsystem = "broker",
                    component = "consumer",
                    queue = %queue_name,
                    reader,
                    "Delivery stream closed"
                );
            }));
        }

        Ok(handles)
    }
}
