//! # postmind-broker
//!
//! Message broker layer: type-routed exchange/queue topology,
//! at-least-once delivery with manual acks, and backoff-guarded
//! connections.
//!
//! For every routed message type `T` the topology is a durable exchange
//! named `T::ROUTE`, a durable queue `{route}_queue`, and a binding whose
//! routing key equals the exchange name. Both publisher and consumer
//! declare lazily and idempotently, so either side may start first.

pub mod config;
pub mod connection;
pub mod consumer;
pub mod error;
pub mod publisher;
pub mod routes;

pub use config::BrokerConfig;
pub use connection::connect;
pub use consumer::{BrokerConsumer, MessageHandler};
pub use error::{BrokerError, BrokerResult};
pub use publisher::{publish, BrokerPublisher, MessagePublisher};
pub use routes::{MessageRoute, PARSED_EMAILS, RAW_EMAILS};
