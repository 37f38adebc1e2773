//! postmind-analyzer - analyzer service entry point.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use postmind_analyzer::{EmailAnalyzer, MistralBackend, MistralConfig, RawEmailsHandler};
use postmind_broker::{BrokerConfig, BrokerConsumer, BrokerPublisher};
use postmind_core::RawEmailsEnvelope;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let llm_config = MistralConfig::from_env()?;
    let broker_config = BrokerConfig::from_env();

    let conn = Arc::new(postmind_broker::connect(&broker_config).await?);
    let publisher = Arc::new(BrokerPublisher::new(conn.clone(), &broker_config));
    let backend = Arc::new(MistralBackend::new(llm_config)?);

    let analyzer = Arc::new(EmailAnalyzer::new(backend, publisher));
    let handler = Arc::new(RawEmailsHandler::new(analyzer));

    let consumer = BrokerConsumer::new(conn, &broker_config);
    let readers = consumer.start::<RawEmailsEnvelope>(handler).await?;

    let server_port = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(8083);

    let app = Router::new().route("/health", get(|| async { Json(json!({ "status": "ok" })) }));

    let addr = format!("0.0.0.0:{server_port}");
    info!(subsystem = "analyzer", addr = %addr, "Starting analyzer service");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop accepting new deliveries; in-flight envelopes finish when the
    // connection closes.
    for reader in readers {
        reader.abort();
    }

    info!(subsystem = "analyzer", "Analyzer service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut signal) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            signal.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
