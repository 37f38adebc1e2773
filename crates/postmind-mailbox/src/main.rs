//! postmind-mailbox - mailbox service entry point.

use std::sync::Arc;

use axum::http::Request;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use postmind_broker::{BrokerConfig, BrokerPublisher};
use postmind_crypto::PasswordCipher;
use postmind_db::Database;
use postmind_mailbox::{router, AppState, MailboxConfig};
use postmind_sync::{ImapConnector, SchedulerConfig, SyncScheduler, Syncer};

#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MailboxConfig::from_env()?;
    let db = Database::connect(&config.db_url).await?;
    let cipher = PasswordCipher::new(&config.encryption_key);

    let broker_config = BrokerConfig::from_env();
    let conn = Arc::new(postmind_broker::connect(&broker_config).await?);
    let publisher = Arc::new(BrokerPublisher::new(conn, &broker_config));

    let syncer = Arc::new(Syncer::new(
        db.integrations.clone(),
        db.raw_emails.clone(),
        publisher,
        cipher.clone(),
        Arc::new(ImapConnector::new(config.imap_timeout)),
    ));

    let scheduler = SyncScheduler::new(
        db.integrations.clone(),
        syncer,
        SchedulerConfig::from_env(),
    );
    let scheduler_handle = scheduler.start();

    let app = router(AppState {
        integrations: db.integrations.clone(),
        cipher,
        internal_token: config.internal_token.clone(),
    })
    .layer(PropagateRequestIdLayer::x_request_id())
    .layer(TraceLayer::new_for_http())
    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7));

    let addr = format!("0.0.0.0:{}", config.server_port);
    info!(subsystem = "mailbox", addr = %addr, "Starting mailbox service");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the scheduler after the HTTP surface has drained; in-flight
    // syncs finish before teardown.
    scheduler_handle.stop().await;

    info!(subsystem = "mailbox", "Mailbox service stopped");
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

    info!("Shutdown signal received, draining requests");
}
