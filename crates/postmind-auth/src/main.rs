//! postmind-auth - authentication service entry point.

use std::sync::Arc;
use std::time::Duration;

use axum::http::Request;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use postmind_auth::{
    router, AppState, AuthConfig, AuthService, BlacklistBackend, RedisTokenBlacklist, TokenService,
};
use postmind_core::TokenBlacklist;
use postmind_db::Database;

/// Interval between expired-token sweeps on the Postgres backend.
const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// Time-ordered UUIDv7 request correlation ids.
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

    let config = AuthConfig::from_env()?;
    let db = Database::connect(&config.db_url).await?;

    let blacklist: Arc<dyn TokenBlacklist> = match config.blacklist_backend {
        BlacklistBackend::Redis => {
            Arc::new(RedisTokenBlacklist::connect(&config.redis_url).await?)
        }
        BlacklistBackend::Postgres => {
            let blacklist = db.blacklist.clone();
            // The Postgres store has no TTL; sweep expired rows in the
            // background.
            let sweeper = blacklist.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
                loop {
                    ticker.tick().await;
                    match sweeper.sweep_expired().await {
                        Ok(0) => {}
                        Ok(removed) => info!(
                            subsystem = "auth",
                            component = "blacklist",
                            result_count = removed,
                            "Swept expired blacklist entries"
                        ),
                        Err(e) => warn!(
                            subsystem = "auth",
                            component = "blacklist",
                            error = %e,
                            "Blacklist sweep failed"
                        ),
                    }
                }
            });
            blacklist
        }
    };

    let service = Arc::new(AuthService::new(
        db.users.clone(),
        blacklist,
        TokenService::new(&config.jwt_secret),
    ));

    let app = router(AppState { service })
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7));

    let addr = format!("0.0.0.0:{}", config.server_port);
    info!(subsystem = "auth", addr = %addr, "Starting auth service");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(subsystem = "auth", "Auth service stopped");
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
