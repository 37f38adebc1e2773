//! Gateway middleware: token authentication and IMAP auto-config.

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::autoconfig::apply_auto_config;
use crate::state::GatewayState;

/// Request body cap for buffered proxying (10 MiB).
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Identity of the authenticated caller, stashed by [`authenticate`].
#[derive(Clone, Debug)]
pub struct AuthenticatedUser(pub String);

#[derive(Deserialize)]
struct ValidateResponse {
    valid: bool,
    #[serde(default)]
    user_id: String,
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

/// Validate the bearer token with the auth service.
///
/// `/health` and `/auth/*` pass through; `/internal/*` is machine-only
/// and checked against the shared secret instead.
pub async fn authenticate(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if path == "/health" || path == "/auth" || path.starts_with("/auth/") {
        return next.run(request).await;
    }

    if path.starts_with("/internal") {
        let token = request
            .headers()
            .get("X-Internal-Token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if token.is_empty() || token != state.config.internal_token {
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "invalid internal token" })),
            )
                .into_response();
        }
        return next.run(request).await;
    }

    let Some(token) = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
    else {
        return unauthorized("Authorization header required");
    };

    let validate_url = format!("{}/auth/validate", state.config.auth_url);
    let result = state
        .client
        .post(&validate_url)
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .await;

    let response = match result {
        Ok(r) => r,
        Err(e) => {
            warn!(subsystem = "gateway", error = %e, "Auth service unreachable");
            return unauthorized("Invalid token");
        }
    };

    if response.status() != StatusCode::OK {
        return unauthorized("Invalid token");
    }

    let parsed: ValidateResponse = match response.json().await {
        Ok(v) => v,
        Err(_) => return unauthorized("Invalid token"),
    };

    if !parsed.valid || parsed.user_id.is_empty() {
        return unauthorized("Invalid token");
    }

    request
        .extensions_mut()
        .insert(AuthenticatedUser(parsed.user_id));

    next.run(request).await
}

/// Derive IMAP settings on integration creation.
///
/// Applies only to `POST /api/v1/integrations/email` bodies carrying an
/// `email_address`; rewrites the body and Content-Length in place.
pub async fn auto_imap_config(request: Request, next: Next) -> Response {
    let is_target = request.method() == Method::POST
        && request.uri().path().contains("/integrations/email");

    if !is_target {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Failed to read request body" })),
            )
                .into_response();
        }
    };

    let rebuilt = match serde_json::from_slice::<Value>(&bytes) {
        Ok(mut json) => {
            if apply_auto_config(&mut json) {
                debug!(
                    subsystem = "gateway",
                    component = "auto_imap",
                    "Backfilled IMAP settings"
                );
            }
            match serde_json::to_vec(&json) {
                Ok(encoded) => encoded,
                Err(_) => bytes.to_vec(),
            }
        }
        // Not JSON: forward untouched.
        Err(_) => bytes.to_vec(),
    };

    if let Ok(len) = HeaderValue::from_str(&rebuilt.len().to_string()) {
        parts.headers.insert("Content-Length", len);
    }

    next.run(Request::from_parts(parts, Body::from(rebuilt))).await
}
