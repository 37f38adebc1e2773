//! Integration CRUD surface with the internal identity guard.

use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use postmind_core::{normalize_email, EmailIntegration, Error, IntegrationRepository};
use postmind_crypto::PasswordCipher;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub integrations: Arc<dyn IntegrationRepository>,
    pub cipher: PasswordCipher,
    pub internal_token: String,
}

pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.0.public_message() }))).into_response()
    }
}

/// Requests reaching this service without the gateway's shared secret
/// fail closed, whatever `X-User-ID` claims.
async fn internal_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get("X-Internal-Token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if token.is_empty() || token != state.internal_token {
        return Err(ApiError(Error::Forbidden("invalid internal token".into())));
    }

    Ok(next.run(request).await)
}

fn header_user_id(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    let raw = headers
        .get("X-User-ID")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError(Error::Unauthorized("X-User-ID header required".into())))?;

    Uuid::parse_str(raw).map_err(|_| ApiError(Error::InvalidRequest("Invalid user ID format".into())))
}

pub fn router(state: AppState) -> Router {
    // One parameter slot serves both routes: a user id for GET, an
    // integration id for DELETE.
    let api = Router::new()
        .route("/api/integrations", post(create_integration))
        .route(
            "/api/integrations/:id",
            get(list_integrations).delete(delete_integration),
        )
        .layer(middleware::from_fn_with_state(state.clone(), internal_auth));

    Router::new()
        .merge(api)
        .route("/health", get(health))
        .route("/api/health", get(health))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct CreateIntegrationRequest {
    email_address: String,
    imap_host: String,
    imap_port: u16,
    #[serde(default = "default_ssl")]
    use_ssl: bool,
    password: String,
}

fn default_ssl() -> bool {
    true
}

async fn create_integration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateIntegrationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = header_user_id(&headers)?;

    if !body.email_address.contains('@') {
        return Err(ApiError(Error::InvalidRequest("invalid email address".into())));
    }
    if body.imap_host.is_empty() {
        return Err(ApiError(Error::InvalidRequest("imap_host is required".into())));
    }
    if body.imap_port == 0 {
        return Err(ApiError(Error::InvalidRequest("invalid imap_port".into())));
    }
    if body.password.is_empty() {
        return Err(ApiError(Error::InvalidRequest("password is required".into())));
    }

    // Only the ciphertext is ever stored; the plaintext dies with this
    // request scope.
    let ciphertext = state
        .cipher
        .encrypt(&body.password)
        .map_err(|e| ApiError(Error::Crypto(e.to_string())))?;

    let now = Utc::now();
    let integration = EmailIntegration {
        id: Uuid::new_v4(),
        user_id,
        email_address: normalize_email(&body.email_address),
        imap_host: body.imap_host,
        imap_port: i32::from(body.imap_port),
        use_ssl: body.use_ssl,
        password: ciphertext,
        last_sync_at: None,
        created_at: now,
        updated_at: now,
    };

    state.integrations.create(&integration).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": integration.id, "status": "created" })),
    ))
}

async fn list_integrations(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let integrations = state.integrations.find_by_user(user_id).await?;
    // EmailIntegration skips the password field on serialization.
    Ok(Json(integrations))
}

async fn delete_integration(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.integrations.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
