//! HTTP surface of the auth service.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use postmind_core::{defaults, Error};

use crate::service::AuthService;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AuthService>,
}

/// Domain error rendered as `{"error": "<message>"}` with the mapped
/// status code.
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

/// Pull the token out of `Authorization: Bearer <t>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError(Error::InvalidRequest("Authorization header required".into())))?;

    header
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError(Error::InvalidRequest("Invalid authorization format".into())))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/validate", post(validate))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/password", post(change_password))
        .route("/auth/me", get(me))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !body.email.contains('@') {
        return Err(ApiError(Error::InvalidRequest("invalid email".into())));
    }
    if body.password.chars().count() < 6 {
        return Err(ApiError(Error::InvalidRequest(
            "password must be at least 6 characters".into(),
        )));
    }

    let user = state
        .service
        .sign_up(&postmind_core::normalize_email(&body.email), &body.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully", "user_id": user.id })),
    ))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    token_type: &'static str,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let pair = state
        .service
        .sign_in(&postmind_core::normalize_email(&body.email), &body.password)
        .await?;

    Ok(Json(LoginResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: defaults::ACCESS_TOKEN_TTL_SECS,
        token_type: "Bearer",
    }))
}

async fn validate(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(&headers)?;
    let user = state.service.validate(token).await?;

    Ok(Json(json!({
        "valid": true,
        "user_id": user.id,
        "email": user.email,
    })))
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let access_token = state.service.refresh(&body.refresh_token).await?;
    Ok(Json(json!({
        "access_token": access_token,
        "expires_in": defaults::ACCESS_TOKEN_TTL_SECS,
        "token_type": "Bearer",
    })))
}

#[derive(Deserialize)]
struct LogoutRequest {
    refresh_token: String,
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LogoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let access_token = bearer_token(&headers)?;
    state
        .service
        .logout(access_token, &body.refresh_token)
        .await?;
    Ok(Json(json!({ "message": "Logged out successfully" })))
}

#[derive(Deserialize)]
struct ChangePasswordRequest {
    old_password: String,
    new_password: String,
}

async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.new_password.chars().count() < 6 {
        return Err(ApiError(Error::InvalidRequest(
            "password must be at least 6 characters".into(),
        )));
    }

    let token = bearer_token(&headers)?;
    let user = state.service.validate(token).await?;
    state
        .service
        .change_password(user.id, &body.old_password, &body.new_password)
        .await?;

    Ok(Json(json!({ "message": "Password changed successfully" })))
}

async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(&headers)?;
    let user = state.service.validate(token).await?;

    Ok(Json(json!({
        "user_id": user.id,
        "email": user.email,
        "created_at": user.created_at,
    })))
}
