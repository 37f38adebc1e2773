//! Task API surface and the internal identity guard.

use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Extension, Json, Router};
use serde_json::json;
use uuid::Uuid;

use postmind_core::{Error, TaskFilter, TaskRepository, TaskUpdate};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<dyn TaskRepository>,
    pub internal_token: String,
}

/// Authenticated caller identity, injected by [`internal_auth`].
#[derive(Clone, Copy)]
pub struct UserId(pub Uuid);

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

/// Identity guard for every task route.
///
/// `X-User-ID` is trusted only when `X-Internal-Token` matches the
/// shared secret, so calls that bypass the gateway fail closed.
async fn internal_auth(
    State(state): State<AppState>,
    mut request: Request,
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

    let user_id = request
        .headers()
        .get("X-User-ID")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError(Error::Unauthorized("X-User-ID header required".into())))?;

    let user_id = Uuid::parse_str(user_id)
        .map_err(|_| ApiError(Error::InvalidRequest("Invalid user ID format".into())))?;

    request.extensions_mut().insert(UserId(user_id));
    Ok(next.run(request).await)
}

pub fn router(state: AppState) -> Router {
    let tasks = Router::new()
        .route("/api/v1/tasks", get(list_tasks))
        .route("/api/v1/tasks/stats", get(task_stats))
        .route("/api/v1/tasks/:id", get(get_task))
        .route("/api/v1/tasks/:id", put(update_task))
        .route("/api/v1/tasks/:id", delete(delete_task))
        .route("/api/v1/tasks/:id/complete", post(complete_task))
        .layer(middleware::from_fn_with_state(state.clone(), internal_auth));

    Router::new()
        .merge(tasks)
        .route("/health", get(health))
        .route("/api/health", get(health))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_tasks(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Query(filter): Query<TaskFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let tasks = state.tasks.list(user_id, &filter).await?;
    Ok(Json(tasks))
}

async fn get_task(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state.tasks.find(user_id, id).await?;
    Ok(Json(task))
}

async fn update_task(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(id): Path<Uuid>,
    Json(update): Json<TaskUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    state.tasks.update(user_id, id, &update).await?;
    Ok(Json(json!({ "message": "Task updated successfully" })))
}

async fn delete_task(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.tasks.delete(user_id, id).await?;
    Ok(Json(json!({ "message": "Task deleted successfully" })))
}

async fn complete_task(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.tasks.complete(user_id, id).await?;
    Ok(Json(json!({ "message": "Task completed" })))
}

async fn task_stats(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state.tasks.stats(user_id).await?;
    Ok(Json(stats))
}
