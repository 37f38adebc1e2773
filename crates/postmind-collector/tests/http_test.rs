//! Task API behavior over an in-memory store: the internal identity
//! guard fails closed and every route is user-scoped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use tower::ServiceExt;
use uuid::Uuid;

use postmind_collector::{router, AppState};
use postmind_core::{
    Error, Result, Task, TaskFilter, TaskPriority, TaskRepository, TaskStats, TaskStatus,
    TaskUpdate,
};

const INTERNAL_TOKEN: &str = "shared-secret";

#[derive(Default)]
struct MemTasks {
    rows: Mutex<HashMap<Uuid, Task>>,
}

impl MemTasks {
    fn seed(&self, user_id: Uuid) -> Task {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            user_id,
            email_id: Uuid::new_v4(),
            title: "follow up".to_string(),
            description: "reply to the thread".to_string(),
            deadline: None,
            status: TaskStatus::Pending,
            priority: TaskPriority::Low,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.rows.lock().unwrap().insert(task.id, task.clone());
        task
    }
}

#[async_trait]
impl TaskRepository for MemTasks {
    async fn exists(&self, user_id: Uuid, email_id: Uuid) -> Result<bool> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .any(|t| t.user_id == user_id && t.email_id == email_id))
    }

    async fn insert(&self, task: &Task) -> Result<()> {
        self.rows.lock().unwrap().insert(task.id, task.clone());
        Ok(())
    }

    async fn find(&self, user_id: Uuid, task_id: Uuid) -> Result<Task> {
        self.rows
            .lock()
            .unwrap()
            .get(&task_id)
            .filter(|t| t.user_id == user_id)
            .cloned()
            .ok_or(Error::TaskNotFound(task_id))
    }

    async fn list(&self, user_id: Uuid, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.user_id == user_id)
            .filter(|t| filter.status.map(|s| t.status == s).unwrap_or(true))
            .cloned()
            .collect();
        tasks.truncate(filter.effective_limit() as usize);
        Ok(tasks)
    }

    async fn update(&self, user_id: Uuid, task_id: Uuid, update: &TaskUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let mut rows = self.rows.lock().unwrap();
        let task = rows
            .get_mut(&task_id)
            .filter(|t| t.user_id == user_id)
            .ok_or(Error::TaskNotFound(task_id))?;
        if let Some(ref title) = update.title {
            task.title = title.clone();
        }
        if let Some(status) = update.status {
            task.status = status;
            if status == TaskStatus::Completed {
                task.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn delete(&self, user_id: Uuid, task_id: Uuid) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get(&task_id) {
            Some(t) if t.user_id == user_id => {
                rows.remove(&task_id);
                Ok(())
            }
            _ => Err(Error::TaskNotFound(task_id)),
        }
    }

    async fn complete(&self, user_id: Uuid, task_id: Uuid) -> Result<()> {
        self.update(
            user_id,
            task_id,
            &TaskUpdate {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            },
        )
        .await
    }

    async fn stats(&self, user_id: Uuid) -> Result<TaskStats> {
        let rows = self.rows.lock().unwrap();
        let mine: Vec<&Task> = rows.values().filter(|t| t.user_id == user_id).collect();
        Ok(TaskStats {
            total_tasks: mine.len() as i64,
            pending_tasks: mine
                .iter()
                .filter(|t| t.status == TaskStatus::Pending)
                .count() as i64,
            completed_tasks: mine
                .iter()
                .filter(|t| t.status == TaskStatus::Completed)
                .count() as i64,
            ..Default::default()
        })
    }
}

fn app(tasks: Arc<MemTasks>) -> axum::Router {
    router(AppState {
        tasks,
        internal_token: INTERNAL_TOKEN.to_string(),
    })
}

fn request(method: &str, uri: &str, user_id: Option<Uuid>, internal: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = internal {
        builder = builder.header("X-Internal-Token", token);
    }
    if let Some(user_id) = user_id {
        builder = builder.header("X-User-ID", user_id.to_string());
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn missing_internal_token_is_forbidden_despite_user_header() {
    let tasks = Arc::new(MemTasks::default());
    let user = Uuid::new_v4();
    tasks.seed(user);

    let response = app(tasks)
        .oneshot(request("GET", "/api/v1/tasks", Some(user), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn wrong_internal_token_is_forbidden() {
    let tasks = Arc::new(MemTasks::default());
    let user = Uuid::new_v4();

    let response = app(tasks)
        .oneshot(request("GET", "/api/v1/tasks", Some(user), Some("guessed")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_user_id_is_unauthorized() {
    let tasks = Arc::new(MemTasks::default());

    let response = app(tasks)
        .oneshot(request("GET", "/api/v1/tasks", None, Some(INTERNAL_TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_user_id_is_bad_request() {
    let tasks = Arc::new(MemTasks::default());

    let response = app(tasks)
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/tasks")
                .header("X-Internal-Token", INTERNAL_TOKEN)
                .header("X-User-ID", "not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_returns_only_own_tasks() {
    let tasks = Arc::new(MemTasks::default());
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    tasks.seed(alice);
    tasks.seed(bob);

    let response = app(tasks)
        .oneshot(request(
            "GET",
            "/api/v1/tasks",
            Some(alice),
            Some(INTERNAL_TOKEN),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["user_id"], alice.to_string());
}

#[tokio::test]
async fn get_foreign_task_is_not_found() {
    let tasks = Arc::new(MemTasks::default());
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let bobs_task = tasks.seed(bob);

    let response = app(tasks)
        .oneshot(request(
            "GET",
            &format!("/api/v1/tasks/{}", bobs_task.id),
            Some(alice),
            Some(INTERNAL_TOKEN),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn complete_marks_task_and_stats_reflect_it() {
    let tasks = Arc::new(MemTasks::default());
    let user = Uuid::new_v4();
    let task = tasks.seed(user);

    let response = app(tasks.clone())
        .oneshot(request(
            "POST",
            &format!("/api/v1/tasks/{}/complete", task.id),
            Some(user),
            Some(INTERNAL_TOKEN),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    {
        let rows = tasks.rows.lock().unwrap();
        let stored = rows.get(&task.id).unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert!(stored.completed_at.is_some());
    }

    let response = app(tasks)
        .oneshot(request(
            "GET",
            "/api/v1/tasks/stats",
            Some(user),
            Some(INTERNAL_TOKEN),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    let stats: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(stats["completed_tasks"], 1);
    assert_eq!(stats["total_tasks"], 1);
}

#[tokio::test]
async fn health_needs_no_identity() {
    let tasks = Arc::new(MemTasks::default());
    let response = app(tasks)
        .oneshot(request("GET", "/api/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
