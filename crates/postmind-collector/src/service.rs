//! Task materialization from parsed emails.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use postmind_core::{
    ParsedEmail, Result, Task, TaskPriority, TaskRepository, TaskStatus,
};

/// Hard cap on stored task titles.
pub const MAX_TITLE_LEN: usize = 500;

/// Materializes tasks from parsed emails; idempotent on
/// `(user_id, email_id)`.
pub struct TaskService {
    tasks: Arc<dyn TaskRepository>,
}

impl TaskService {
    pub fn new(tasks: Arc<dyn TaskRepository>) -> Self {
        Self { tasks }
    }

    /// Ingest one parsed email.
    ///
    /// Re-deliveries of the same email are skipped; priority is derived
    /// from deadline proximity with an absent deadline counting as far
    /// future.
    pub async fn ingest(&self, parsed: &ParsedEmail) -> Result<()> {
        if self.tasks.exists(parsed.user_id, parsed.email_id).await? {
            debug!(
                subsystem = "collector",
                op = "ingest",
                email_id = %parsed.email_id,
                "Task already exists, skipping"
            );
            return Ok(());
        }

        let now = Utc::now();
        let title: String = parsed.title.chars().take(MAX_TITLE_LEN).collect();

        let task = Task {
            id: Uuid::new_v4(),
            user_id: parsed.user_id,
            email_id: parsed.email_id,
            title,
            description: parsed.description.clone(),
            deadline: parsed.deadline,
            status: TaskStatus::Pending,
            priority: TaskPriority::from_deadline(parsed.deadline, now),
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        self.tasks.insert(&task).await?;

        info!(
            subsystem = "collector",
            op = "ingest",
            task_id = %task.id,
            user_id = %task.user_id,
            priority = task.priority.as_str(),
            "Task created"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use postmind_core::{Error, TaskFilter, TaskStats, TaskUpdate};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemTasks {
        rows: Mutex<HashMap<(Uuid, Uuid), Task>>,
    }

    #[async_trait]
    impl TaskRepository for MemTasks {
        async fn exists(&self, user_id: Uuid, email_id: Uuid) -> Result<bool> {
            Ok(self.rows.lock().unwrap().contains_key(&(user_id, email_id)))
        }

        async fn insert(&self, task: &Task) -> Result<()> {
            self.rows
                .lock()
                .unwrap()
                .entry((task.user_id, task.email_id))
                .or_insert_with(|| task.clone());
            Ok(())
        }

        async fn find(&self, _user_id: Uuid, task_id: Uuid) -> Result<Task> {
            Err(Error::TaskNotFound(task_id))
        }

        async fn list(&self, _user_id: Uuid, _filter: &TaskFilter) -> Result<Vec<Task>> {
            Ok(vec![])
        }

        async fn update(
            &self,
            _user_id: Uuid,
            _task_id: Uuid,
            _update: &TaskUpdate,
        ) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _user_id: Uuid, task_id: Uuid) -> Result<()> {
            Err(Error::TaskNotFound(task_id))
        }

        async fn complete(&self, _user_id: Uuid, task_id: Uuid) -> Result<()> {
            Err(Error::TaskNotFound(task_id))
        }

        async fn stats(&self, _user_id: Uuid) -> Result<TaskStats> {
            Ok(TaskStats::default())
        }
    }

    fn parsed(deadline: Option<chrono::DateTime<Utc>>) -> ParsedEmail {
        ParsedEmail {
            user_id: Uuid::new_v4(),
            email_id: Uuid::new_v4(),
            title: "Сдать отчёт".to_string(),
            description: "к пятнице".to_string(),
            deadline,
            from_address: "boss@work.io".to_string(),
        }
    }

    #[tokio::test]
    async fn test_ingest_creates_pending_task() {
        let tasks = Arc::new(MemTasks::default());
        let service = TaskService::new(tasks.clone());

        let email = parsed(Some(Utc::now() + Duration::hours(12)));
        service.ingest(&email).await.unwrap();

        let rows = tasks.rows.lock().unwrap();
        let task = rows.values().next().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Urgent);
        assert_eq!(task.email_id, email.email_id);
        assert!(task.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_ingest_is_idempotent() {
        let tasks = Arc::new(MemTasks::default());
        let service = TaskService::new(tasks.clone());

        let email = parsed(None);
        service.ingest(&email).await.unwrap();
        service.ingest(&email).await.unwrap();

        assert_eq!(tasks.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_deadline_is_low_priority() {
        let tasks = Arc::new(MemTasks::default());
        let service = TaskService::new(tasks.clone());

        service.ingest(&parsed(None)).await.unwrap();

        let rows = tasks.rows.lock().unwrap();
        let task = rows.values().next().unwrap();
        assert_eq!(task.priority, TaskPriority::Low);
        assert_eq!(task.deadline, None);
    }

    #[tokio::test]
    async fn test_overlong_title_is_truncated() {
        let tasks = Arc::new(MemTasks::default());
        let service = TaskService::new(tasks.clone());

        let mut email = parsed(None);
        email.title = "x".repeat(700);
        service.ingest(&email).await.unwrap();

        let rows = tasks.rows.lock().unwrap();
        assert_eq!(rows.values().next().unwrap().title.chars().count(), 500);
    }
}
