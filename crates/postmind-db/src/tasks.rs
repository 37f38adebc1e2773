//! Task repository: filtered query engine, partial updates, stats.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use postmind_core::{
    Error, Result, Task, TaskFilter, TaskPriority, TaskRepository, TaskStats, TaskStatus,
    TaskUpdate,
};

/// PostgreSQL implementation of [`TaskRepository`].
pub struct PgTaskRepository {
    pool: Pool<Postgres>,
}

const TASK_COLUMNS: &str = r#"id, user_id, email_id, title, description, deadline, status,
       priority, created_at, updated_at, completed_at"#;

impl PgTaskRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Task {
        let status: String = row.get("status");
        let priority: String = row.get("priority");
        Task {
            id: row.get("id"),
            user_id: row.get("user_id"),
            email_id: row.get("email_id"),
            title: row.get("title"),
            description: row.get("description"),
            deadline: row.get("deadline"),
            status: TaskStatus::parse(&status).unwrap_or(TaskStatus::Pending),
            priority: TaskPriority::parse(&priority).unwrap_or(TaskPriority::Low),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            completed_at: row.get("completed_at"),
        }
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn exists(&self, user_id: Uuid, email_id: Uuid) -> Result<bool> {
        let row = sqlx::query(
            r#"SELECT EXISTS(
                 SELECT 1 FROM tasks WHERE user_id = $1 AND email_id = $2
               ) AS found"#,
        )
        .bind(user_id)
        .bind(email_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("found"))
    }

    async fn insert(&self, task: &Task) -> Result<()> {
        // (user_id, email_id) is the ingest idempotency key; duplicate
        // deliveries from the broker land here more than once.
        sqlx::query(
            r#"INSERT INTO tasks
               (id, user_id, email_id, title, description, deadline, status,
                priority, created_at, updated_at, completed_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               ON CONFLICT (user_id, email_id) DO NOTHING"#,
        )
        .bind(task.id)
        .bind(task.user_id)
        .bind(task.email_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.deadline)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.created_at)
        .bind(task.updated_at)
        .bind(task.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, user_id: Uuid, task_id: Uuid) -> Result<Task> {
        let row = sqlx::query(&format!(
            r#"SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 AND user_id = $2"#
        ))
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::parse_row).ok_or(Error::TaskNotFound(task_id))
    }

    async fn list(&self, user_id: Uuid, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut sql = format!(r#"SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = $1"#);
        let mut arg = 2;

        if filter.status.is_some() {
            sql.push_str(&format!(" AND status = ${arg}"));
            arg += 1;
        }
        if filter.priority.is_some() {
            sql.push_str(&format!(" AND priority = ${arg}"));
            arg += 1;
        }
        if filter.from_deadline.is_some() {
            sql.push_str(&format!(" AND deadline >= ${arg}"));
            arg += 1;
        }
        if filter.to_deadline.is_some() {
            sql.push_str(&format!(" AND deadline <= ${arg}"));
            arg += 1;
        }

        // The ordering is part of the public contract.
        sql.push_str(" ORDER BY deadline ASC NULLS LAST, created_at DESC");
        sql.push_str(&format!(" LIMIT ${arg} OFFSET ${}", arg + 1));

        let mut query = sqlx::query(&sql).bind(user_id);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(priority) = filter.priority {
            query = query.bind(priority.as_str());
        }
        if let Some(from) = filter.from_deadline {
            query = query.bind(from);
        }
        if let Some(to) = filter.to_deadline {
            query = query.bind(to);
        }
        query = query
            .bind(filter.effective_limit())
            .bind(filter.effective_offset());

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn update(&self, user_id: Uuid, task_id: Uuid, update: &TaskUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        let mut sets = vec!["updated_at = NOW()".to_string()];
        let mut arg = 1;

        if update.title.is_some() {
            sets.push(format!("title = ${arg}"));
            arg += 1;
        }
        if update.description.is_some() {
            sets.push(format!("description = ${arg}"));
            arg += 1;
        }
        if update.deadline.is_some() {
            sets.push(format!("deadline = ${arg}"));
            arg += 1;
        }
        if let Some(status) = update.status {
            sets.push(format!("status = ${arg}"));
            arg += 1;
            // Completion stamps completed_at in the same statement.
            if status == TaskStatus::Completed {
                sets.push("completed_at = NOW()".to_string());
            }
        }
        if update.priority.is_some() {
            sets.push(format!("priority = ${arg}"));
            arg += 1;
        }

        let sql = format!(
            "UPDATE tasks SET {} WHERE id = ${arg} AND user_id = ${}",
            sets.join(", "),
            arg + 1
        );

        let mut query = sqlx::query(&sql);
        if let Some(ref title) = update.title {
            query = query.bind(title);
        }
        if let Some(ref description) = update.description {
            query = query.bind(description);
        }
        if let Some(deadline) = update.deadline {
            query = query.bind(deadline);
        }
        if let Some(status) = update.status {
            query = query.bind(status.as_str());
        }
        if let Some(priority) = update.priority {
            query = query.bind(priority.as_str());
        }
        query = query.bind(task_id).bind(user_id);

        let result = query.execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::TaskNotFound(task_id));
        }
        Ok(())
    }

    async fn delete(&self, user_id: Uuid, task_id: Uuid) -> Result<()> {
        let result = sqlx::query(r#"DELETE FROM tasks WHERE id = $1 AND user_id = $2"#)
            .bind(task_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::TaskNotFound(task_id));
        }
        Ok(())
    }

    async fn complete(&self, user_id: Uuid, task_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE tasks
               SET status = 'completed', completed_at = $1, updated_at = $1
               WHERE id = $2 AND user_id = $3"#,
        )
        .bind(Utc::now())
        .bind(task_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::TaskNotFound(task_id));
        }
        Ok(())
    }

    async fn stats(&self, user_id: Uuid) -> Result<TaskStats> {
        // All six counters in one scan over the user's tasks.
        let row = sqlx::query(
            r#"SELECT
                 COUNT(*) AS total,
                 COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                 COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                 COUNT(*) FILTER (WHERE deadline < NOW() AND status != 'completed') AS overdue,
                 COUNT(*) FILTER (WHERE DATE(deadline) = CURRENT_DATE AND status != 'completed') AS today,
                 COUNT(*) FILTER (WHERE deadline >= CURRENT_DATE
                                    AND deadline < CURRENT_DATE + INTERVAL '7 days'
                                    AND status != 'completed') AS this_week
               FROM tasks
               WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(TaskStats {
            total_tasks: row.get("total"),
            pending_tasks: row.get("pending"),
            completed_tasks: row.get("completed"),
            overdue_tasks: row.get("overdue"),
            today_tasks: row.get("today"),
            this_week_tasks: row.get("this_week"),
        })
    }
}
