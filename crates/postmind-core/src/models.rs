//! Domain models and broker wire formats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered account.
///
/// `version` is monotonically increasing; bumping it invalidates every
/// previously issued refresh token for this user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user-owned mailbox integration.
///
/// `password` holds the AES-256-GCM ciphertext; the plaintext never leaves
/// the sync call that decrypted it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailIntegration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email_address: String,
    pub imap_host: String,
    pub imap_port: i32,
    pub use_ssl: bool,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An un-analyzed IMAP message persisted by the mailbox service.
///
/// `(user_id, message_id)` is the idempotency key for sync.
#[derive(Debug, Clone)]
pub struct RawEmail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message_id: String,
    pub from_address: String,
    pub subject: String,
    pub body_text: String,
    pub date_received: DateTime<Utc>,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

/// Task lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
    Archived,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "cancelled" => Some(TaskStatus::Cancelled),
            "archived" => Some(TaskStatus::Archived),
            _ => None,
        }
    }
}

/// Task urgency buckets derived from deadline proximity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(TaskPriority::Low),
            "medium" => Some(TaskPriority::Medium),
            "high" => Some(TaskPriority::High),
            "urgent" => Some(TaskPriority::Urgent),
            _ => None,
        }
    }

    /// Derive a priority from deadline proximity.
    ///
    /// Whole days until the deadline: ≤1 → urgent, ≤3 → high, ≤7 → medium,
    /// otherwise low. An absent deadline counts as far future.
    pub fn from_deadline(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(deadline) = deadline else {
            return TaskPriority::Low;
        };
        let days_until = (deadline - now).num_hours() / 24;
        match days_until {
            d if d <= 1 => TaskPriority::Urgent,
            d if d <= 3 => TaskPriority::High,
            d if d <= 7 => TaskPriority::Medium,
            _ => TaskPriority::Low,
        }
    }
}

/// A user-facing reminder materialized from a parsed email.
///
/// `(user_id, email_id)` is unique; `completed_at` is set in the same
/// write that sets `status = completed`.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email_id: Uuid,
    pub title: String,
    pub description: String,
    pub deadline: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Filter for listing a user's tasks. Conditions compose with AND.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub from_deadline: Option<DateTime<Utc>>,
    pub to_deadline: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Bounds applied to [`TaskFilter`] paging.
pub const TASK_LIMIT_DEFAULT: i64 = 50;
pub const TASK_LIMIT_MAX: i64 = 100;

impl TaskFilter {
    /// Effective limit: clamped to 1..=100, default 50.
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(TASK_LIMIT_DEFAULT)
            .clamp(1, TASK_LIMIT_MAX)
    }

    /// Effective offset: non-negative, default 0.
    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Partial update of a task; absent fields are untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.deadline.is_none()
            && self.status.is_none()
            && self.priority.is_none()
    }
}

/// Aggregate counters over one user's tasks, computed in a single scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskStats {
    pub total_tasks: i64,
    pub pending_tasks: i64,
    pub completed_tasks: i64,
    pub overdue_tasks: i64,
    pub today_tasks: i64,
    pub this_week_tasks: i64,
}

// ---------------------------------------------------------------------------
// Broker wire formats
// ---------------------------------------------------------------------------

/// One raw email inside a [`RawEmailsEnvelope`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEmailMessage {
    pub email_id: Uuid,
    pub user_id: Uuid,
    pub message_id: String,
    pub from_address: String,
    pub subject: String,
    pub body_text: String,
    pub date_received: DateTime<Utc>,
    pub sync_timestamp: DateTime<Utc>,
}

/// A batch of raw emails published by the syncer; one envelope is one
/// analyzer work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEmailsEnvelope {
    pub emails: Vec<RawEmailMessage>,
    pub batch_size: usize,
    pub sync_timestamp: DateTime<Utc>,
}

/// LLM-extracted structured view of a raw email. Wire-only.
///
/// `deadline` serializes as the zero timestamp (`0001-01-01T00:00:00Z`)
/// when absent, matching the queue contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedEmail {
    pub user_id: Uuid,
    pub email_id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(with = "zero_deadline")]
    pub deadline: Option<DateTime<Utc>>,
    pub from_address: String,
}

/// Serde codec mapping `Option<DateTime<Utc>>` to the wire convention of a
/// zero timestamp standing in for "no deadline".
pub mod zero_deadline {
    use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    fn zero_value() -> DateTime<Utc> {
        let date = NaiveDate::from_ymd_opt(1, 1, 1)
            .unwrap_or(NaiveDate::MIN)
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default();
        Utc.from_utc_datetime(&date)
    }

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.unwrap_or_else(zero_value).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<DateTime<Utc>>::deserialize(deserializer)?;
        // Year 1 (or earlier) is the zero timestamp, not a real deadline.
        Ok(value.filter(|dt| dt.year() > 1))
    }
}

/// Normalize a mailbox address for storage and uniqueness checks.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
