/// Task model
///
/// Tasks belong to a project, carry a workflow status and three JSON-typed
/// columns: `custom_fields` (free-form object), `tags` (array of strings) and
/// `metadata` (free-form object). A task is live while `deleted_at` is NULL.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id BIGSERIAL PRIMARY KEY,
///     project_id BIGINT NOT NULL REFERENCES projects (id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     description TEXT NOT NULL DEFAULT '',
///     status VARCHAR(20) NOT NULL DEFAULT 'todo',
///     assignee_id BIGINT REFERENCES users (id) ON DELETE SET NULL,
///     due_date TIMESTAMPTZ,
///     custom_fields JSONB DEFAULT '{}'::jsonb,
///     tags JSONB DEFAULT '[]'::jsonb,
///     metadata JSONB DEFAULT '{}'::jsonb,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```
/// use tasktrail_shared::models::task::{CreateTask, TaskStatus};
/// use serde_json::json;
///
/// let mut new_task = CreateTask::new(1, "Write release notes");
/// new_task.custom_fields.insert("priority".into(), json!("high"));
/// new_task.tags = vec!["docs".into()];
///
/// assert_eq!(new_task.status, TaskStatus::Todo);
/// ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::json::{self, JsonMap};
use crate::error::RepoError;

pub const TASK_TITLE_MAX_LEN: usize = 255;

/// Workflow status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    /// Converts status to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Whether no further work is expected
    pub fn is_closed(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}

impl FromStr for TaskStatus {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(RepoError::validation(
                "status",
                format!("unknown status '{other}'"),
            )),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,

    /// 1 to 255 characters
    pub title: String,

    pub description: String,
    pub status: TaskStatus,
    pub assignee_id: Option<i64>,
    pub due_date: Option<DateTime<Utc>>,
    pub custom_fields: JsonMap,
    pub tags: Vec<String>,
    pub metadata: JsonMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Set while the task sits in the recycle bin
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub(crate) fn check(&self) -> Result<(), RepoError> {
        check_title(&self.title)
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TaskRow {
    id: i64,
    project_id: i64,
    title: String,
    description: String,
    status: String,
    assignee_id: Option<i64>,
    due_date: Option<DateTime<Utc>>,
    custom_fields: Option<JsonValue>,
    tags: Option<JsonValue>,
    metadata: Option<JsonValue>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<TaskRow> for Task {
    type Error = RepoError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            id: row.id,
            project_id: row.project_id,
            title: row.title,
            description: row.description,
            status: row.status.parse()?,
            assignee_id: row.assignee_id,
            due_date: row.due_date,
            custom_fields: json::decode("custom_fields", row.custom_fields)?,
            tags: json::decode("tags", row.tags)?,
            metadata: json::decode("metadata", row.metadata)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

/// Input for creating a new task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub project_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub assignee_id: Option<i64>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub custom_fields: JsonMap,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl CreateTask {
    /// A `todo` task with only a title
    pub fn new(project_id: i64, title: impl Into<String>) -> Self {
        Self {
            project_id,
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Todo,
            assignee_id: None,
            due_date: None,
            custom_fields: JsonMap::new(),
            tags: Vec::new(),
            metadata: JsonMap::new(),
        }
    }

    pub(crate) fn check(&self) -> Result<(), RepoError> {
        check_title(&self.title)
    }
}

fn check_title(title: &str) -> Result<(), RepoError> {
    let len = title.chars().count();
    if len == 0 || len > TASK_TITLE_MAX_LEN {
        return Err(RepoError::validation(
            "title",
            format!("must be 1 to {TASK_TITLE_MAX_LEN} characters"),
        ));
    }
    Ok(())
}
