//! Read-only projections over the recycle bin
//!
//! Both types are backed by views (`recycled_projects`, `recycled_tasks`) and
//! exist only while the underlying row has a deletion stamp.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::json::{self, JsonMap};
use super::task::TaskStatus;
use crate::error::RepoError;

/// A soft-deleted project with its owner's name and cascade count
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct RecycledProject {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub owner_id: i64,
    pub owner_username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: DateTime<Utc>,
    /// Tasks that were recycled together with the project
    pub deleted_tasks_count: i64,
}

/// A soft-deleted task with its project and assignee names
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecycledTask {
    pub id: i64,
    pub project_id: i64,
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
    pub deleted_at: DateTime<Utc>,
    pub project_name: Option<String>,
    pub assignee_username: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RecycledTaskRow {
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
    deleted_at: DateTime<Utc>,
    project_name: Option<String>,
    assignee_username: Option<String>,
}

impl TryFrom<RecycledTaskRow> for RecycledTask {
    type Error = RepoError;

    fn try_from(row: RecycledTaskRow) -> Result<Self, Self::Error> {
        Ok(RecycledTask {
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
            project_name: row.project_name,
            assignee_username: row.assignee_username,
        })
    }
}
