/// Project model
///
/// A project is live while `deleted_at` is NULL. Soft-deleting it moves the
/// project, and every task that was live at that moment, into the recycle bin
/// with one shared deletion stamp.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE projects (
///     id BIGSERIAL PRIMARY KEY,
///     name VARCHAR(100) NOT NULL,
///     description TEXT NOT NULL DEFAULT '',
///     owner_id BIGINT NOT NULL REFERENCES users (id) ON DELETE RESTRICT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RepoError;

pub const PROJECT_NAME_MAX_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: i64,

    /// 1 to 100 characters
    pub name: String,

    pub description: String,

    /// User that owns the project
    pub owner_id: i64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Set while the project sits in the recycle bin
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub(crate) fn check(&self) -> Result<(), RepoError> {
        check_name(&self.name)
    }
}

/// Input for creating a new project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner_id: i64,
}

impl CreateProject {
    pub(crate) fn check(&self) -> Result<(), RepoError> {
        check_name(&self.name)
    }
}

fn check_name(name: &str) -> Result<(), RepoError> {
    let len = name.chars().count();
    if len == 0 || len > PROJECT_NAME_MAX_LEN {
        return Err(RepoError::validation(
            "name",
            format!("must be 1 to {PROJECT_NAME_MAX_LEN} characters"),
        ));
    }
    Ok(())
}

/// Result of soft-deleting a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProjectDeletion {
    /// Live tasks that were moved to the recycle bin alongside the project
    pub cascaded_tasks: i64,
}

/// Result of restoring a project from the recycle bin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProjectRestore {
    /// Tasks that had been recycled with the project and are live again
    pub restored_tasks: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_bounds() {
        let mut new_project = CreateProject {
            name: "Alpha".into(),
            description: "x".into(),
            owner_id: 1,
        };
        assert!(new_project.check().is_ok());

        new_project.name = "ä".repeat(100);
        assert!(new_project.check().is_ok());

        new_project.name = "a".repeat(101);
        assert!(new_project.check().is_err());

        new_project.name = String::new();
        assert!(new_project.check().is_err());
    }

    #[test]
    fn test_description_defaults_when_absent() {
        let parsed: CreateProject =
            serde_json::from_str(r#"{"name": "Alpha", "owner_id": 3}"#).unwrap();
        assert_eq!(parsed.description, "");
    }
}
