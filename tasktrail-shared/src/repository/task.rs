//! Task repository
//!
//! Custom fields, tags and metadata are encoded to JSONB on write and decoded on
//! read. `bulk_create` issues one insert per task on the repository's context; run
//! it on a transaction context when the batch must be all-or-nothing.

use sqlx::postgres::PgRow;
use sqlx::FromRow;
use tracing::{debug, info};

use super::table::{Filter, Record, SoftDeletable, Table};
use crate::db::context::ExecutionContext;
use crate::error::{Entity, Operation, RepoError};
use crate::models::json;
use crate::models::task::{CreateTask, Task, TaskRow, TaskStatus};

pub(crate) const TASK_COLUMNS: &str = "id, project_id, title, description, status, assignee_id, due_date, \
     custom_fields, tags, metadata, created_at, updated_at, deleted_at";

impl Record for Task {
    const ENTITY: Entity = Entity::Task;
    const TABLE: &'static str = "tasks";
    const COLUMNS: &'static str = TASK_COLUMNS;
    const VISIBLE: &'static str = "deleted_at IS NULL";

    fn decode(row: &PgRow) -> Result<Self, RepoError> {
        TaskRow::from_row(row)
            .map_err(RepoError::decode(Entity::Task))?
            .try_into()
    }
}

impl SoftDeletable for Task {}

#[derive(Clone)]
pub struct TaskRepository<C> {
    table: Table<C, Task>,
}

impl<C: ExecutionContext> TaskRepository<C> {
    pub fn new(ctx: C) -> Self {
        Self {
            table: Table::new(ctx),
        }
    }

    pub async fn create(&self, new_task: CreateTask) -> Result<Task, RepoError> {
        new_task.check()?;

        let custom_fields = json::encode("custom_fields", &new_task.custom_fields)?;
        let tags = json::encode("tags", &new_task.tags)?;
        let metadata = json::encode("metadata", &new_task.metadata)?;

        let sql = format!(
            "INSERT INTO tasks
                (project_id, title, description, status, assignee_id, due_date, custom_fields, tags, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {TASK_COLUMNS}"
        );
        let query = sqlx::query(&sql)
            .bind(new_task.project_id)
            .bind(new_task.title)
            .bind(new_task.description)
            .bind(new_task.status.as_str())
            .bind(new_task.assignee_id)
            .bind(new_task.due_date)
            .bind(custom_fields)
            .bind(tags)
            .bind(metadata);

        let task = self.table.fetch_returning(Operation::Create, query).await?;
        debug!(task_id = task.id, project_id = task.project_id, "Task created");
        Ok(task)
    }

    /// Creates every task in order on this repository's context
    ///
    /// Stops at the first failure. Tasks inserted before it stay in place unless
    /// the surrounding transaction is rolled back.
    pub async fn bulk_create(&self, new_tasks: Vec<CreateTask>) -> Result<Vec<Task>, RepoError> {
        if new_tasks.is_empty() {
            return Ok(Vec::new());
        }

        for new_task in &new_tasks {
            new_task.check()?;
        }

        let mut created = Vec::with_capacity(new_tasks.len());
        for new_task in new_tasks {
            created.push(self.create(new_task).await?);
        }

        info!(count = created.len(), "Tasks bulk created");
        Ok(created)
    }

    /// Live task by id
    pub async fn get_by_id(&self, id: i64) -> Result<Task, RepoError> {
        self.table.get(id).await
    }

    /// Replaces every mutable field of a live task
    pub async fn update(&self, task: &Task) -> Result<Task, RepoError> {
        task.check()?;

        let custom_fields = json::encode("custom_fields", &task.custom_fields)?;
        let tags = json::encode("tags", &task.tags)?;
        let metadata = json::encode("metadata", &task.metadata)?;

        let sql = format!(
            "UPDATE tasks SET
                title = $2, description = $3, status = $4, assignee_id = $5, due_date = $6,
                custom_fields = $7, tags = $8, metadata = $9, updated_at = NOW()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {TASK_COLUMNS}"
        );
        let query = sqlx::query(&sql)
            .bind(task.id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.status.as_str())
            .bind(task.assignee_id)
            .bind(task.due_date)
            .bind(custom_fields)
            .bind(tags)
            .bind(metadata);

        self.table
            .fetch_optional(Operation::Update, query)
            .await?
            .ok_or_else(|| RepoError::not_found(Entity::Task, task.id))
    }

    /// Sets the status of a live task; nothing but `status` and `updated_at` changes
    pub async fn update_status(&self, id: i64, status: TaskStatus) -> Result<(), RepoError> {
        let query = sqlx::query(
            "UPDATE tasks SET status = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(status.as_str());

        let affected = self.table.execute(Operation::UpdateStatus, query).await?;
        if affected == 0 {
            return Err(RepoError::not_found(Entity::Task, id));
        }

        debug!(task_id = id, status = %status, "Task status updated");
        Ok(())
    }

    /// Moves a live task to the recycle bin
    pub async fn delete(&self, id: i64) -> Result<(), RepoError> {
        self.table.soft_delete(id).await?;
        info!(task_id = id, "Task moved to recycle bin");
        Ok(())
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Task>, i64), RepoError> {
        self.table.list(&Filter::All, limit, offset).await
    }

    pub async fn get_by_project_id(
        &self,
        project_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Task>, i64), RepoError> {
        self.table
            .list(&Filter::Int("project_id", project_id), limit, offset)
            .await
    }

    pub async fn get_by_status(
        &self,
        status: TaskStatus,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Task>, i64), RepoError> {
        self.table
            .list(
                &Filter::Text("status", status.as_str().to_string()),
                limit,
                offset,
            )
            .await
    }
}
