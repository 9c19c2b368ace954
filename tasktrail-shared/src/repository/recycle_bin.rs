//! Recycle bin
//!
//! Browses, restores and permanently deletes soft-deleted projects and tasks.
//! Every operation here only acts on rows that are currently in the bin and
//! reports `NotFoundInRecycleBin` otherwise, so a live row can never be
//! hard-deleted in one step.
//!
//! Projects and their cascaded tasks share one deletion stamp. Restoring a
//! project brings back exactly the tasks carrying that stamp; tasks that were
//! deleted on their own stay in the bin. A recycled project is only purged
//! once none of its tasks is live.

use sqlx::postgres::PgRow;
use sqlx::FromRow;
use tracing::info;

use super::project::ProjectRepository;
use super::table::{Filter, Record, Table};
use crate::db::context::ExecutionContext;
use crate::error::{Entity, Operation, RepoError};
use crate::models::project::ProjectRestore;
use crate::models::recycled::{RecycledProject, RecycledTask, RecycledTaskRow};
use crate::models::task::Task;

impl Record for RecycledProject {
    const ENTITY: Entity = Entity::Project;
    const TABLE: &'static str = "recycled_projects";
    const COLUMNS: &'static str = "id, name, description, owner_id, owner_username, \
         created_at, updated_at, deleted_at, deleted_tasks_count";
    const ORDER_BY: &'static str = "deleted_at DESC, id DESC";

    fn decode(row: &PgRow) -> Result<Self, RepoError> {
        RecycledProject::from_row(row).map_err(RepoError::decode(Entity::Project))
    }
}

impl Record for RecycledTask {
    const ENTITY: Entity = Entity::Task;
    const TABLE: &'static str = "recycled_tasks";
    const COLUMNS: &'static str = "id, project_id, title, description, status, assignee_id, due_date, \
         custom_fields, tags, metadata, created_at, updated_at, deleted_at, project_name, assignee_username";
    const ORDER_BY: &'static str = "deleted_at DESC, id DESC";

    fn decode(row: &PgRow) -> Result<Self, RepoError> {
        RecycledTaskRow::from_row(row)
            .map_err(RepoError::decode(Entity::Task))?
            .try_into()
    }
}

#[derive(Clone)]
pub struct RecycleBin<C> {
    projects: ProjectRepository<C>,
    recycled_projects: Table<C, RecycledProject>,
    tasks: Table<C, Task>,
    recycled_tasks: Table<C, RecycledTask>,
}

impl<C: ExecutionContext> RecycleBin<C> {
    pub fn new(ctx: C) -> Self {
        Self {
            projects: ProjectRepository::new(ctx.clone()),
            recycled_projects: Table::new(ctx.clone()),
            tasks: Table::new(ctx.clone()),
            recycled_tasks: Table::new(ctx),
        }
    }

    /// Recycled projects, most recently deleted first
    pub async fn list_recycled_projects(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<RecycledProject>, i64), RepoError> {
        self.recycled_projects.list(&Filter::All, limit, offset).await
    }

    /// Recycled tasks, most recently deleted first
    pub async fn list_recycled_tasks(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<RecycledTask>, i64), RepoError> {
        self.recycled_tasks.list(&Filter::All, limit, offset).await
    }

    /// Recycled project by id
    pub async fn get_recycled_project(&self, id: i64) -> Result<RecycledProject, RepoError> {
        self.recycled_projects.get(id).await.map_err(|err| match err {
            RepoError::NotFound { .. } => RepoError::NotFoundInRecycleBin {
                entity: Entity::Project,
                id,
            },
            other => other,
        })
    }

    /// Recycled task by id
    pub async fn get_recycled_task(&self, id: i64) -> Result<RecycledTask, RepoError> {
        self.recycled_tasks.get(id).await.map_err(|err| match err {
            RepoError::NotFound { .. } => RepoError::NotFoundInRecycleBin {
                entity: Entity::Task,
                id,
            },
            other => other,
        })
    }

    /// Restores a project together with the tasks recycled alongside it
    ///
    /// The project row is locked for the duration of the statement, so of two
    /// concurrent restores exactly one succeeds.
    pub async fn restore_project(&self, id: i64) -> Result<ProjectRestore, RepoError> {
        let query = sqlx::query(
            r#"
            WITH target AS (
                SELECT id, deleted_at
                FROM projects
                WHERE id = $1 AND deleted_at IS NOT NULL
                FOR UPDATE
            ), project AS (
                UPDATE projects
                SET deleted_at = NULL
                FROM target
                WHERE projects.id = target.id
                RETURNING projects.id
            ), cascaded AS (
                UPDATE tasks
                SET deleted_at = NULL
                FROM target
                WHERE tasks.project_id = target.id AND tasks.deleted_at = target.deleted_at
                RETURNING tasks.id
            )
            SELECT
                (SELECT COUNT(*) FROM project) AS projects,
                (SELECT COUNT(*) FROM cascaded) AS tasks
            "#,
        )
        .bind(id);

        let (projects, tasks) = self
            .projects
            .affected_counts(Operation::Restore, query)
            .await?;

        if projects == 0 {
            return Err(RepoError::NotFoundInRecycleBin {
                entity: Entity::Project,
                id,
            });
        }

        info!(project_id = id, restored_tasks = tasks, "Project restored from recycle bin");
        Ok(ProjectRestore {
            restored_tasks: tasks,
        })
    }

    /// Permanently deletes a recycled project; its recycled tasks go with it
    ///
    /// Refused with `Conflict` while any of the project's tasks is live, which
    /// happens when a task was restored on its own after the project was
    /// deleted. The task rows are locked alongside the project, so a concurrent
    /// task restore either lands first and blocks the purge or finds nothing to
    /// restore.
    pub async fn hard_delete_project(&self, id: i64) -> Result<(), RepoError> {
        let query = sqlx::query(
            r#"
            WITH target AS (
                SELECT id
                FROM projects
                WHERE id = $1 AND deleted_at IS NOT NULL
                FOR UPDATE
            ), children AS (
                SELECT tasks.id, tasks.deleted_at
                FROM tasks
                JOIN target ON tasks.project_id = target.id
                FOR UPDATE OF tasks
            ), purged AS (
                DELETE FROM projects
                USING target
                WHERE projects.id = target.id
                  AND NOT EXISTS (SELECT 1 FROM children WHERE children.deleted_at IS NULL)
                RETURNING projects.id
            )
            SELECT
                (SELECT COUNT(*) FROM target) AS projects,
                (SELECT COUNT(*) FROM children WHERE deleted_at IS NULL) AS tasks,
                (SELECT COUNT(*) FROM purged) AS purged
            "#,
        )
        .bind(id);

        let (projects, live_tasks) = self
            .projects
            .affected_counts(Operation::HardDelete, query)
            .await?;

        if projects == 0 {
            return Err(RepoError::NotFoundInRecycleBin {
                entity: Entity::Project,
                id,
            });
        }
        if live_tasks > 0 {
            return Err(RepoError::Conflict {
                entity: Entity::Project,
                message: format!(
                    "project {id} still has {live_tasks} live task(s); delete them before purging the project"
                ),
            });
        }

        info!(project_id = id, "Project permanently deleted");
        Ok(())
    }

    /// Restores a single task
    ///
    /// Allowed while the task's project is still recycled. The project then
    /// cannot be purged until the task is deleted again.
    pub async fn restore_task(&self, id: i64) -> Result<(), RepoError> {
        self.tasks.restore(id).await?;
        info!(task_id = id, "Task restored from recycle bin");
        Ok(())
    }

    /// Permanently deletes a recycled task
    pub async fn hard_delete_task(&self, id: i64) -> Result<(), RepoError> {
        self.tasks.purge(id).await?;
        info!(task_id = id, "Task permanently deleted");
        Ok(())
    }
}
