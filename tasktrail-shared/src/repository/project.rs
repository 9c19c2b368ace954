//! Project repository
//!
//! Soft-deleting a project cascades: in the same statement every live task of
//! the project receives the project's exact deletion stamp. Restoring from the
//! recycle bin reverses exactly that set (see
//! [`RecycleBin::restore_project`](super::recycle_bin::RecycleBin::restore_project)).

use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use tracing::info;

use super::table::{Filter, Record, SoftDeletable, Table};
use crate::db::context::ExecutionContext;
use crate::error::{Entity, Operation, RepoError};
use crate::models::project::{CreateProject, Project, ProjectDeletion};

pub(crate) const PROJECT_COLUMNS: &str =
    "id, name, description, owner_id, created_at, updated_at, deleted_at";

impl Record for Project {
    const ENTITY: Entity = Entity::Project;
    const TABLE: &'static str = "projects";
    const COLUMNS: &'static str = PROJECT_COLUMNS;
    const VISIBLE: &'static str = "deleted_at IS NULL";

    fn decode(row: &PgRow) -> Result<Self, RepoError> {
        Project::from_row(row).map_err(RepoError::decode(Entity::Project))
    }
}

impl SoftDeletable for Project {}

#[derive(Clone)]
pub struct ProjectRepository<C> {
    table: Table<C, Project>,
}

impl<C: ExecutionContext> ProjectRepository<C> {
    pub fn new(ctx: C) -> Self {
        Self {
            table: Table::new(ctx),
        }
    }

    pub async fn create(&self, new_project: CreateProject) -> Result<Project, RepoError> {
        new_project.check()?;

        let sql = format!(
            "INSERT INTO projects (name, description, owner_id) VALUES ($1, $2, $3) RETURNING {PROJECT_COLUMNS}"
        );
        let query = sqlx::query(&sql)
            .bind(new_project.name)
            .bind(new_project.description)
            .bind(new_project.owner_id);

        let project = self.table.fetch_returning(Operation::Create, query).await?;
        info!(project_id = project.id, owner_id = project.owner_id, "Project created");
        Ok(project)
    }

    /// Live project by id
    pub async fn get_by_id(&self, id: i64) -> Result<Project, RepoError> {
        self.table.get(id).await
    }

    /// Live projects owned by `owner_id`, newest first
    pub async fn get_by_owner(
        &self,
        owner_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Project>, i64), RepoError> {
        self.table
            .list(&Filter::Int("owner_id", owner_id), limit, offset)
            .await
    }

    /// Replaces name and description of a live project
    ///
    /// The owner is never changed through this call.
    pub async fn update(&self, project: &Project) -> Result<Project, RepoError> {
        project.check()?;

        let sql = format!(
            "UPDATE projects SET name = $2, description = $3, updated_at = NOW()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {PROJECT_COLUMNS}"
        );
        let query = sqlx::query(&sql)
            .bind(project.id)
            .bind(&project.name)
            .bind(&project.description);

        self.table
            .fetch_optional(Operation::Update, query)
            .await?
            .ok_or_else(|| RepoError::not_found(Entity::Project, project.id))
    }

    /// Moves a live project and its live tasks to the recycle bin
    pub async fn delete(&self, id: i64) -> Result<ProjectDeletion, RepoError> {
        let query = sqlx::query(
            r#"
            WITH project AS (
                UPDATE projects
                SET deleted_at = NOW()
                WHERE id = $1 AND deleted_at IS NULL
                RETURNING id, deleted_at
            ), cascaded AS (
                UPDATE tasks
                SET deleted_at = project.deleted_at
                FROM project
                WHERE tasks.project_id = project.id AND tasks.deleted_at IS NULL
                RETURNING tasks.id
            )
            SELECT
                (SELECT COUNT(*) FROM project) AS projects,
                (SELECT COUNT(*) FROM cascaded) AS tasks
            "#,
        )
        .bind(id);

        let (projects, tasks) = self.affected_counts(Operation::Delete, query).await?;
        if projects == 0 {
            return Err(RepoError::not_found(Entity::Project, id));
        }

        info!(project_id = id, cascaded_tasks = tasks, "Project moved to recycle bin");
        Ok(ProjectDeletion {
            cascaded_tasks: tasks,
        })
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Project>, i64), RepoError> {
        self.table.list(&Filter::All, limit, offset).await
    }

    /// Runs a cascade statement and reads its `(projects, tasks)` counts
    pub(crate) async fn affected_counts(
        &self,
        op: Operation,
        query: crate::db::context::PgQuery<'_>,
    ) -> Result<(i64, i64), RepoError> {
        let row = self
            .table
            .context()
            .query_one(query)
            .await
            .map_err(RepoError::storage(Entity::Project, op))?;

        match row {
            Some(row) => {
                let projects: i64 = row
                    .try_get("projects")
                    .map_err(RepoError::decode(Entity::Project))?;
                let tasks: i64 = row
                    .try_get("tasks")
                    .map_err(RepoError::decode(Entity::Project))?;
                Ok((projects, tasks))
            }
            None => Ok((0, 0)),
        }
    }
}
