/// Task endpoints
///
/// Tasks are addressed through their project, and the project must be visible
/// to the caller (see [`owned_project`]). A task id that belongs to another
/// project answers 404.
///
/// # Endpoints
///
/// - `GET /api/v1/projects/:id/tasks?page&page_size`
/// - `POST /api/v1/projects/:id/tasks`
/// - `POST /api/v1/projects/:id/tasks/bulk-import`
/// - `GET /api/v1/projects/:id/tasks/:task_id`
/// - `PUT /api/v1/projects/:id/tasks/:task_id` (fields left out stay unchanged)
/// - `PATCH /api/v1/projects/:id/tasks/:task_id/status`
/// - `DELETE /api/v1/projects/:id/tasks/:task_id`
/// - `GET /api/v1/tasks?status=..` (admin)

use super::projects::owned_project;
use crate::{
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery, ClientMeta, Db, ValidJson},
    middleware::auth::AuthContext,
    response::{ApiResponse, Created},
};
use axum::Extension;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tasktrail_shared::{
    error::Entity,
    import::{check_batch_size, import_tasks, ImportSummary},
    models::{AuditAction, CreateTask, JsonMap, Page, PageRequest, Task, TaskStatus},
    repository::Repositories,
};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub status: TaskStatus,

    pub assignee_id: Option<i64>,

    pub due_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub custom_fields: JsonMap,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub metadata: JsonMap,
}

impl CreateTaskRequest {
    pub fn into_new_task(self, project_id: i64) -> CreateTask {
        CreateTask {
            project_id,
            title: self.title,
            description: self.description,
            status: self.status,
            assignee_id: self.assignee_id,
            due_date: self.due_date,
            custom_fields: self.custom_fields,
            tags: self.tags,
            metadata: self.metadata,
        }
    }
}

/// Partial task update; `null` and missing fields are both left unchanged
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: Option<String>,

    pub description: Option<String>,

    pub status: Option<TaskStatus>,

    pub assignee_id: Option<i64>,

    pub due_date: Option<DateTime<Utc>>,

    pub custom_fields: Option<JsonMap>,

    pub tags: Option<Vec<String>>,

    pub metadata: Option<JsonMap>,
}

impl UpdateTaskRequest {
    fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if self.assignee_id.is_some() {
            task.assignee_id = self.assignee_id;
        }
        if self.due_date.is_some() {
            task.due_date = self.due_date;
        }
        if let Some(custom_fields) = self.custom_fields {
            task.custom_fields = custom_fields;
        }
        if let Some(tags) = self.tags {
            task.tags = tags;
        }
        if let Some(metadata) = self.metadata {
            task.metadata = metadata;
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize)]
pub struct BulkImportRequest {
    pub tasks: Vec<CreateTaskRequest>,
}

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: TaskStatus,
}

#[derive(Debug, Serialize)]
pub struct StatusChange {
    pub id: i64,
    pub status: TaskStatus,
}

/// Live task `task_id` inside project `project_id`
async fn project_task<R>(repos: &R, project_id: i64, task_id: i64) -> ApiResult<Task>
where
    R: Repositories + Sync,
{
    let task = repos.tasks().get_by_id(task_id).await?;
    if task.project_id != project_id {
        return Err(ApiError::NotFound(format!("task {task_id} not found")));
    }
    Ok(task)
}

pub async fn list_project_tasks(
    db: Db,
    Extension(auth): Extension<AuthContext>,
    ApiPath(project_id): ApiPath<i64>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<ApiResponse<Page<Task>>> {
    page.validate()?;
    owned_project(&*db, &auth, project_id).await?;

    let (tasks, total) = db
        .tasks()
        .get_by_project_id(project_id, page.limit(), page.offset())
        .await?;

    Ok(ApiResponse::ok(Page::new(tasks, page, total)))
}

pub async fn list_tasks_by_status(
    db: Db,
    ApiQuery(filter): ApiQuery<StatusFilter>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<ApiResponse<Page<Task>>> {
    page.validate()?;

    let (tasks, total) = db
        .tasks()
        .get_by_status(filter.status, page.limit(), page.offset())
        .await?;

    Ok(ApiResponse::ok(Page::new(tasks, page, total)))
}

pub async fn create_task(
    db: Db,
    Extension(auth): Extension<AuthContext>,
    ClientMeta(meta): ClientMeta,
    ApiPath(project_id): ApiPath<i64>,
    ValidJson(req): ValidJson<CreateTaskRequest>,
) -> ApiResult<Created<Task>> {
    let task = db
        .transaction(|tx| async move {
            owned_project(&tx, &auth, project_id).await?;

            let task = tx.tasks().create(req.into_new_task(project_id)).await?;
            tx.audit()
                .log_action(&meta, AuditAction::Create, Entity::Task, task.id, &task)
                .await?;
            Ok::<_, ApiError>(task)
        })
        .await?;

    Ok(Created(ApiResponse::ok(task).with_message("Task created successfully")))
}

pub async fn get_task(
    db: Db,
    Extension(auth): Extension<AuthContext>,
    ApiPath((project_id, task_id)): ApiPath<(i64, i64)>,
) -> ApiResult<ApiResponse<Task>> {
    owned_project(&*db, &auth, project_id).await?;
    let task = project_task(&*db, project_id, task_id).await?;
    Ok(ApiResponse::ok(task))
}

pub async fn update_task(
    db: Db,
    Extension(auth): Extension<AuthContext>,
    ClientMeta(meta): ClientMeta,
    ApiPath((project_id, task_id)): ApiPath<(i64, i64)>,
    ValidJson(req): ValidJson<UpdateTaskRequest>,
) -> ApiResult<ApiResponse<Task>> {
    let task = db
        .transaction(|tx| async move {
            owned_project(&tx, &auth, project_id).await?;
            let mut task = project_task(&tx, project_id, task_id).await?;
            req.apply(&mut task);

            let updated = tx.tasks().update(&task).await?;
            tx.audit()
                .log_action(&meta, AuditAction::Update, Entity::Task, task_id, &updated)
                .await?;
            Ok::<_, ApiError>(updated)
        })
        .await?;

    Ok(ApiResponse::ok(task).with_message("Task updated successfully"))
}

pub async fn update_task_status(
    db: Db,
    Extension(auth): Extension<AuthContext>,
    ClientMeta(meta): ClientMeta,
    ApiPath((project_id, task_id)): ApiPath<(i64, i64)>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> ApiResult<ApiResponse<StatusChange>> {
    let status = req.status;

    db.transaction(|tx| async move {
        owned_project(&tx, &auth, project_id).await?;
        let task = project_task(&tx, project_id, task_id).await?;

        tx.tasks().update_status(task_id, status).await?;
        tx.audit()
            .log_action(
                &meta,
                AuditAction::UpdateStatus,
                Entity::Task,
                task_id,
                &json!({ "from": task.status, "to": status }),
            )
            .await?;
        Ok::<_, ApiError>(())
    })
    .await?;

    Ok(ApiResponse::ok(StatusChange {
        id: task_id,
        status,
    })
    .with_message("Task status updated successfully"))
}

pub async fn delete_task(
    db: Db,
    Extension(auth): Extension<AuthContext>,
    ClientMeta(meta): ClientMeta,
    ApiPath((project_id, task_id)): ApiPath<(i64, i64)>,
) -> ApiResult<ApiResponse<()>> {
    db.transaction(|tx| async move {
        owned_project(&tx, &auth, project_id).await?;
        let task = project_task(&tx, project_id, task_id).await?;

        tx.tasks().delete(task_id).await?;
        tx.audit()
            .log_action(&meta, AuditAction::Delete, Entity::Task, task_id, &task)
            .await?;
        Ok::<_, ApiError>(())
    })
    .await?;

    Ok(ApiResponse::message("Task moved to recycle bin"))
}

/// All-or-nothing import of up to 1000 tasks
pub async fn bulk_import(
    db: Db,
    Extension(auth): Extension<AuthContext>,
    ClientMeta(meta): ClientMeta,
    ApiPath(project_id): ApiPath<i64>,
    ApiJson(req): ApiJson<BulkImportRequest>,
) -> ApiResult<Created<ImportSummary>> {
    check_batch_size(req.tasks.len())?;
    owned_project(&*db, &auth, project_id).await?;

    let tasks = req
        .tasks
        .into_iter()
        .map(|task| task.into_new_task(project_id))
        .collect();

    let summary = import_tasks(&db, &meta, project_id, tasks).await?;

    Ok(Created(
        ApiResponse::ok(summary).with_message("Tasks imported successfully"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task {
            id: 4,
            project_id: 1,
            title: "Write docs".to_string(),
            description: "all of them".to_string(),
            status: TaskStatus::Todo,
            assignee_id: Some(3),
            due_date: None,
            custom_fields: JsonMap::new(),
            tags: vec!["docs".to_string()],
            metadata: JsonMap::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_partial_update_merges() {
        let mut target = task();
        let req: UpdateTaskRequest =
            serde_json::from_value(json!({ "status": "in_progress", "tags": [] })).unwrap();
        req.apply(&mut target);

        assert_eq!(target.status, TaskStatus::InProgress);
        assert!(target.tags.is_empty());
        assert_eq!(target.title, "Write docs");
        assert_eq!(target.assignee_id, Some(3));
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateTaskRequest = serde_json::from_value(json!({ "title": "Ship" })).unwrap();
        let new_task = req.into_new_task(9);

        assert_eq!(new_task.project_id, 9);
        assert_eq!(new_task.status, TaskStatus::Todo);
        assert!(new_task.custom_fields.is_empty());
    }

    #[test]
    fn test_unknown_status_rejected() {
        let parsed: Result<UpdateStatusRequest, _> =
            serde_json::from_value(json!({ "status": "archived" }));
        assert!(parsed.is_err());
    }
}
