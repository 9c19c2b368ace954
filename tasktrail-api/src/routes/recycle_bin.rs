/// Recycle bin administration (admin only)
///
/// Restoring a project also restores the tasks that were recycled with it;
/// tasks deleted on their own before the project stay in the bin. Hard
/// deletes are permanent.
///
/// # Endpoints
///
/// - `GET /api/v1/system/recycle/projects?page&page_size`
/// - `POST /api/v1/system/recycle/projects/:id/restore`
/// - `DELETE /api/v1/system/recycle/projects/:id`
/// - `GET /api/v1/system/recycle/tasks?page&page_size`
/// - `POST /api/v1/system/recycle/tasks/:id/restore`
/// - `DELETE /api/v1/system/recycle/tasks/:id`

use crate::{
    error::{ApiError, ApiResult},
    extract::{ApiPath, ApiQuery, ClientMeta, Db},
    response::ApiResponse,
};
use serde::Serialize;
use tasktrail_shared::{
    error::Entity,
    models::{AuditAction, Page, PageRequest, ProjectRestore, RecycledProject, RecycledTask},
    repository::Repositories,
};
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct RestoreProjectResponse {
    pub id: i64,

    #[serde(flatten)]
    pub restore: ProjectRestore,
}

pub async fn list_recycled_projects(
    db: Db,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<ApiResponse<Page<RecycledProject>>> {
    page.validate()?;

    let (projects, total) = db
        .recycle_bin()
        .list_recycled_projects(page.limit(), page.offset())
        .await?;

    Ok(ApiResponse::ok(Page::new(projects, page, total)))
}

pub async fn list_recycled_tasks(
    db: Db,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<ApiResponse<Page<RecycledTask>>> {
    page.validate()?;

    let (tasks, total) = db
        .recycle_bin()
        .list_recycled_tasks(page.limit(), page.offset())
        .await?;

    Ok(ApiResponse::ok(Page::new(tasks, page, total)))
}

pub async fn restore_project(
    db: Db,
    ClientMeta(meta): ClientMeta,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ApiResponse<RestoreProjectResponse>> {
    let restore = db
        .transaction(|tx| async move {
            let recycled = tx.recycle_bin().get_recycled_project(id).await?;
            let restore = tx.recycle_bin().restore_project(id).await?;

            tx.audit()
                .log_action(&meta, AuditAction::Restore, Entity::Project, id, &recycled)
                .await?;
            Ok::<_, ApiError>(restore)
        })
        .await?;

    Ok(ApiResponse::ok(RestoreProjectResponse { id, restore })
        .with_message("Project restored successfully"))
}

/// Removes the project and every task under it
///
/// `409 Conflict` while one of its tasks was restored on its own and is live.
pub async fn hard_delete_project(
    db: Db,
    ClientMeta(meta): ClientMeta,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ApiResponse<()>> {
    db.transaction(|tx| async move {
        let recycled = tx.recycle_bin().get_recycled_project(id).await?;
        tx.recycle_bin().hard_delete_project(id).await?;

        tx.audit()
            .log_action(&meta, AuditAction::HardDelete, Entity::Project, id, &recycled)
            .await?;
        Ok::<_, ApiError>(())
    })
    .await?;

    Ok(ApiResponse::message("Project permanently deleted"))
}

pub async fn restore_task(
    db: Db,
    ClientMeta(meta): ClientMeta,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ApiResponse<()>> {
    db.transaction(|tx| async move {
        let recycled = tx.recycle_bin().get_recycled_task(id).await?;
        tx.recycle_bin().restore_task(id).await?;

        tx.audit()
            .log_action(&meta, AuditAction::Restore, Entity::Task, id, &recycled)
            .await?;
        Ok::<_, ApiError>(())
    })
    .await?;

    Ok(ApiResponse::message("Task restored successfully"))
}

pub async fn hard_delete_task(
    db: Db,
    ClientMeta(meta): ClientMeta,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ApiResponse<()>> {
    db.transaction(|tx| async move {
        let recycled = tx.recycle_bin().get_recycled_task(id).await?;
        tx.recycle_bin().hard_delete_task(id).await?;

        tx.audit()
            .log_action(&meta, AuditAction::HardDelete, Entity::Task, id, &recycled)
            .await?;
        Ok::<_, ApiError>(())
    })
    .await?;

    Ok(ApiResponse::message("Task permanently deleted"))
}
