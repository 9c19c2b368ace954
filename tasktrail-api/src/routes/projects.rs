/// Project endpoints
///
/// Non-admins only ever see projects they own; anything else answers 404 so
/// project ids of other users are not disclosed.
///
/// # Endpoints
///
/// - `GET /api/v1/projects?page&page_size`
/// - `POST /api/v1/projects`
/// - `GET /api/v1/projects/:id`
/// - `PUT /api/v1/projects/:id` (fields left out stay unchanged)
/// - `DELETE /api/v1/projects/:id` (to the recycle bin, with its tasks)

use crate::{
    error::{ApiError, ApiResult},
    extract::{ApiPath, ApiQuery, ClientMeta, Db, ValidJson},
    middleware::auth::AuthContext,
    response::{ApiResponse, Created},
};
use axum::Extension;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tasktrail_shared::{
    error::Entity,
    models::{AuditAction, CreateProject, Page, PageRequest, Project, ProjectDeletion},
    repository::Repositories,
};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,

    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: Option<String>,

    pub description: Option<String>,
}

impl UpdateProjectRequest {
    fn apply(self, project: &mut Project) {
        if let Some(name) = self.name {
            project.name = name;
        }
        if let Some(description) = self.description {
            project.description = description;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteProjectResponse {
    pub id: i64,

    #[serde(flatten)]
    pub deletion: ProjectDeletion,
}

/// Live project visible to `auth`
pub(crate) async fn owned_project<R>(repos: &R, auth: &AuthContext, id: i64) -> ApiResult<Project>
where
    R: Repositories + Sync,
{
    let project = repos.projects().get_by_id(id).await?;

    if !auth.is_admin() && project.owner_id != auth.user_id {
        tracing::debug!(project_id = id, user_id = auth.user_id, "Project hidden from non-owner");
        return Err(ApiError::NotFound(format!("project {id} not found")));
    }
    Ok(project)
}

pub async fn list_projects(
    db: Db,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<ApiResponse<Page<Project>>> {
    page.validate()?;

    let (projects, total) = if auth.is_admin() {
        db.projects().list(page.limit(), page.offset()).await?
    } else {
        db.projects()
            .get_by_owner(auth.user_id, page.limit(), page.offset())
            .await?
    };

    Ok(ApiResponse::ok(Page::new(projects, page, total)))
}

pub async fn create_project(
    db: Db,
    Extension(auth): Extension<AuthContext>,
    ClientMeta(meta): ClientMeta,
    ValidJson(req): ValidJson<CreateProjectRequest>,
) -> ApiResult<Created<Project>> {
    let project = db
        .transaction(|tx| async move {
            let project = tx
                .projects()
                .create(CreateProject {
                    name: req.name,
                    description: req.description,
                    owner_id: auth.user_id,
                })
                .await?;

            tx.audit()
                .log_action(&meta, AuditAction::Create, Entity::Project, project.id, &project)
                .await?;
            Ok::<_, ApiError>(project)
        })
        .await?;

    Ok(Created(
        ApiResponse::ok(project).with_message("Project created successfully"),
    ))
}

pub async fn get_project(
    db: Db,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ApiResponse<Project>> {
    let project = owned_project(&*db, &auth, id).await?;
    Ok(ApiResponse::ok(project))
}

pub async fn update_project(
    db: Db,
    Extension(auth): Extension<AuthContext>,
    ClientMeta(meta): ClientMeta,
    ApiPath(id): ApiPath<i64>,
    ValidJson(req): ValidJson<UpdateProjectRequest>,
) -> ApiResult<ApiResponse<Project>> {
    let project = db
        .transaction(|tx| async move {
            let mut project = owned_project(&tx, &auth, id).await?;
            req.apply(&mut project);

            let updated = tx.projects().update(&project).await?;
            tx.audit()
                .log_action(&meta, AuditAction::Update, Entity::Project, id, &updated)
                .await?;
            Ok::<_, ApiError>(updated)
        })
        .await?;

    Ok(ApiResponse::ok(project).with_message("Project updated successfully"))
}

pub async fn delete_project(
    db: Db,
    Extension(auth): Extension<AuthContext>,
    ClientMeta(meta): ClientMeta,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ApiResponse<DeleteProjectResponse>> {
    let deletion = db
        .transaction(|tx| async move {
            let project = owned_project(&tx, &auth, id).await?;
            let deletion = tx.projects().delete(id).await?;

            tx.audit()
                .log_action(
                    &meta,
                    AuditAction::Delete,
                    Entity::Project,
                    id,
                    &json!({ "project": project, "cascaded_tasks": deletion.cascaded_tasks }),
                )
                .await?;
            Ok::<_, ApiError>(deletion)
        })
        .await?;

    Ok(ApiResponse::ok(DeleteProjectResponse { id, deletion })
        .with_message("Project moved to recycle bin"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn project() -> Project {
        Project {
            id: 1,
            name: "Alpha".to_string(),
            description: "first".to_string(),
            owner_id: 2,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_partial_update_keeps_missing_fields() {
        let mut target = project();
        UpdateProjectRequest {
            name: None,
            description: Some("second".to_string()),
        }
        .apply(&mut target);

        assert_eq!(target.name, "Alpha");
        assert_eq!(target.description, "second");
    }

    #[test]
    fn test_update_request_validation() {
        let req = UpdateProjectRequest {
            name: Some(String::new()),
            description: None,
        };
        assert!(req.validate().is_err());

        let req = UpdateProjectRequest {
            name: None,
            description: None,
        };
        assert!(req.validate().is_ok());
    }
}
