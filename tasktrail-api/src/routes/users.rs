/// User administration (admin only)
///
/// # Endpoints
///
/// - `GET /api/v1/users?page&page_size`
/// - `GET /api/v1/users/:id`
/// - `PUT /api/v1/users/:id/role`
/// - `DELETE /api/v1/users/:id`

use crate::{
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery, ClientMeta, Db},
    middleware::auth::AuthContext,
    response::ApiResponse,
};
use axum::Extension;
use serde::Deserialize;
use serde_json::json;
use tasktrail_shared::{
    error::Entity,
    models::{AuditAction, Page, PageRequest, User, UserRole},
    repository::Repositories,
};
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: UserRole,
}

pub async fn list_users(
    db: Db,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<ApiResponse<Page<User>>> {
    page.validate()?;

    let (users, total) = db.users().list(page.limit(), page.offset()).await?;

    Ok(ApiResponse::ok(Page::new(users, page, total)))
}

pub async fn get_user(db: Db, ApiPath(id): ApiPath<i64>) -> ApiResult<ApiResponse<User>> {
    let user = db.users().get_by_id(id).await?;
    Ok(ApiResponse::ok(user))
}

/// Takes effect at the user's next login or token refresh
pub async fn update_user_role(
    db: Db,
    ClientMeta(meta): ClientMeta,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateRoleRequest>,
) -> ApiResult<ApiResponse<User>> {
    let user = db
        .transaction(|tx| async move {
            let mut user = tx.users().get_by_id(id).await?;
            let previous = user.role;
            user.role = req.role;

            let updated = tx.users().update(&user).await?;
            tx.audit()
                .log_action(
                    &meta,
                    AuditAction::RoleChange,
                    Entity::User,
                    id,
                    &json!({
                        "username": updated.username,
                        "from": previous,
                        "to": updated.role,
                    }),
                )
                .await?;
            Ok::<_, ApiError>(updated)
        })
        .await?;

    Ok(ApiResponse::ok(user).with_message("User role updated successfully"))
}

/// Fails with 409 while the user still owns projects, live or recycled
pub async fn delete_user(
    db: Db,
    Extension(auth): Extension<AuthContext>,
    ClientMeta(meta): ClientMeta,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ApiResponse<()>> {
    if id == auth.user_id {
        return Err(ApiError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    db.transaction(|tx| async move {
        let user = tx.users().get_by_id(id).await?;

        tx.users().delete(id).await?;
        tx.audit()
            .log_action(&meta, AuditAction::Delete, Entity::User, id, &user)
            .await?;
        Ok::<_, ApiError>(())
    })
    .await?;

    Ok(ApiResponse::message("User deleted successfully"))
}
