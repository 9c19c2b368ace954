/// Audit log browsing (admin only)
///
/// `GET /api/v1/system/audit/logs?page&page_size`, newest first.

use crate::{
    error::ApiResult,
    extract::{ApiQuery, Db},
    response::ApiResponse,
};
use tasktrail_shared::{
    models::{AuditLog, Page, PageRequest},
    repository::Repositories,
};
use validator::Validate;

pub async fn list_audit_logs(
    db: Db,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<ApiResponse<Page<AuditLog>>> {
    page.validate()?;

    let (logs, total) = db.audit().list(page.limit(), page.offset()).await?;

    Ok(ApiResponse::ok(Page::new(logs, page, total)))
}
