/// Error handling for the API server
///
/// All handlers return `Result<T, ApiError>`, which converts to the failure
/// envelope with a matching HTTP status:
///
/// | Variant           | Status | Code                   |
/// |-------------------|--------|------------------------|
/// | `BadRequest`      | 400    | `BAD_REQUEST`          |
/// | `ValidationError` | 400    | `VALIDATION_ERROR`     |
/// | `Unauthorized`    | 401    | `AUTHENTICATION_ERROR` |
/// | `Forbidden`       | 403    | `AUTHORIZATION_ERROR`  |
/// | `NotFound`        | 404    | `NOT_FOUND`            |
/// | `Conflict`        | 409    | `CONFLICT`             |
/// | `InternalError`   | 500    | `INTERNAL_ERROR`       |
///
/// # Example
///
/// ```
/// use tasktrail_api::error::{ApiError, ApiResult};
/// use tasktrail_api::response::ApiResponse;
///
/// async fn handler(id: i64) -> ApiResult<ApiResponse<i64>> {
///     if id <= 0 {
///         return Err(ApiError::BadRequest("id must be positive".to_string()));
///     }
///     Ok(ApiResponse::ok(id))
/// }
/// ```

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;
use tasktrail_shared::auth::{jwt::JwtError, password::PasswordError};
use tasktrail_shared::error::{ErrorKind, RepoError};

pub use crate::response::ValidationErrorDetail;
use crate::response::{ApiResponse, ErrorBody};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request (400)
    BadRequest(String),

    /// Missing or invalid credentials (401)
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), e.g. duplicate username
    Conflict(String),

    /// Field-level validation failures (400)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),
}

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "AUTHENTICATION_ERROR",
            ApiError::Forbidden(_) => "AUTHORIZATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_string();

        let (message, details) = match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => (msg, None),
            ApiError::ValidationError(errors) => ("Validation failed".to_string(), Some(errors)),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                ("An internal error occurred".to_string(), None)
            }
        };

        let body = ApiResponse::failure(ErrorBody {
            code,
            message,
            details,
        });

        (status, Json(body)).into_response()
    }
}

/// Convert repository errors to API errors by their kind
impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err.kind() {
            ErrorKind::NotFound | ErrorKind::NotFoundInRecycleBin => {
                ApiError::NotFound(err.to_string())
            }
            ErrorKind::Conflict => ApiError::Conflict(err.to_string()),
            ErrorKind::Validation => match err {
                RepoError::Validation { field, message } => ApiError::validation(field, message),
                other => ApiError::BadRequest(other.to_string()),
            },
            ErrorKind::Connectivity => ApiError::InternalError(err.to_string()),
        }
    }
}

/// Convert `validator` failures to field details
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(details)
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasktrail_shared::error::{Entity, ExecError, Operation};

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("project 3 not found".to_string());
        assert_eq!(err.to_string(), "Not found: project 3 not found");
    }

    #[test]
    fn test_status_and_code() {
        let err = ApiError::validation("name", "required");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "VALIDATION_ERROR");

        assert_eq!(
            ApiError::Unauthorized(String::new()).code(),
            "AUTHENTICATION_ERROR"
        );
        assert_eq!(ApiError::Forbidden(String::new()).status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_repo_error_mapping() {
        let err: ApiError = RepoError::not_found(Entity::Project, 3).into();
        assert!(matches!(err, ApiError::NotFound(ref msg) if msg == "project 3 not found"));

        let err: ApiError = RepoError::NotFoundInRecycleBin {
            entity: Entity::Task,
            id: 9,
        }
        .into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: ApiError = RepoError::Conflict {
            entity: Entity::User,
            message: "duplicate".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ApiError = RepoError::validation("title", "too long").into();
        match err {
            ApiError::ValidationError(details) => {
                assert_eq!(details[0].field, "title");
                assert_eq!(details[0].message, "too long");
            }
            other => panic!("unexpected {other:?}"),
        }

        let err: ApiError =
            RepoError::storage(Entity::Task, Operation::List)(ExecError::DeadlineExceeded).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_jwt_error_mapping() {
        assert_eq!(ApiError::from(JwtError::Expired).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(JwtError::ValidationError("bad".into())).code(),
            "AUTHENTICATION_ERROR"
        );
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response = ApiError::InternalError("connection refused on 10.0.0.5".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("INTERNAL_ERROR"));
        assert!(!text.contains("10.0.0.5"));
    }
}
