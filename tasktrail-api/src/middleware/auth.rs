/// JWT authentication middleware
///
/// [`jwt_auth_layer`] validates the `Authorization: Bearer <token>` header and
/// stores an [`AuthContext`] in the request extensions. Handlers read it with
/// Axum's `Extension` extractor:
///
/// ```no_run
/// use axum::Extension;
/// use tasktrail_api::middleware::auth::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("hello {}", auth.username)
/// }
/// ```
///
/// The role is taken from the token, so a role change applies once the user's
/// current access token expires.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tasktrail_shared::auth::jwt::{self, Claims};
use tasktrail_shared::models::UserRole;

use crate::{app::AppState, error::ApiError};

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: i64,
    pub username: String,
    pub role: UserRole,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username,
            role: claims.role,
        }
    }
}

fn bearer_token(req: &Request) -> Result<&str, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Expected Bearer token".to_string()))
}

/// Rejects requests without a valid access token
pub async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = jwt::validate_access_token(bearer_token(&req)?, state.jwt_secret())?;

    tracing::debug!(user_id = claims.sub, role = %claims.role, "Request authenticated");
    req.extensions_mut().insert(AuthContext::from(claims));

    Ok(next.run(req).await)
}

/// Rejects authenticated non-admins with 403
///
/// Must run inside [`jwt_auth_layer`].
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let auth = req
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    if !auth.is_admin() {
        tracing::warn!(user_id = auth.user_id, path = %req.uri().path(), "Admin route denied");
        return Err(ApiError::Forbidden("Administrator role required".to_string()));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_bearer_token_parsing() {
        let req = Request::builder()
            .header("authorization", "Bearer abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&req).unwrap(), "abc.def.ghi");

        let req = Request::builder()
            .header("authorization", "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        assert!(matches!(bearer_token(&req), Err(ApiError::Unauthorized(_))));

        let req = Request::builder().body(Body::empty()).unwrap();
        assert!(bearer_token(&req).is_err());
    }

    #[test]
    fn test_auth_context_from_claims() {
        let claims = Claims::new(
            5,
            "erin",
            UserRole::Admin,
            jwt::TokenType::Access,
            chrono::Duration::hours(1),
        );
        let auth = AuthContext::from(claims);

        assert_eq!(auth.user_id, 5);
        assert_eq!(auth.username, "erin");
        assert!(auth.is_admin());
    }
}
