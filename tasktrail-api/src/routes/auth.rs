/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/v1/auth/register` - Register new user
/// - `POST /api/v1/auth/login` - Login and get tokens
/// - `POST /api/v1/auth/refresh` - Refresh access token
/// - `POST /api/v1/auth/logout` - Record a logout (requires authentication)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ClientMeta, Db, ValidJson},
    middleware::auth::AuthContext,
    response::{ApiResponse, Created},
};
use axum::{extract::State, Extension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tasktrail_shared::{
    auth::{
        jwt::{self, Claims, TokenType},
        password,
    },
    error::{Entity, ErrorKind},
    models::{AuditAction, CreateUser, RequestMeta, User, UserRole},
    repository::Repositories,
};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3 to 50 characters"))]
    pub username: String,

    #[validate(length(min = 6, max = 128, message = "Password must be 6 to 128 characters"))]
    pub password: String,
}

impl RegisterRequest {
    /// Trims the username so the length limits apply to the stored value
    fn normalized(mut self) -> Self {
        self.username = self.username.trim().to_string();
        self
    }
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Refresh token request
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Tokens issued on register and login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,

    pub refresh_token: String,

    /// Always `Bearer`
    pub token_type: &'static str,

    /// Access token lifetime in seconds
    pub expires_in: i64,

    pub user: User,
}

/// Refresh token response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,

    pub token_type: &'static str,

    pub expires_in: i64,
}

fn issue_tokens(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let jwt_config = &state.config.jwt;

    let access_claims = Claims::for_user(&user, TokenType::Access, jwt_config.access_ttl);
    let refresh_claims = Claims::for_user(&user, TokenType::Refresh, jwt_config.refresh_ttl);

    Ok(AuthResponse {
        access_token: jwt::create_token(&access_claims, state.jwt_secret())?,
        refresh_token: jwt::create_token(&refresh_claims, state.jwt_secret())?,
        token_type: "Bearer",
        expires_in: jwt_config.access_ttl.num_seconds(),
        user,
    })
}

/// Register a new user
///
/// The first account ever registered becomes an administrator.
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed
/// - `409 Conflict`: Username already taken
pub async fn register(
    State(state): State<AppState>,
    db: Db,
    ClientMeta(meta): ClientMeta,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<Created<AuthResponse>> {
    let req = req.normalized();
    req.validate()?;

    let password_hash = password::hash_password(&req.password)?;
    let username = req.username;

    let user = db
        .transaction(|tx| async move {
            let role = if tx.users().count().await? == 0 {
                UserRole::Admin
            } else {
                UserRole::User
            };

            let user = tx
                .users()
                .create(CreateUser {
                    username,
                    password_hash,
                    role,
                })
                .await?;

            let meta = RequestMeta {
                actor_id: Some(user.id),
                ..meta
            };
            tx.audit()
                .log_action(&meta, AuditAction::Register, Entity::User, user.id, &user)
                .await?;

            Ok::<_, ApiError>(user)
        })
        .await?;

    tracing::info!(user_id = user.id, role = %user.role, "User registered");

    let body = issue_tokens(&state, user)?;
    Ok(Created(
        ApiResponse::ok(body).with_message("User registered successfully"),
    ))
}

/// Login and get tokens
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown username or wrong password
pub async fn login(
    State(state): State<AppState>,
    db: Db,
    ValidJson(req): ValidJson<LoginRequest>,
) -> ApiResult<ApiResponse<AuthResponse>> {
    let invalid = || ApiError::Unauthorized("Invalid username or password".to_string());

    let user = match db.users().get_by_username(req.username.trim()).await {
        Ok(user) => user,
        Err(err) if err.kind() == ErrorKind::NotFound => return Err(invalid()),
        Err(err) => return Err(err.into()),
    };

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::warn!(user_id = user.id, "Login failed: wrong password");
        return Err(invalid());
    }

    tracing::info!(user_id = user.id, "User logged in");
    Ok(ApiResponse::ok(issue_tokens(&state, user)?).with_message("Login successful"))
}

/// Exchange a refresh token for a new access token
pub async fn refresh(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RefreshRequest>,
) -> ApiResult<ApiResponse<RefreshResponse>> {
    let access_ttl = state.config.jwt.access_ttl;
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret(), access_ttl)?;

    Ok(ApiResponse::ok(RefreshResponse {
        access_token,
        token_type: "Bearer",
        expires_in: access_ttl.num_seconds(),
    }))
}

/// Log out
///
/// Tokens are stateless and stay valid until they expire; the client drops
/// them. The logout is recorded in the audit log.
pub async fn logout(
    db: Db,
    Extension(auth): Extension<AuthContext>,
    ClientMeta(meta): ClientMeta,
) -> ApiResult<ApiResponse<()>> {
    db.audit()
        .log_action(
            &meta,
            AuditAction::Logout,
            Entity::User,
            auth.user_id,
            &json!({ "username": auth.username }),
        )
        .await?;

    tracing::info!(user_id = auth.user_id, "User logged out");
    Ok(ApiResponse::message("Logout successful"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: "secret123".to_string(),
        }
    }

    #[test]
    fn test_username_length_checked_after_trim() {
        let req = register("  ab  ").normalized();
        assert_eq!(req.username, "ab");
        assert!(req.validate().is_err());

        let req = register("\talice ").normalized();
        assert_eq!(req.username, "alice");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_untrimmed_username_kept_as_is() {
        let req = register("bob_smith").normalized();
        assert_eq!(req.username, "bob_smith");
    }
}
