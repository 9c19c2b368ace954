/// JWT access and refresh tokens
///
/// Tokens are HS256-signed and carry the user id (`sub`), username and role so
/// the HTTP layer can authorize a request without a database round-trip.
///
/// | Claim        | Meaning                          |
/// |--------------|----------------------------------|
/// | `sub`        | user id                          |
/// | `username`   | login name at issue time         |
/// | `role`       | `admin` or `user`                |
/// | `token_type` | `access` or `refresh`            |
/// | `iss`        | always `tasktrail`               |
///
/// # Example
///
/// ```
/// use chrono::Duration;
/// use tasktrail_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
/// use tasktrail_shared::models::UserRole;
///
/// let secret = "an-example-secret-that-is-long-enough";
/// let claims = Claims::new(7, "alice", UserRole::User, TokenType::Access, Duration::hours(1));
/// let token = create_token(&claims, secret).unwrap();
///
/// let validated = validate_access_token(&token, secret).unwrap();
/// assert_eq!(validated.sub, 7);
/// assert_eq!(validated.username, "alice");
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::models::user::{User, UserRole};

pub const ISSUER: &str = "tasktrail";

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Expected {expected} token, got {actual} token")]
    WrongTokenType {
        expected: &'static str,
        actual: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user id
    pub sub: i64,

    pub username: String,

    pub role: UserRole,

    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    pub token_type: TokenType,
}

impl Claims {
    pub fn new(
        user_id: i64,
        username: impl Into<String>,
        role: UserRole,
        token_type: TokenType,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            username: username.into(),
            role,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            token_type,
        }
    }

    pub fn for_user(user: &User, token_type: TokenType, expires_in: Duration) -> Self {
        Self::new(user.id, &user.username, user.role, token_type, expires_in)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies signature, issuer, `exp` and `nbf`
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::ValidationError(e.to_string()),
    })?;

    Ok(token_data.claims)
}

fn expect_type(claims: Claims, expected: TokenType) -> Result<Claims, JwtError> {
    if claims.token_type != expected {
        return Err(JwtError::WrongTokenType {
            expected: expected.as_str(),
            actual: claims.token_type.as_str(),
        });
    }
    Ok(claims)
}

pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    expect_type(validate_token(token, secret)?, TokenType::Access)
}

pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    expect_type(validate_token(token, secret)?, TokenType::Refresh)
}

/// Issues a new access token for the holder of a valid refresh token
pub fn refresh_access_token(
    refresh_token: &str,
    secret: &str,
    expires_in: Duration,
) -> Result<String, JwtError> {
    let refresh_claims = validate_refresh_token(refresh_token, secret)?;

    let access_claims = Claims::new(
        refresh_claims.sub,
        refresh_claims.username,
        refresh_claims.role,
        TokenType::Access,
        expires_in,
    );

    create_token(&access_claims, secret)
}
