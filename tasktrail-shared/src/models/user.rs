/// User model
///
/// Users are created at registration, updated on profile or role changes and
/// hard-deleted only (there is no recycle bin for users).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     username VARCHAR(50) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     role VARCHAR(20) NOT NULL DEFAULT 'user' CHECK (role IN ('admin', 'user')),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RepoError;

pub const USERNAME_MAX_LEN: usize = 50;

/// Role granted to a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl FromStr for UserRole {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            other => Err(RepoError::validation(
                "role",
                format!("unknown role '{other}'"),
            )),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user account
///
/// The password hash never leaves the process: it is skipped on serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique login name, 1 to 50 characters
    pub username: String,

    /// Argon2id password hash
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub role: UserRole,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepoError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            role: row.role.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Input for creating a new user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    pub role: UserRole,
}

impl CreateUser {
    pub(crate) fn check(&self) -> Result<(), RepoError> {
        check_username(&self.username)?;
        if self.password_hash.is_empty() {
            return Err(RepoError::validation("password_hash", "must not be empty"));
        }
        Ok(())
    }
}

pub(crate) fn check_username(username: &str) -> Result<(), RepoError> {
    let len = username.chars().count();
    if len == 0 || len > USERNAME_MAX_LEN {
        return Err(RepoError::validation(
            "username",
            format!("must be 1 to {USERNAME_MAX_LEN} characters"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("user".parse::<UserRole>().unwrap(), UserRole::User);
        assert!("root".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let user = User {
            id: 1,
            username: "alice".into(),
            password_hash: "$argon2id$secret".into(),
            role: UserRole::Admin,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "admin");
    }

    #[test]
    fn test_create_user_checks() {
        let mut new_user = CreateUser {
            username: "bob".into(),
            password_hash: "hash".into(),
            role: UserRole::User,
        };
        assert!(new_user.check().is_ok());

        new_user.username = "x".repeat(51);
        assert!(new_user.check().is_err());

        new_user.username = String::new();
        assert!(new_user.check().is_err());
    }
}
