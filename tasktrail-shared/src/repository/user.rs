//! User repository
//!
//! Users are hard-deleted. Deleting a user that still owns projects (live or
//! recycled) fails with `Conflict`.

use sqlx::postgres::PgRow;
use sqlx::FromRow;
use tracing::info;

use super::table::{Filter, Record, Table};
use crate::db::context::ExecutionContext;
use crate::error::{Entity, Operation, RepoError};
use crate::models::user::{check_username, CreateUser, User, UserRow};

const USER_COLUMNS: &str = "id, username, password_hash, role, created_at, updated_at";

impl Record for User {
    const ENTITY: Entity = Entity::User;
    const TABLE: &'static str = "users";
    const COLUMNS: &'static str = USER_COLUMNS;

    fn decode(row: &PgRow) -> Result<Self, RepoError> {
        UserRow::from_row(row)
            .map_err(RepoError::decode(Entity::User))?
            .try_into()
    }
}

#[derive(Clone)]
pub struct UserRepository<C> {
    table: Table<C, User>,
}

impl<C: ExecutionContext> UserRepository<C> {
    pub fn new(ctx: C) -> Self {
        Self {
            table: Table::new(ctx),
        }
    }

    /// Inserts a user; a taken username is a `Conflict`
    pub async fn create(&self, new_user: CreateUser) -> Result<User, RepoError> {
        new_user.check()?;

        let sql = format!(
            "INSERT INTO users (username, password_hash, role) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        let query = sqlx::query(&sql)
            .bind(new_user.username)
            .bind(new_user.password_hash)
            .bind(new_user.role.as_str());

        let user = self.table.fetch_returning(Operation::Create, query).await?;
        info!(user_id = user.id, username = %user.username, "User created");
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<User, RepoError> {
        self.table.get(id).await
    }

    pub async fn get_by_username(&self, username: &str) -> Result<User, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");

        self.table
            .fetch_optional(Operation::Get, sqlx::query(&sql).bind(username))
            .await?
            .ok_or_else(|| RepoError::NotFound {
                entity: Entity::User,
                key: format!("'{username}'"),
            })
    }

    /// Replaces username, password hash and role
    pub async fn update(&self, user: &User) -> Result<User, RepoError> {
        check_username(&user.username)?;

        let sql = format!(
            "UPDATE users SET username = $2, password_hash = $3, role = $4, updated_at = NOW()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        let query = sqlx::query(&sql)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.role.as_str());

        self.table
            .fetch_optional(Operation::Update, query)
            .await?
            .ok_or_else(|| RepoError::not_found(Entity::User, user.id))
    }

    /// Hard delete
    pub async fn delete(&self, id: i64) -> Result<(), RepoError> {
        self.table.delete_row(id).await?;
        info!(user_id = id, "User deleted");
        Ok(())
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), RepoError> {
        self.table.list(&Filter::All, limit, offset).await
    }

    pub async fn count(&self) -> Result<i64, RepoError> {
        self.table.count(&Filter::All).await
    }
}
