//! Shared helpers for database-backed integration tests
//!
//! Tests run against the database named by `DATABASE_URL` and are skipped when
//! it is unset. Every helper creates uniquely named rows, so tests can run in
//! parallel against one database without interfering.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};

use tasktrail_shared::db::migrations::run_migrations;
use tasktrail_shared::db::pool::{create_pool, DatabaseConfig, Dsn};
use tasktrail_shared::db::Database;
use tasktrail_shared::models::{CreateProject, CreateUser, Project, User, UserRole};
use tasktrail_shared::repository::Repositories;

static COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty())
}

/// Connects and migrates, or returns `None` when no test database is configured
pub async fn test_db() -> Option<Database> {
    let Some(url) = database_url() else {
        eprintln!("DATABASE_URL not set; skipping database test");
        return None;
    };

    let config = DatabaseConfig {
        dsn: Dsn::Url(url),
        max_open_connections: 5,
        max_idle_connections: 1,
        acquire_timeout_seconds: 10,
        ..Default::default()
    };

    let pool = create_pool(config).await.expect("Failed to create pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    Some(Database::new(pool))
}

/// Unique name with the given prefix, at most 40 characters
pub fn unique(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{}_{nanos}_{n}", std::process::id())
}

pub async fn create_user(db: &Database) -> User {
    db.users()
        .create(CreateUser {
            username: unique("user"),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            role: UserRole::User,
        })
        .await
        .expect("Failed to create user")
}

pub async fn create_project(db: &Database, owner: &User, name: &str) -> Project {
    db.projects()
        .create(CreateProject {
            name: name.to_string(),
            description: "x".to_string(),
            owner_id: owner.id,
        })
        .await
        .expect("Failed to create project")
}
