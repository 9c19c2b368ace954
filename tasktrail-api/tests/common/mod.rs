//! Common test utilities for API integration tests
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`. Tests
//! need a PostgreSQL database named by `DATABASE_URL` and are skipped when it
//! is unset.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use serde_json::Value;
use tasktrail_api::app::{build_router, AppState};
use tasktrail_api::config::Config;
use tasktrail_shared::auth::jwt::{create_token, Claims, TokenType};
use tasktrail_shared::auth::password::hash_password;
use tasktrail_shared::db::migrations::run_migrations;
use tasktrail_shared::db::pool::create_pool;
use tasktrail_shared::db::Database;
use tasktrail_shared::models::{CreateUser, User, UserRole};
use tasktrail_shared::repository::Repositories;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const PASSWORD: &str = "correct horse battery";

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Test context holding the router and a direct storage handle
pub struct TestContext {
    pub app: Router,
    pub db: Database,
    pub config: Config,
}

/// A stored user with a valid access token
pub struct Account {
    pub user: User,
    pub token: String,
}

impl TestContext {
    /// Connects and migrates, or returns `None` when no test database is configured
    pub async fn new() -> Option<Self> {
        let Some(url) = std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()) else {
            eprintln!("DATABASE_URL not set; skipping API test");
            return None;
        };

        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some(url.clone()),
            "JWT_SECRET" => Some(JWT_SECRET.to_string()),
            "DB_MAX_OPEN_CONNS" => Some("5".to_string()),
            "DB_MAX_IDLE_CONNS" => Some("1".to_string()),
            _ => None,
        })
        .expect("Failed to build test config");

        let pool = create_pool(config.database.clone())
            .await
            .expect("Failed to create pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let db = Database::new(pool);
        let app = build_router(AppState::new(db.clone(), config.clone()));

        Some(Self { app, db, config })
    }

    /// Stores a user with `role` directly and signs an access token for it
    pub async fn account(&self, role: UserRole) -> Account {
        let user = self
            .db
            .users()
            .create(CreateUser {
                username: unique("user"),
                password_hash: hash_password(PASSWORD).expect("Failed to hash password"),
                role,
            })
            .await
            .expect("Failed to create user");

        let claims = Claims::for_user(&user, TokenType::Access, Duration::hours(1));
        let token = create_token(&claims, JWT_SECRET).expect("Failed to sign token");

        Account { user, token }
    }

    /// Sends one request and returns the status with the decoded JSON body
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.send_with_headers(method, uri, token, body, &[]).await
    }

    /// Like [`send`](Self::send), with extra request headers
    pub async fn send_with_headers(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Router is infallible");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                panic!("Expected JSON, got {}", String::from_utf8_lossy(&bytes))
            })
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(token), None).await
    }

    /// Creates a project through the API and returns its id
    pub async fn create_project(&self, account: &Account, name: &str) -> i64 {
        let (status, body) = self
            .post(
                "/api/v1/projects",
                &account.token,
                serde_json::json!({ "name": name, "description": "integration" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_i64().expect("project id")
    }
}

/// Unique name safe to use across parallel tests
pub fn unique(prefix: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    format!("{prefix}_{}_{nanos}_{n}", std::process::id())
}
