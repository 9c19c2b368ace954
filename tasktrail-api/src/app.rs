/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use tasktrail_api::{app::{build_router, AppState}, config::Config};
/// use tasktrail_shared::db::{pool::create_pool, Database};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(config.database.clone()).await?;
/// let app = build_router(AppState::new(Database::new(pool), config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::auth};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tasktrail_shared::db::Database;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET /health
/// ├── GET /version
/// └── /api/v1/
///     ├── /auth/                       register, login, refresh (public)
///     │   └── POST /logout             authenticated
///     ├── /projects/                   authenticated
///     │   ├── GET, POST /
///     │   ├── GET, PUT, DELETE /:id
///     │   ├── GET, POST /:id/tasks
///     │   ├── POST /:id/tasks/bulk-import
///     │   ├── GET, PUT, DELETE /:id/tasks/:task_id
///     │   └── PATCH /:id/tasks/:task_id/status
///     ├── GET /tasks?status=           admin
///     ├── /users/                      admin
///     └── /system/                     admin
///         ├── /recycle/projects        GET, POST /:id/restore, DELETE /:id
///         ├── /recycle/tasks           GET, POST /:id/restore, DELETE /:id
///         └── /audit/logs              GET
/// ```
///
/// Middleware, outermost first: CORS, request tracing, then JWT
/// authentication and the admin gate on the routes that need them.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let public_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/version", get(routes::health::version));

    let session_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::jwt_auth_layer,
        ));

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .merge(session_routes);

    let member_routes = Router::new()
        .route(
            "/projects",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/projects/:id",
            get(routes::projects::get_project)
                .put(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route(
            "/projects/:id/tasks",
            get(routes::tasks::list_project_tasks).post(routes::tasks::create_task),
        )
        .route("/projects/:id/tasks/bulk-import", post(routes::tasks::bulk_import))
        .route(
            "/projects/:id/tasks/:task_id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route(
            "/projects/:id/tasks/:task_id/status",
            patch(routes::tasks::update_task_status),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::jwt_auth_layer,
        ));

    let admin_routes = Router::new()
        .route("/tasks", get(routes::tasks::list_tasks_by_status))
        .route("/users", get(routes::users::list_users))
        .route(
            "/users/:id",
            get(routes::users::get_user).delete(routes::users::delete_user),
        )
        .route("/users/:id/role", put(routes::users::update_user_role))
        .route(
            "/system/recycle/projects",
            get(routes::recycle_bin::list_recycled_projects),
        )
        .route(
            "/system/recycle/projects/:id",
            axum::routing::delete(routes::recycle_bin::hard_delete_project),
        )
        .route(
            "/system/recycle/projects/:id/restore",
            post(routes::recycle_bin::restore_project),
        )
        .route(
            "/system/recycle/tasks",
            get(routes::recycle_bin::list_recycled_tasks),
        )
        .route(
            "/system/recycle/tasks/:id",
            axum::routing::delete(routes::recycle_bin::hard_delete_task),
        )
        .route(
            "/system/recycle/tasks/:id/restore",
            post(routes::recycle_bin::restore_task),
        )
        .route("/system/audit/logs", get(routes::audit::list_audit_logs))
        .layer(axum::middleware::from_fn(auth::require_admin))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::jwt_auth_layer,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(member_routes)
        .merge(admin_routes);

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config.app.cors_origins))
        .with_state(state)
}

/// Permissive when `*` is listed; otherwise only the listed origins
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
