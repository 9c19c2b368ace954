//! # TaskTrail API Server
//!
//! Serves the projects, tasks, recycle bin and audit log endpoints over a
//! PostgreSQL database.
//!
//! ## Usage
//!
//! ```bash
//! JWT_SECRET=$(openssl rand -hex 32) DATABASE_URL=postgres://localhost/tasktrail \
//!     cargo run -p tasktrail-api
//! ```
//!
//! Set `LOG_FORMAT=json` for structured log lines and `RUST_LOG` to override
//! the default filter.

use std::net::SocketAddr;

use anyhow::Context;
use tasktrail_api::{
    app::{build_router, AppState},
    config::Config,
};
use tasktrail_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool},
    Database,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env()?;

    tracing::info!(
        version = %config.build.version,
        environment = %config.app.environment,
        "TaskTrail API Server starting..."
    );

    let pool = create_pool(config.database.clone())
        .await
        .context("failed to connect to the database")?;

    run_migrations(&pool)
        .await
        .context("failed to run database migrations")?;

    let bind_address = config.bind_address();
    let app = build_router(AppState::new(Database::new(pool.clone()), config));

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;

    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tasktrail_api=debug,tasktrail_shared=info,tower_http=debug,sqlx=warn".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
