/// Health and version endpoints
///
/// # Endpoints
///
/// - `GET /health`: database ping plus pool statistics; 503 when the ping fails
/// - `GET /version`: build metadata

use crate::{app::AppState, config::BuildInfo, extract::Db, response::ApiResponse};
use axum::{extract::State, http::StatusCode};
use serde::Serialize;
use tasktrail_shared::db::pool::{get_pool_stats, PoolStats};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`
    pub status: &'static str,

    /// `connected` or `disconnected`
    pub database: &'static str,

    pub version: String,

    pub pool: PoolStats,
}

pub async fn health_check(
    State(state): State<AppState>,
    db: Db,
) -> (StatusCode, ApiResponse<HealthResponse>) {
    let ping = db.ping().await;
    let pool = get_pool_stats(db.pool());

    let (status, database, code) = match &ping {
        Ok(()) => ("healthy", "connected", StatusCode::OK),
        Err(err) => {
            tracing::warn!(error = %err, "Health check failed to reach database");
            ("unhealthy", "disconnected", StatusCode::SERVICE_UNAVAILABLE)
        }
    };

    let mut body = ApiResponse::ok(HealthResponse {
        status,
        database,
        version: state.config.build.version.clone(),
        pool,
    })
    .with_message(format!("Service is {status}"));
    body.success = ping.is_ok();

    (code, body)
}

pub async fn version(State(state): State<AppState>) -> ApiResponse<BuildInfo> {
    ApiResponse::ok(state.config.build.clone())
}
