//! Health check routes
//!
//! Provides endpoints for health monitoring and readiness checks.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}

/// Database health check response
#[derive(Serialize)]
pub struct DbHealthResponse {
    pub status: String,
    pub database: String,
    pub timestamp: String,
}

/// Basic health check handler
/// Returns {"status": "ok", "timestamp": "...", "version": "0.1.0"}
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Database health check handler
/// Checks database connectivity
async fn health_check_db(
    State(state): State<AppState>,
) -> Result<Json<DbHealthResponse>, (StatusCode, Json<DbHealthResponse>)> {
    let timestamp = Utc::now().to_rfc3339();

    match sqlx::query("SELECT 1").execute(state.db()).await {
        Ok(_) => Ok(Json(DbHealthResponse {
            status: "ok".to_string(),
            database: "connected".to_string(),
            timestamp,
        })),
        Err(_) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(DbHealthResponse {
                status: "error".to_string(),
                database: "disconnected".to_string(),
                timestamp,
            }),
        )),
    }
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/db", get(health_check_db))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_response() {
        let response = health_check().await;
        assert_eq!(response.status, "ok");
        assert!(!response.timestamp.is_empty());
        assert!(!response.version.is_empty());
    }
}
