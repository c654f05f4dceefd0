pub mod dlq;
pub mod orders;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub db: String,
    pub db_pool: DbPoolStats,
}

#[derive(Serialize)]
pub struct DbPoolStats {
    pub active_connections: u32,
    pub idle_connections: u32,
    pub max_connections: u32,
    pub usage_percent: f32,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    // Check database connectivity with SELECT 1 query
    let db_status = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    let pool = &state.db;
    let active_connections = pool.size();
    let idle_connections = pool.num_idle() as u32;
    let max_connections = pool.options().get_max_connections();
    let usage_percent = (active_connections as f32 / max_connections as f32) * 100.0;

    let health_response = HealthStatus {
        status: if db_status == "connected" {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        db: db_status.to_string(),
        db_pool: DbPoolStats {
            active_connections,
            idle_connections,
            max_connections,
            usage_percent,
        },
    };

    let status_code = if db_status == "connected" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_response))
}
