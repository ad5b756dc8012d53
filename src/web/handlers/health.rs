//! Health check HTTP handlers

use axum::{extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::web::{AppState, responses::ok};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: i64,
    /// Accounts with a remembered URL dialect
    pub dialect_cache_entries: usize,
    /// Whether the current plugin settings validate
    pub settings_valid: bool,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let settings_valid = state.timeshift.load_config().await.is_ok();
    let uptime = chrono::Utc::now() - state.start_time;

    ok(HealthResponse {
        status: if settings_valid { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds(),
        dialect_cache_entries: state.timeshift.dialect_cache().len().await,
        settings_valid,
    })
}
