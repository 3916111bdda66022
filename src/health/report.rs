//! Liveness report.

use axum::{extract::State, Json};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::http::server::AppState;
use crate::observability::{MemoryUsage, ProcessInfo};

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    /// RFC 3339, UTC.
    pub timestamp: String,
    /// Seconds since start.
    pub uptime: f64,
    pub memory: MemoryUsage,
    pub environment: String,
}

impl HealthReport {
    pub fn collect(process: &ProcessInfo, environment: &str) -> Self {
        Self {
            status: "healthy",
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            uptime: process.uptime().as_secs_f64(),
            memory: process.memory(),
            environment: environment.to_string(),
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport::collect(
        &state.process,
        &state.config.server.environment,
    ))
}
