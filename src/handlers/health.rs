use crate::{db, errors::ErrorResponse, ApiResponse, AppState};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: ComponentStatus,
    pub version: &'static str,
    pub environment: String,
    pub database: ComponentStatus,
    pub latency_ms: u128,
    pub timestamp: String,
}

/// Service banner
pub async fn banner() -> impl IntoResponse {
    Json(ApiResponse::with_message(
        serde_json::json!({
            "name": "Esnaf Defterim API",
            "version": env!("CARGO_PKG_VERSION"),
            "status": "active",
        }),
        "Esnaf Defterim API v1.0",
    ))
}

/// Database-backed readiness check; 503 while the database is unreachable
pub async fn health(State(state): State<AppState>) -> Response {
    let start = Instant::now();
    let database = match db::check_connection(&state.db).await {
        Ok(()) => ComponentStatus::Up,
        Err(_) => ComponentStatus::Down,
    };

    let report = HealthReport {
        status: database,
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        database,
        latency_ms: start.elapsed().as_millis(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    match database {
        ComponentStatus::Up => Json(ApiResponse::with_message(report, "Healthy")).into_response(),
        ComponentStatus::Down => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse {
                success: false,
                message: "Database unavailable".to_string(),
                data: Some(report),
                meta: None,
            }),
        )
            .into_response(),
    }
}

/// Envelope for unknown routes
pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("Endpoint not found")),
    )
        .into_response()
}
