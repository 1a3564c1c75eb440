//! Esnaf Defterim
//!
//! Stock and bookkeeping backend for a small butcher shop: stock items with
//! an append-only movement ledger, catalog data and token-based auth.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod ledger;
pub mod middleware_helpers;
pub mod migrator;
pub mod rate_limiter;
pub mod services;
pub mod tracing;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    http::HeaderValue,
    routing::get,
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
};

use crate::auth::{AuthConfig, AuthService, PasswordHasher};
use crate::config::AppConfig;
use crate::errors::ServiceError;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: AppConfig,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires the services over a shared connection pool
    pub fn new(db: Arc<DatabaseConnection>, config: AppConfig) -> Result<Self, ServiceError> {
        let hasher = PasswordHasher::new(
            config.password_hash_memory_kib,
            config.password_hash_iterations,
        )?;
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config), db.clone()));
        let services = handlers::AppServices::new(db.clone(), auth.clone(), hasher);

        Ok(Self {
            db,
            config,
            auth,
            services,
        })
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::with_message(data, "OK")
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Routes mounted under `/api`
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", handlers::auth::auth_routes())
        .nest("/stoklar", handlers::stock::stock_routes())
        .nest("/kategoriler", handlers::categories::category_routes())
        .nest("/tedarikciler", handlers::suppliers::supplier_routes())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.cors_allow_any_origin {
        ::tracing::info!("Using permissive CORS");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                ::tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// The complete application: banner, health, `/api` and the middleware stack
pub fn app_router(state: AppState) -> Router {
    let config = &state.config;

    let router = Router::new()
        .route("/", get(handlers::health::banner))
        .route("/health", get(handlers::health::health))
        .nest("/api", api_routes())
        .fallback(handlers::health::not_found)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(CompressionLayer::new())
        .layer(cors_layer(config))
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(
            middleware_helpers::security_headers_middleware,
        ));

    let router = if config.rate_limit_enabled {
        router.layer(rate_limiter::RateLimitLayer::new(
            rate_limiter::RateLimitConfig::from(config),
        ))
    } else {
        ::tracing::warn!("Rate limiting disabled");
        router
    };

    // Outermost so every log line and error body carries the id
    router
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        assert!(response.success);
        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        chrono::DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn envelope_serializes_message_and_data() {
        let value = serde_json::to_value(ApiResponse::with_message(7, "Stock item loaded")).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["message"], "Stock item loaded");
        assert_eq!(value["data"], 7);
    }
}
