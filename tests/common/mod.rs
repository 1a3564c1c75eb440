#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use esnaf_defterim::{
    app_router,
    config::AppConfig,
    db,
    entities::user::{self, Role},
    services::users::NewUser,
    AppState,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

pub const SECRET: &str =
    "kasap-dukkani-test-secret-9f8e7d6c5b4a-ZYXWVUTSRQ-mnopqrstuvwxyz-0987654321-QWERTY";

pub const ADMIN_PASSWORD: &str = "admin123";
pub const CLERK_PASSWORD: &str = "kalfa123";
pub const REGULAR_PASSWORD: &str = "cirak123";

/// Full application over a fresh in-memory SQLite database with one
/// account per role.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub admin: user::Model,
    pub clerk: user::Model,
    pub regular: user::Model,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Like [`TestApp::new`] with `adjust` applied to the configuration
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:".into(), SECRET.into(), "test".into());
        cfg.password_hash_memory_kib = 8;
        cfg.password_hash_iterations = 1;
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg).expect("failed to build state");

        let admin = seed_user(&state, "Dükkan Sahibi", "admin@kasap.com", ADMIN_PASSWORD, Role::Admin).await;
        let clerk = seed_user(&state, "Mehmet Kalfa", "kalfa@kasap.com", CLERK_PASSWORD, Role::Clerk).await;
        let regular = seed_user(&state, "Ali Çırak", "cirak@kasap.com", REGULAR_PASSWORD, Role::Regular).await;

        Self {
            router: app_router(state.clone()),
            state,
            admin,
            clerk,
            regular,
        }
    }

    pub fn token_for(&self, user: &user::Model) -> String {
        self.state
            .auth
            .generate_token(user)
            .expect("failed to issue test token")
            .token
    }

    pub fn admin_token(&self) -> String {
        self.token_for(&self.admin)
    }

    pub fn clerk_token(&self) -> String {
        self.token_for(&self.clerk)
    }

    pub fn regular_token(&self) -> String {
        self.token_for(&self.regular)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        self.request_with_headers(method, uri, body, token, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends a request and decodes the JSON body
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body, token).await;
        let status = response.status();
        (status, json_body(response).await)
    }
}

async fn seed_user(state: &AppState, name: &str, email: &str, password: &str, role: Role) -> user::Model {
    state
        .services
        .users
        .register(NewUser {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            phone: None,
            role,
        })
        .await
        .expect("failed to seed user")
}

pub async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is not JSON")
    }
}

/// Decimals travel as strings; numbers are accepted too
pub fn dec_of(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("not a decimal string"),
        Value::Number(n) => n.to_string().parse().expect("not a decimal number"),
        other => panic!("expected a decimal, got {}", other),
    }
}
