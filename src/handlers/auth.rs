use super::common::{created_response, non_blank, required, success_response, validate_input};
use crate::{
    auth::{require_admin, AuthUser},
    entities::user::Role,
    errors::ServiceError,
    services::users::NewUser,
    AppState,
};
use axum::{
    extract::{Json, State},
    response::Response,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Email is not valid"))]
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(max = 100, message = "Name is too long"))]
    pub name: Option<String>,
    #[validate(email(message = "Email is not valid"))]
    pub email: Option<String>,
    pub password: Option<String>,
    #[validate(length(max = 20, message = "Phone is too long"))]
    pub phone: Option<String>,
    pub role: Option<Role>,
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ServiceError> {
    let email = non_blank(payload.email.clone());
    let password = payload.password.clone().filter(|p| !p.is_empty());
    let (Some(email), Some(password)) = (email, password) else {
        return Err(ServiceError::ValidationError(
            "Email and password are required".to_string(),
        ));
    };
    validate_input(&payload)?;

    let outcome = state.services.users.login(&email, &password).await?;
    Ok(success_response("Login successful", outcome))
}

async fn me(State(state): State<AppState>, user: AuthUser) -> Result<Response, ServiceError> {
    let profile = state.services.users.profile(user.id).await?;
    Ok(success_response("Profile loaded", profile))
}

async fn verify_token(user: AuthUser) -> Result<Response, ServiceError> {
    Ok(success_response(
        "Token is valid",
        json!({ "valid": true, "user": user }),
    ))
}

async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Response, ServiceError> {
    let current = required(
        payload.current_password.filter(|p| !p.is_empty()),
        "Current and new password are required",
    )?;
    let new = required(
        payload.new_password.filter(|p| !p.is_empty()),
        "Current and new password are required",
    )?;

    state
        .services
        .users
        .change_password(user.id, &current, &new)
        .await?;
    Ok(success_response("Password changed", json!(null)))
}

async fn register(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, ServiceError> {
    require_admin(&user)?;
    validate_input(&payload)?;

    let message = "Name, email and password are required";
    let input = NewUser {
        name: required(non_blank(payload.name), message)?,
        email: required(non_blank(payload.email), message)?,
        password: required(payload.password.filter(|p| !p.is_empty()), message)?,
        phone: non_blank(payload.phone),
        role: payload.role.unwrap_or(Role::Regular),
    };

    let created = state.services.users.register(input).await?;
    Ok(created_response("User registered", created))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/profile", get(me))
        .route("/verify-token", post(verify_token))
        .route("/change-password", put(change_password))
        .route("/register", post(register))
}
