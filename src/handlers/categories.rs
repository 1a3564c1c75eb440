use super::common::{created_response, double_option, non_blank, required, success_response, validate_input};
use crate::{
    auth::{require_admin, require_clerk_or_admin, AuthUser},
    errors::ServiceError,
    services::categories::{CategoryChanges, NewCategory},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::Response,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(max = 100, message = "Category name is too long"))]
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCategoryRequest {
    #[validate(length(max = 100, message = "Category name is too long"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

async fn list_categories(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Response, ServiceError> {
    let categories = state.services.categories.list().await?;
    Ok(success_response("Categories loaded", categories))
}

async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<Response, ServiceError> {
    require_clerk_or_admin(&user)?;
    validate_input(&payload)?;

    let input = NewCategory {
        name: required(non_blank(payload.name), "Category name is required")?,
        description: non_blank(payload.description),
    };
    let created = state.services.categories.create(input).await?;
    Ok(created_response("Category created", created))
}

async fn update_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> Result<Response, ServiceError> {
    require_clerk_or_admin(&user)?;
    validate_input(&payload)?;

    let name = match payload.name {
        Some(name) => Some(required(non_blank(Some(name)), "Category name must not be blank")?),
        None => None,
    };
    let changes = CategoryChanges {
        name,
        description: payload.description.map(non_blank),
    };
    let updated = state.services.categories.update(id, changes).await?;
    Ok(success_response("Category updated", updated))
}

async fn delete_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    require_admin(&user)?;
    state.services.categories.delete(id).await?;
    Ok(success_response("Category deleted", json!({ "id": id })))
}

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:id", put(update_category).delete(delete_category))
}
