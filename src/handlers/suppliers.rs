use super::common::{
    created_response, double_option, non_blank, required, success_response, validate_input,
    Paginated, PaginationParams,
};
use crate::{
    auth::{require_admin, require_clerk_or_admin, AuthUser},
    errors::ServiceError,
    services::suppliers::{NewSupplier, SupplierChanges},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSupplierRequest {
    #[validate(length(max = 255, message = "Supplier name is too long"))]
    pub name: Option<String>,
    #[validate(length(max = 20, message = "Phone is too long"))]
    pub phone: Option<String>,
    #[validate(email(message = "Email is not valid"))]
    pub email: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 20, message = "Tax number is too long"))]
    pub tax_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSupplierRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub tax_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl UpdateSupplierRequest {
    fn into_changes(self) -> Result<SupplierChanges, ServiceError> {
        let name = match self.name {
            Some(name) => Some(required(non_blank(Some(name)), "Supplier name must not be blank")?),
            None => None,
        };
        let email = self.email.map(non_blank);
        if let Some(Some(address)) = &email {
            if !validator::validate_email(address.as_str()) {
                return Err(ServiceError::ValidationError("Email is not valid".to_string()));
            }
        }

        Ok(SupplierChanges {
            name,
            phone: self.phone.map(non_blank),
            email,
            address: self.address.map(non_blank),
            tax_number: self.tax_number.map(non_blank),
            notes: self.notes.map(non_blank),
        })
    }
}

async fn list_suppliers(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    let (page, limit) = params.resolve(&state.config);
    let (items, total) = state
        .services
        .suppliers
        .list(page, limit, params.search())
        .await?;

    Ok(success_response(
        "Suppliers loaded",
        Paginated::new(items, page, limit, total),
    ))
}

async fn get_supplier(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    let supplier = state.services.suppliers.get(id).await?;
    Ok(success_response("Supplier loaded", supplier))
}

async fn create_supplier(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateSupplierRequest>,
) -> Result<Response, ServiceError> {
    require_clerk_or_admin(&user)?;
    validate_input(&payload)?;

    let input = NewSupplier {
        name: required(non_blank(payload.name), "Supplier name is required")?,
        phone: non_blank(payload.phone),
        email: non_blank(payload.email),
        address: non_blank(payload.address),
        tax_number: non_blank(payload.tax_number),
        notes: non_blank(payload.notes),
    };
    let created = state.services.suppliers.create(input).await?;
    Ok(created_response("Supplier created", created))
}

async fn update_supplier(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateSupplierRequest>,
) -> Result<Response, ServiceError> {
    require_clerk_or_admin(&user)?;
    let changes = payload.into_changes()?;
    let updated = state.services.suppliers.update(id, changes).await?;
    Ok(success_response("Supplier updated", updated))
}

async fn delete_supplier(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    require_admin(&user)?;
    state.services.suppliers.delete(id).await?;
    Ok(success_response("Supplier deleted", json!({ "id": id })))
}

pub fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_suppliers).post(create_supplier))
        .route(
            "/:id",
            get(get_supplier).put(update_supplier).delete(delete_supplier),
        )
}
