use super::common::{
    check_amount, created_response, double_option, non_blank, required, success_response,
    validate_input, Paginated, PaginationParams,
};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::stock::{NewStockItem, StockChanges},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::Response,
    routing::get,
    Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

const WEIGHT_SCALE: u32 = 3;
const PRICE_SCALE: u32 = 2;
const MAX_WEIGHT: Decimal = dec!(1000000);
const MAX_PRICE: Decimal = dec!(100000000);

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStockRequest {
    #[validate(length(max = 255, message = "Product name is too long"))]
    pub product_name: Option<String>,
    pub category_id: Option<i32>,
    pub total_weight: Option<Decimal>,
    pub remaining_weight: Option<Decimal>,
    pub supplier_id: Option<i32>,
    pub purchase_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub cut_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

impl CreateStockRequest {
    fn into_input(self) -> Result<NewStockItem, ServiceError> {
        validate_input(&self)?;

        let message = "Product name, total weight and remaining weight are required";
        let product_name = required(non_blank(self.product_name), message)?;
        let total_weight = required(self.total_weight, message)?;
        let remaining_weight = required(self.remaining_weight, message)?;

        if total_weight.is_zero() {
            return Err(ServiceError::ValidationError(
                "Total weight must be greater than zero".to_string(),
            ));
        }
        check_weight("Total weight", total_weight)?;
        check_weight("Remaining weight", remaining_weight)?;
        check_price("Purchase price", self.purchase_price)?;
        check_price("Sale price", self.sale_price)?;

        Ok(NewStockItem {
            product_name,
            category_id: self.category_id,
            total_weight,
            remaining_weight,
            supplier_id: self.supplier_id,
            purchase_price: self.purchase_price,
            sale_price: self.sale_price,
            cut_date: self.cut_date,
            expiry_date: self.expiry_date,
        })
    }
}

/// Partial update; `null` clears the nullable fields
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateStockRequest {
    #[validate(length(min = 1, max = 255, message = "Product name must be 1-255 characters"))]
    pub product_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<i32>>,
    pub total_weight: Option<Decimal>,
    pub remaining_weight: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    pub supplier_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub purchase_price: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub sale_price: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub cut_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub expiry_date: Option<Option<NaiveDate>>,
    pub version: Option<i32>,
}

impl UpdateStockRequest {
    fn into_changes(self) -> Result<StockChanges, ServiceError> {
        validate_input(&self)?;

        let product_name = match self.product_name {
            Some(name) => Some(required(
                non_blank(Some(name)),
                "Product name must not be blank",
            )?),
            None => None,
        };
        if let Some(total) = self.total_weight {
            check_weight("Total weight", total)?;
        }
        if let Some(remaining) = self.remaining_weight {
            check_weight("Remaining weight", remaining)?;
        }
        check_price("Purchase price", self.purchase_price.flatten())?;
        check_price("Sale price", self.sale_price.flatten())?;

        Ok(StockChanges {
            product_name,
            category_id: self.category_id,
            total_weight: self.total_weight,
            remaining_weight: self.remaining_weight,
            supplier_id: self.supplier_id,
            purchase_price: self.purchase_price,
            sale_price: self.sale_price,
            cut_date: self.cut_date,
            expiry_date: self.expiry_date,
            expected_version: self.version,
        })
    }
}

fn check_weight(field: &str, value: Decimal) -> Result<(), ServiceError> {
    check_amount(field, value, WEIGHT_SCALE, MAX_WEIGHT)
}

fn check_price(field: &str, value: Option<Decimal>) -> Result<(), ServiceError> {
    match value {
        Some(v) => check_amount(field, v, PRICE_SCALE, MAX_PRICE),
        None => Ok(()),
    }
}

async fn list_stock(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    let (page, limit) = params.resolve(&state.config);
    let (items, total) = state
        .services
        .stock
        .list(page, limit, params.search())
        .await?;

    Ok(success_response(
        "Stock items loaded",
        Paginated::new(items, page, limit, total),
    ))
}

async fn get_stock(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    let item = state.services.stock.get(id).await?;
    Ok(success_response("Stock item loaded", item))
}

async fn create_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateStockRequest>,
) -> Result<Response, ServiceError> {
    let input = payload.into_input()?;
    let write = state.services.stock.create(input, &user).await?;
    Ok(created_response("Stock item created", write))
}

async fn update_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateStockRequest>,
) -> Result<Response, ServiceError> {
    let changes = payload.into_changes()?;
    let write = state.services.stock.update(id, changes, &user).await?;
    Ok(success_response("Stock item updated", write))
}

async fn delete_stock(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    state.services.stock.delete(id).await?;
    Ok(success_response("Stock item deleted", json!({ "id": id })))
}

async fn list_movements(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i32>,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    let (page, limit) = params.resolve(&state.config);
    let (items, total) = state.services.stock.movements(id, page, limit).await?;

    Ok(success_response(
        "Stock movements loaded",
        Paginated::new(items, page, limit, total),
    ))
}

pub fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_stock).post(create_stock))
        .route("/:id", get(get_stock).put(update_stock).delete(delete_stock))
        .route("/:id/hareketler", get(list_movements))
}
