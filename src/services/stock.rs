use crate::{
    auth::AuthUser,
    entities::{
        category, stock_item, stock_movement, supplier,
        stock_movement::MovementKind,
        user,
    },
    errors::ServiceError,
    ledger::{self, MovementDraft},
};
use chrono::{NaiveDate, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Fields for a new stock item, already validated at the boundary
#[derive(Debug, Clone)]
pub struct NewStockItem {
    pub product_name: String,
    pub category_id: Option<i32>,
    pub total_weight: Decimal,
    pub remaining_weight: Decimal,
    pub supplier_id: Option<i32>,
    pub purchase_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub cut_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

/// Partial update. `None` keeps the stored value; `Some(None)` clears a
/// nullable column.
#[derive(Debug, Clone, Default)]
pub struct StockChanges {
    pub product_name: Option<String>,
    pub category_id: Option<Option<i32>>,
    pub total_weight: Option<Decimal>,
    pub remaining_weight: Option<Decimal>,
    pub supplier_id: Option<Option<i32>>,
    pub purchase_price: Option<Option<Decimal>>,
    pub sale_price: Option<Option<Decimal>>,
    pub cut_date: Option<Option<NaiveDate>>,
    pub expiry_date: Option<Option<NaiveDate>>,
    /// Version the client last read; rejected with a conflict when stale
    pub expected_version: Option<i32>,
}

/// Stock row annotated with the names of its category and supplier
#[derive(Debug, Clone, Serialize)]
pub struct StockItemView {
    #[serde(flatten)]
    pub item: stock_item::Model,
    pub category_name: Option<String>,
    pub supplier_name: Option<String>,
}

/// Movement row annotated with the acting user's name
#[derive(Debug, Clone, Serialize)]
pub struct MovementView {
    #[serde(flatten)]
    pub movement: stock_movement::Model,
    pub user_name: Option<String>,
}

/// Result of a create or update: the stored item and the ledger row the
/// write appended, if any
#[derive(Debug, Clone, Serialize)]
pub struct StockWrite {
    pub item: stock_item::Model,
    pub movement: Option<stock_movement::Model>,
}

/// Service for stock items and their movement ledger
#[derive(Clone)]
pub struct StockService {
    db: Arc<DatabaseConnection>,
}

impl StockService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lists active stock items, newest first
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: u64,
        limit: u64,
        search: Option<&str>,
    ) -> Result<(Vec<StockItemView>, u64), ServiceError> {
        let db = &*self.db;

        let mut query = stock_item::Entity::find().filter(stock_item::Column::Active.eq(true));
        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Expr::expr(Func::lower(Expr::col(stock_item::Column::ProductName)))
                    .like(format!("%{}%", term.to_lowercase())),
            );
        }

        let paginator = query
            .order_by_desc(stock_item::Column::CreatedAt)
            .order_by_desc(stock_item::Column::Id)
            .paginate(db, limit);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Database error when counting stock items");
            ServiceError::db_error(e)
        })?;

        let items = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(page, limit, error = %e, "Database error when fetching stock items");
            ServiceError::db_error(e)
        })?;

        Ok((annotate(db, items).await?, total))
    }

    /// Fetches one active stock item
    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<StockItemView, ServiceError> {
        let db = &*self.db;
        let item = find_active(db, id).await?;
        let mut views = annotate(db, vec![item]).await?;
        views
            .pop()
            .ok_or_else(|| ServiceError::InternalError("annotation dropped a row".into()))
    }

    /// Creates a stock item together with its initial incoming movement
    #[instrument(skip(self, actor), fields(user_id = actor.id))]
    pub async fn create(
        &self,
        input: NewStockItem,
        actor: &AuthUser,
    ) -> Result<StockWrite, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        ensure_references(&txn, input.category_id, input.supplier_id).await?;

        let now = Utc::now();
        let item = stock_item::ActiveModel {
            product_name: Set(input.product_name),
            category_id: Set(input.category_id),
            total_weight: Set(input.total_weight),
            remaining_weight: Set(input.remaining_weight),
            supplier_id: Set(input.supplier_id),
            purchase_price: Set(input.purchase_price),
            sale_price: Set(input.sale_price),
            profit_ratio: Set(ledger::profit_ratio(input.purchase_price, input.sale_price)),
            cut_date: Set(input.cut_date),
            expiry_date: Set(input.expiry_date),
            active: Set(true),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        let draft = ledger::plan_creation(item.total_weight);
        let movement = record_movement(&txn, item.id, actor.id, draft).await?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        count_movement(movement.kind);
        info!(stock_item_id = item.id, "Stock item created");

        Ok(StockWrite {
            item,
            movement: Some(movement),
        })
    }

    /// Applies `changes` to an active item and appends a movement when the
    /// remaining weight changed
    #[instrument(skip(self, actor), fields(user_id = actor.id))]
    pub async fn update(
        &self,
        id: i32,
        changes: StockChanges,
        actor: &AuthUser,
    ) -> Result<StockWrite, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let current = find_active(&txn, id).await?;
        if let Some(expected) = changes.expected_version {
            if expected != current.version {
                warn!(
                    stock_item_id = id,
                    expected,
                    actual = current.version,
                    "Stale stock update rejected"
                );
                return Err(ServiceError::ConcurrentModification(id));
            }
        }

        let category_id = changes.category_id.unwrap_or(current.category_id);
        let supplier_id = changes.supplier_id.unwrap_or(current.supplier_id);
        ensure_references(
            &txn,
            changes.category_id.flatten(),
            changes.supplier_id.flatten(),
        )
        .await?;

        let purchase_price = changes.purchase_price.unwrap_or(current.purchase_price);
        let sale_price = changes.sale_price.unwrap_or(current.sale_price);
        let remaining_weight = changes
            .remaining_weight
            .unwrap_or(current.remaining_weight);

        let patch = stock_item::ActiveModel {
            product_name: Set(changes
                .product_name
                .unwrap_or_else(|| current.product_name.clone())),
            category_id: Set(category_id),
            total_weight: Set(changes.total_weight.unwrap_or(current.total_weight)),
            remaining_weight: Set(remaining_weight),
            supplier_id: Set(supplier_id),
            purchase_price: Set(purchase_price),
            sale_price: Set(sale_price),
            profit_ratio: Set(ledger::profit_ratio(purchase_price, sale_price)),
            cut_date: Set(changes.cut_date.unwrap_or(current.cut_date)),
            expiry_date: Set(changes.expiry_date.unwrap_or(current.expiry_date)),
            version: Set(current.version + 1),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        let result = stock_item::Entity::update_many()
            .set(patch)
            .filter(stock_item::Column::Id.eq(id))
            .filter(stock_item::Column::Version.eq(current.version))
            .filter(stock_item::Column::Active.eq(true))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        if result.rows_affected == 0 {
            warn!(stock_item_id = id, "Stock item changed concurrently");
            return Err(ServiceError::ConcurrentModification(id));
        }

        let movement = match ledger::plan_update(current.remaining_weight, remaining_weight) {
            Some(draft) => Some(record_movement(&txn, id, actor.id, draft).await?),
            None => None,
        };

        let item = stock_item::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Stock item {} not found", id)))?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        if let Some(m) = &movement {
            count_movement(m.kind);
        }
        info!(
            stock_item_id = id,
            version = item.version,
            movement = movement.is_some(),
            "Stock item updated"
        );

        Ok(StockWrite { item, movement })
    }

    /// Soft-deletes an active item. Its movements stay queryable.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let result = stock_item::Entity::update_many()
            .col_expr(stock_item::Column::Active, Expr::value(false))
            .col_expr(
                stock_item::Column::Version,
                Expr::col(stock_item::Column::Version).add(1),
            )
            .col_expr(stock_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(stock_item::Column::Id.eq(id))
            .filter(stock_item::Column::Active.eq(true))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Stock item {} not found", id)));
        }

        info!(stock_item_id = id, "Stock item deactivated");
        Ok(())
    }

    /// Movement history of an item, newest first. Works for deactivated items.
    #[instrument(skip(self))]
    pub async fn movements(
        &self,
        stock_item_id: i32,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<MovementView>, u64), ServiceError> {
        let db = &*self.db;

        let exists = stock_item::Entity::find_by_id(stock_item_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .is_some();
        if !exists {
            return Err(ServiceError::NotFound(format!(
                "Stock item {} not found",
                stock_item_id
            )));
        }

        let paginator = stock_movement::Entity::find()
            .filter(stock_movement::Column::StockItemId.eq(stock_item_id))
            .find_also_related(user::Entity)
            .order_by_desc(stock_movement::Column::CreatedAt)
            .order_by_desc(stock_movement::Column::Id)
            .paginate(db, limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let rows = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        let views = rows
            .into_iter()
            .map(|(movement, user)| MovementView {
                movement,
                user_name: user.map(|u| u.name),
            })
            .collect();

        Ok((views, total))
    }
}

async fn find_active<C: ConnectionTrait>(conn: &C, id: i32) -> Result<stock_item::Model, ServiceError> {
    stock_item::Entity::find_by_id(id)
        .filter(stock_item::Column::Active.eq(true))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Stock item {} not found", id)))
}

async fn ensure_references<C: ConnectionTrait>(
    conn: &C,
    category_id: Option<i32>,
    supplier_id: Option<i32>,
) -> Result<(), ServiceError> {
    if let Some(id) = category_id {
        let found = category::Entity::find_by_id(id)
            .filter(category::Column::Active.eq(true))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?;
        if found.is_none() {
            return Err(ServiceError::ValidationError(format!(
                "Category {} does not exist",
                id
            )));
        }
    }

    if let Some(id) = supplier_id {
        let found = supplier::Entity::find_by_id(id)
            .filter(supplier::Column::Active.eq(true))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?;
        if found.is_none() {
            return Err(ServiceError::ValidationError(format!(
                "Supplier {} does not exist",
                id
            )));
        }
    }

    Ok(())
}

async fn record_movement<C: ConnectionTrait>(
    conn: &C,
    stock_item_id: i32,
    user_id: i32,
    draft: MovementDraft,
) -> Result<stock_movement::Model, ServiceError> {
    stock_movement::ActiveModel {
        stock_item_id: Set(stock_item_id),
        user_id: Set(user_id),
        kind: Set(draft.kind),
        quantity: Set(draft.quantity),
        previous_remaining: Set(draft.previous_remaining),
        new_remaining: Set(draft.new_remaining),
        note: Set(Some(draft.note.to_string())),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(ServiceError::db_error)
}

fn count_movement(kind: MovementKind) {
    counter!("esnaf_stock.movements_recorded", 1, "kind" => kind.to_string());
}

async fn annotate<C: ConnectionTrait>(
    conn: &C,
    items: Vec<stock_item::Model>,
) -> Result<Vec<StockItemView>, ServiceError> {
    let category_ids: HashSet<i32> = items.iter().filter_map(|i| i.category_id).collect();
    let supplier_ids: HashSet<i32> = items.iter().filter_map(|i| i.supplier_id).collect();

    let category_names: HashMap<i32, String> = if category_ids.is_empty() {
        HashMap::new()
    } else {
        category::Entity::find()
            .filter(category::Column::Id.is_in(category_ids))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect()
    };

    let supplier_names: HashMap<i32, String> = if supplier_ids.is_empty() {
        HashMap::new()
    } else {
        supplier::Entity::find()
            .filter(supplier::Column::Id.is_in(supplier_ids))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect()
    };

    Ok(items
        .into_iter()
        .map(|item| StockItemView {
            category_name: item.category_id.and_then(|id| category_names.get(&id).cloned()),
            supplier_name: item.supplier_id.and_then(|id| supplier_names.get(&id).cloned()),
            item,
        })
        .collect())
}
