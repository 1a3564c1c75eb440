pub mod auth;
pub mod categories;
pub mod common;
pub mod health;
pub mod stock;
pub mod suppliers;

use crate::{
    auth::{AuthService, PasswordHasher},
    db::DbPool,
    services::{CategoryService, StockService, SupplierService, UserService},
};
use std::sync::Arc;

pub use crate::AppState;

/// Services layer shared by the HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub stock: Arc<StockService>,
    pub categories: Arc<CategoryService>,
    pub suppliers: Arc<SupplierService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, auth: Arc<AuthService>, hasher: PasswordHasher) -> Self {
        Self {
            stock: Arc::new(StockService::new(db_pool.clone())),
            categories: Arc::new(CategoryService::new(db_pool.clone())),
            suppliers: Arc::new(SupplierService::new(db_pool.clone())),
            users: Arc::new(UserService::new(db_pool, auth, hasher)),
        }
    }
}
