pub mod categories;
pub mod stock;
pub mod suppliers;
pub mod users;

pub use categories::CategoryService;
pub use stock::StockService;
pub use suppliers::SupplierService;
pub use users::UserService;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{
        auth::AuthUser,
        db,
        entities::user::{self, Role},
    };
    use chrono::Utc;
    use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
    use std::sync::Arc;

    pub async fn setup_db() -> Arc<DatabaseConnection> {
        let pool = db::establish_connection("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        Arc::new(pool)
    }

    /// Inserts an active user named `Test <email>` with an unusable hash
    pub async fn insert_user(db: &DatabaseConnection, email: &str, role: Role) -> user::Model {
        let now = Utc::now();
        user::ActiveModel {
            name: Set(format!("Test {}", email)),
            email: Set(email.to_string()),
            phone: Set(None),
            password_hash: Set("!".to_string()),
            role: Set(role),
            active: Set(true),
            last_login: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    pub fn actor(user: &user::Model) -> AuthUser {
        AuthUser::from(user)
    }
}
