pub mod category;
pub mod stock_item;
pub mod stock_movement;
pub mod supplier;
pub mod user;

pub use category::Entity as Category;
pub use stock_item::Entity as StockItem;
pub use stock_movement::Entity as StockMovement;
pub use supplier::Entity as Supplier;
pub use user::Entity as User;
