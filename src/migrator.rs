#![allow(elided_lifetimes_in_paths)]

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240101_000002_create_catalog_tables::Migration),
            Box::new(m20240101_000003_create_stock_tables::Migration),
        ]
    }
}

mod m20240101_000001_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Users::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(
                            ColumnDef::new(Users::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::Phone).string().null())
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(
                            ColumnDef::new(Users::Role)
                                .string_len(16)
                                .not_null()
                                .default("regular"),
                        )
                        .col(
                            ColumnDef::new(Users::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::LastLogin)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Users {
        Table,
        Id,
        Name,
        Email,
        Phone,
        PasswordHash,
        Role,
        Active,
        LastLogin,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_catalog_tables {
    use sea_orm::ConnectionTrait;
    use sea_orm_migration::prelude::*;

    /// Categories every fresh shop starts with
    const DEFAULT_CATEGORIES: [(&str, &str); 6] = [
        ("Dana", "Dana eti ürünleri"),
        ("Tavuk", "Tavuk eti ürünleri"),
        ("Kuzu", "Kuzu eti ürünleri"),
        ("Kıyma", "Kıyma çeşitleri"),
        ("Şarküteri", "Sucuk, pastırma ve şarküteri ürünleri"),
        ("Diğer", "Diğer ürünler"),
    ];

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Categories::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Categories::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Categories::Description).text().null())
                        .col(
                            ColumnDef::new(Categories::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Categories::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Suppliers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Suppliers::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Suppliers::Name).string().not_null())
                        .col(ColumnDef::new(Suppliers::Phone).string().null())
                        .col(ColumnDef::new(Suppliers::Email).string().null())
                        .col(ColumnDef::new(Suppliers::Address).text().null())
                        .col(ColumnDef::new(Suppliers::TaxNumber).string().null())
                        .col(ColumnDef::new(Suppliers::Notes).text().null())
                        .col(
                            ColumnDef::new(Suppliers::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Suppliers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Suppliers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            let now = chrono::Utc::now();
            let mut insert = Query::insert();
            insert.into_table(Categories::Table).columns([
                Categories::Name,
                Categories::Description,
                Categories::Active,
                Categories::CreatedAt,
            ]);
            for (name, description) in DEFAULT_CATEGORIES {
                insert
                    .values([name.into(), description.into(), true.into(), now.into()])
                    .map_err(|e| DbErr::Custom(e.to_string()))?;
            }

            let db = manager.get_connection();
            db.execute(db.get_database_backend().build(&insert)).await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Suppliers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Categories {
        Table,
        Id,
        Name,
        Description,
        Active,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Suppliers {
        Table,
        Id,
        Name,
        Phone,
        Email,
        Address,
        TaxNumber,
        Notes,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_stock_tables {
    use super::m20240101_000001_create_users_table::Users;
    use super::m20240101_000002_create_catalog_tables::{Categories, Suppliers};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_stock_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockItems::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(StockItems::ProductName).string().not_null())
                        .col(ColumnDef::new(StockItems::CategoryId).integer().null())
                        .col(ColumnDef::new(StockItems::TotalWeight).decimal().not_null())
                        .col(
                            ColumnDef::new(StockItems::RemainingWeight)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockItems::SupplierId).integer().null())
                        .col(ColumnDef::new(StockItems::PurchasePrice).decimal().null())
                        .col(ColumnDef::new(StockItems::SalePrice).decimal().null())
                        .col(
                            ColumnDef::new(StockItems::ProfitRatio)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(StockItems::CutDate).date().null())
                        .col(ColumnDef::new(StockItems::ExpiryDate).date().null())
                        .col(
                            ColumnDef::new(StockItems::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(StockItems::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(StockItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_items_category_id")
                                .from(StockItems::Table, StockItems::CategoryId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_items_supplier_id")
                                .from(StockItems::Table, StockItems::SupplierId)
                                .to(Suppliers::Table, Suppliers::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_items_active_created_at")
                        .table(StockItems::Table)
                        .col(StockItems::Active)
                        .col(StockItems::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::StockItemId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::UserId).integer().not_null())
                        .col(
                            ColumnDef::new(StockMovements::Kind)
                                .string_len(8)
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::Quantity).decimal().not_null())
                        .col(
                            ColumnDef::new(StockMovements::PreviousRemaining)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::NewRemaining)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::Note).text().null())
                        .col(
                            ColumnDef::new(StockMovements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_movements_stock_item_id")
                                .from(StockMovements::Table, StockMovements::StockItemId)
                                .to(StockItems::Table, StockItems::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_movements_user_id")
                                .from(StockMovements::Table, StockMovements::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_stock_item_id")
                        .table(StockMovements::Table)
                        .col(StockMovements::StockItemId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockItems {
        Table,
        Id,
        ProductName,
        CategoryId,
        TotalWeight,
        RemainingWeight,
        SupplierId,
        PurchasePrice,
        SalePrice,
        ProfitRatio,
        CutDate,
        ExpiryDate,
        Active,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum StockMovements {
        Table,
        Id,
        StockItemId,
        UserId,
        Kind,
        Quantity,
        PreviousRemaining,
        NewRemaining,
        Note,
        CreatedAt,
    }
}
