use crate::{entities::supplier, errors::ServiceError};
use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{error, info, instrument};

#[derive(Debug, Clone, Default)]
pub struct NewSupplier {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub tax_number: Option<String>,
    pub notes: Option<String>,
}

/// `None` keeps the stored value; `Some(None)` clears it
#[derive(Debug, Clone, Default)]
pub struct SupplierChanges {
    pub name: Option<String>,
    pub phone: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub tax_number: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

#[derive(Clone)]
pub struct SupplierService {
    db: Arc<DatabaseConnection>,
}

impl SupplierService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Active suppliers ordered by name, optionally filtered by a name fragment
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: u64,
        limit: u64,
        search: Option<&str>,
    ) -> Result<(Vec<supplier::Model>, u64), ServiceError> {
        let mut query = supplier::Entity::find().filter(supplier::Column::Active.eq(true));
        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Expr::expr(Func::lower(Expr::col(supplier::Column::Name)))
                    .like(format!("%{}%", term.to_lowercase())),
            );
        }

        let paginator = query
            .order_by_asc(supplier::Column::Name)
            .order_by_asc(supplier::Column::Id)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Database error when counting suppliers");
            ServiceError::db_error(e)
        })?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((items, total))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<supplier::Model, ServiceError> {
        supplier::Entity::find_by_id(id)
            .filter(supplier::Column::Active.eq(true))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Supplier {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn create(&self, input: NewSupplier) -> Result<supplier::Model, ServiceError> {
        let now = Utc::now();
        let created = supplier::ActiveModel {
            name: Set(input.name),
            phone: Set(input.phone),
            email: Set(input.email),
            address: Set(input.address),
            tax_number: Set(input.tax_number),
            notes: Set(input.notes),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(supplier_id = created.id, "Supplier created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: i32,
        changes: SupplierChanges,
    ) -> Result<supplier::Model, ServiceError> {
        let mut model = self.get(id).await?.into_active_model();

        if let Some(name) = changes.name {
            model.name = Set(name);
        }
        if let Some(phone) = changes.phone {
            model.phone = Set(phone);
        }
        if let Some(email) = changes.email {
            model.email = Set(email);
        }
        if let Some(address) = changes.address {
            model.address = Set(address);
        }
        if let Some(tax_number) = changes.tax_number {
            model.tax_number = Set(tax_number);
        }
        if let Some(notes) = changes.notes {
            model.notes = Set(notes);
        }
        model.updated_at = Set(Utc::now());

        model
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let mut model = self.get(id).await?.into_active_model();
        model.active = Set(false);
        model.updated_at = Set(Utc::now());
        model
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        info!(supplier_id = id, "Supplier deactivated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::setup_db;
    use assert_matches::assert_matches;

    fn named(name: &str) -> NewSupplier {
        NewSupplier {
            name: name.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn list_searches_by_name_and_paginates() {
        let service = SupplierService::new(setup_db().await);
        service.create(named("Yılmaz Et")).await.unwrap();
        service.create(named("Anadolu Besicilik")).await.unwrap();
        service.create(named("Ege Et Kombinası")).await.unwrap();

        let (items, total) = service.list(1, 2, None).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Anadolu Besicilik");

        let (items, total) = service.list(1, 10, Some(" ET ")).await.unwrap();
        assert_eq!(total, 2);
        assert!(items.iter().all(|s| s.name.contains("Et")));
    }

    #[tokio::test]
    async fn update_merges_and_clears_fields() {
        let service = SupplierService::new(setup_db().await);
        let created = service
            .create(NewSupplier {
                name: "Kasap Toptan".into(),
                phone: Some("0212 555 00 00".into()),
                notes: Some("Salı teslimat".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let updated = service
            .update(
                created.id,
                SupplierChanges {
                    notes: Some(None),
                    tax_number: Some(Some("1234567890".into())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Kasap Toptan");
        assert_eq!(updated.phone.as_deref(), Some("0212 555 00 00"));
        assert_eq!(updated.notes, None);
        assert_eq!(updated.tax_number.as_deref(), Some("1234567890"));
    }

    #[tokio::test]
    async fn deleted_supplier_is_not_found() {
        let service = SupplierService::new(setup_db().await);
        let created = service.create(named("Geçici Tedarik")).await.unwrap();

        service.delete(created.id).await.unwrap();

        assert_matches!(service.get(created.id).await, Err(ServiceError::NotFound(_)));
        let (_, total) = service.list(1, 10, None).await.unwrap();
        assert_eq!(total, 0);
    }
}
