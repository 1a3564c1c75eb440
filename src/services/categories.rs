use crate::{entities::category, errors::ServiceError};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

/// Product categories. Names are unique across active and retired rows.
#[derive(Clone)]
pub struct CategoryService {
    db: Arc<DatabaseConnection>,
}

impl CategoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Active categories in alphabetical order
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<category::Model>, ServiceError> {
        category::Entity::find()
            .filter(category::Column::Active.eq(true))
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn create(&self, input: NewCategory) -> Result<category::Model, ServiceError> {
        self.ensure_name_free(&input.name, None).await?;

        let name = input.name.clone();
        let created = category::ActiveModel {
            name: Set(input.name),
            description: Set(input.description),
            active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(|e| ServiceError::unique_violation_or_db(e, name_taken(&name)))?;

        info!(category_id = created.id, "Category created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: i32,
        changes: CategoryChanges,
    ) -> Result<category::Model, ServiceError> {
        let current = self.find_active(id).await?;

        if let Some(name) = &changes.name {
            self.ensure_name_free(name, Some(id)).await?;
        }

        let name = changes.name.clone().unwrap_or_else(|| current.name.clone());
        let mut model = current.into_active_model();
        if let Some(name) = changes.name {
            model.name = Set(name);
        }
        if let Some(description) = changes.description {
            model.description = Set(description);
        }

        model
            .update(&*self.db)
            .await
            .map_err(|e| ServiceError::unique_violation_or_db(e, name_taken(&name)))
    }

    /// Retires a category. Stock items keep their reference.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let mut model = self.find_active(id).await?.into_active_model();
        model.active = Set(false);
        model
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        info!(category_id = id, "Category deactivated");
        Ok(())
    }

    async fn find_active(&self, id: i32) -> Result<category::Model, ServiceError> {
        category::Entity::find_by_id(id)
            .filter(category::Column::Active.eq(true))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))
    }

    async fn ensure_name_free(&self, name: &str, except: Option<i32>) -> Result<(), ServiceError> {
        let mut query = category::Entity::find().filter(category::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(category::Column::Id.ne(id));
        }

        let taken = query
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .is_some();
        if taken {
            return Err(name_taken(name));
        }
        Ok(())
    }
}

fn name_taken(name: &str) -> ServiceError {
    ServiceError::Conflict(format!("Category '{}' already exists", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::setup_db;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn seeded_categories_are_listed_alphabetically() {
        let service = CategoryService::new(setup_db().await);
        let names: Vec<String> = service.list().await.unwrap().into_iter().map(|c| c.name).collect();

        assert_eq!(names.len(), 6);
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let service = CategoryService::new(setup_db().await);
        let result = service
            .create(NewCategory {
                name: "Dana".into(),
                description: None,
            })
            .await;
        assert_matches!(result, Err(ServiceError::Conflict(_)));

        let sakatat = service
            .create(NewCategory {
                name: "Sakatat".into(),
                description: Some("Ciğer, böbrek".into()),
            })
            .await
            .unwrap();
        let renamed = service
            .update(
                sakatat.id,
                CategoryChanges {
                    name: Some("Tavuk".into()),
                    ..Default::default()
                },
            )
            .await;
        assert_matches!(renamed, Err(ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn racing_creates_for_one_name_conflict() {
        let service = CategoryService::new(setup_db().await);
        let new = || NewCategory {
            name: "Kasaplık Hayvan".into(),
            description: None,
        };

        let (first, second) = tokio::join!(service.create(new()), service.create(new()));

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn deleted_category_disappears_from_list() {
        let service = CategoryService::new(setup_db().await);
        let first = service.list().await.unwrap().remove(0);

        service.delete(first.id).await.unwrap();

        let remaining = service.list().await.unwrap();
        assert_eq!(remaining.len(), 5);
        assert!(remaining.iter().all(|c| c.id != first.id));
        assert_matches!(service.delete(first.id).await, Err(ServiceError::NotFound(_)));
    }
}
