use crate::{
    auth::{password::MIN_PASSWORD_LENGTH, AuthError, AuthService, IssuedToken, PasswordHasher},
    entities::user::{self, Role},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Token plus the profile of the account that logged in
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    #[serde(flatten)]
    pub token: IssuedToken,
    pub user: user::Model,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub role: Role,
}

/// Accounts, credentials and login
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    auth: Arc<AuthService>,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>, auth: Arc<AuthService>, hasher: PasswordHasher) -> Self {
        Self { db, auth, hasher }
    }

    /// Verifies credentials and issues a token. Unknown, inactive and
    /// wrong-password logins all fail the same way.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ServiceError> {
        let email = normalize_email(email);

        let account = user::Entity::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .filter(user::Column::Active.eq(true))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let Some(account) = account else {
            warn!("Login for unknown or inactive account");
            return Err(AuthError::InvalidCredentials.into());
        };

        let valid = self
            .hasher
            .verify_blocking(password.to_string(), account.password_hash.clone())
            .await?;
        if !valid {
            warn!(user_id = account.id, "Login with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let token = self.auth.generate_token(&account)?;

        let mut model = account.into_active_model();
        model.last_login = Set(Some(Utc::now()));
        let account = model
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        info!(user_id = account.id, "User logged in");
        Ok(LoginOutcome {
            token,
            user: account,
        })
    }

    #[instrument(skip(self))]
    pub async fn profile(&self, id: i32) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(id)
            .filter(user::Column::Active.eq(true))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        check_password_length(new_password)?;

        let account = self.profile(id).await?;
        let valid = self
            .hasher
            .verify_blocking(current_password.to_string(), account.password_hash.clone())
            .await?;
        if !valid {
            return Err(ServiceError::BadRequest(
                "Current password is incorrect".to_string(),
            ));
        }

        let hash = self.hasher.hash_blocking(new_password.to_string()).await?;
        let mut model = account.into_active_model();
        model.password_hash = Set(hash);
        model.updated_at = Set(Utc::now());
        model
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        info!(user_id = id, "Password changed");
        Ok(())
    }

    /// Creates an account. A taken email is a client error.
    #[instrument(skip(self, input), fields(email = %input.email, role = %input.role))]
    pub async fn register(&self, input: NewUser) -> Result<user::Model, ServiceError> {
        check_password_length(&input.password)?;
        let email = normalize_email(&input.email);

        if self.find_by_email(&email).await?.is_some() {
            return Err(email_taken());
        }

        let hash = self.hasher.hash_blocking(input.password).await?;
        let now = Utc::now();
        let created = user::ActiveModel {
            name: Set(input.name.trim().to_string()),
            email: Set(email),
            phone: Set(input.phone),
            password_hash: Set(hash),
            role: Set(input.role),
            active: Set(true),
            last_login: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(|e| ServiceError::unique_violation_or_db(e, email_taken()))?;

        info!(user_id = created.id, "User registered");
        Ok(created)
    }

    /// Creates the admin account unless `email` is already taken. Returns the
    /// account and whether it was created.
    #[instrument(skip(self, password))]
    pub async fn ensure_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(user::Model, bool), ServiceError> {
        if let Some(existing) = self.find_by_email(&normalize_email(email)).await? {
            return Ok((existing, false));
        }

        let created = self
            .register(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                phone: None,
                role: Role::Admin,
            })
            .await?;
        Ok((created, true))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }
}

fn email_taken() -> ServiceError {
    ServiceError::BadRequest("Email is already registered".to_string())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_password_length(password: &str) -> Result<(), ServiceError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ServiceError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}
