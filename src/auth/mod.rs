/*!
 * # Authentication and Authorization Module
 *
 * Bearer-token authentication for the shop API:
 *
 * - HS256 JWTs carrying the user id, email and role with a fixed lifetime
 * - Argon2id password hashing
 * - An [`AuthUser`] extractor that validates the token and reloads the
 *   account on every request, so deactivated users lose access immediately
 * - Role checks in [`rbac`]
 *
 * There is no refresh flow and no revocation list; a token is valid until it
 * expires or its user is deactivated.
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::user::{self, Role};
use crate::errors::ServiceError;

pub mod password;
pub mod rbac;

pub use password::PasswordHasher;
pub use rbac::{require_admin, require_clerk_or_admin};

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // User ID
    pub email: String,
    pub role: Role,
    pub jti: String,  // Unique token id
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated account resolved from the bearer token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    /// Check if the user has a specific role
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    /// Check if the user is an admin
    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

impl From<&user::Model> for AuthUser {
    fn from(model: &user::Model) -> Self {
        Self {
            id: model.id,
            name: model.name.clone(),
            email: model.email.clone(),
            role: model.role,
        }
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, token_expiration: Duration) -> Self {
        Self {
            jwt_secret,
            token_expiration,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        )
    }
}

/// Signed token handed out at login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Authentication service that handles token issuance and validation
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
    db: Arc<DatabaseConnection>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Issue a token for `user`
    pub fn generate_token(&self, user: &user::Model) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let lifetime = ChronoDuration::from_std(self.config.token_expiration)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(IssuedToken {
            token,
            token_type: "Bearer".to_string(),
            expires_in: lifetime.num_seconds(),
        })
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Resolve a bearer token to the active account it belongs to
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.validate_token(token)?;
        let user_id: i32 = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;

        let user = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::UserInactive)?;

        if !user.active {
            debug!(user_id, "token presented for inactive user");
            return Err(AuthError::UserInactive);
        }

        Ok(AuthUser::from(&user))
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Access token required")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User not found or inactive")]
    UserInactive,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidCredentials | AuthError::UserInactive => {
                ServiceError::Unauthorized(err.to_string())
            }
            AuthError::InvalidToken | AuthError::TokenExpired => {
                ServiceError::Forbidden(err.to_string())
            }
            AuthError::InsufficientPermissions => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(msg) => ServiceError::InternalError(msg),
            AuthError::DatabaseError(msg) => ServiceError::InternalError(msg),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError::MissingToken)?;
        let auth = Arc::<AuthService>::from_ref(state);

        auth.authenticate(token).await.map_err(|e| {
            warn!(error = %e, "authentication rejected");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use sea_orm::Database;

    const SECRET: &str =
        "kasap-dukkani-test-secret-9f8e7d6c5b4a-ZYXWVUTSRQ-mnopqrstuvwxyz-0987654321-QWERTY";

    async fn service(expiration: Duration) -> AuthService {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        AuthService::new(
            AuthConfig::new(SECRET.to_string(), expiration),
            Arc::new(db),
        )
    }

    fn user(role: Role) -> user::Model {
        let now = Utc::now();
        user::Model {
            id: 7,
            name: "Ahmet Usta".into(),
            email: "ahmet@kasap.com".into(),
            phone: None,
            password_hash: String::new(),
            role,
            active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn issued_token_validates_and_carries_identity() {
        let auth = service(Duration::from_secs(3600)).await;
        let issued = auth.generate_token(&user(Role::Clerk)).unwrap();
        assert_eq!(issued.expires_in, 3600);

        let claims = auth.validate_token(&issued.token).unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.email, "ahmet@kasap.com");
        assert_eq!(claims.role, Role::Clerk);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_is_invalid() {
        let auth = service(Duration::from_secs(3600)).await;
        let other = AuthService::new(
            AuthConfig::new(format!("{}-other", SECRET), Duration::from_secs(3600)),
            Arc::new(Database::connect("sqlite::memory:").await.unwrap()),
        );
        let token = other.generate_token(&user(Role::Admin)).unwrap().token;

        assert!(matches!(
            auth.validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            auth.validate_token("garbage"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn expired_token_is_reported_as_expired() {
        let auth = service(Duration::from_secs(3600)).await;
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "7".into(),
            email: "ahmet@kasap.com".into(),
            role: Role::Regular,
            jti: "expired".into(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            auth.validate_token(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn auth_errors_map_to_expected_statuses() {
        assert_eq!(
            ServiceError::from(AuthError::MissingToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::from(AuthError::InvalidToken).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::from(AuthError::TokenExpired).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::from(AuthError::UserInactive).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::from(AuthError::InsufficientPermissions).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn bearer_token_parsing() {
        let (parts, _) = Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc.def")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts), Some("abc.def"));

        let (parts, _) = Request::builder()
            .header(header::AUTHORIZATION, "Basic abc")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts), None);

        let (parts, _) = Request::builder().body(()).unwrap().into_parts();
        assert_eq!(bearer_token(&parts), None);
    }
}
