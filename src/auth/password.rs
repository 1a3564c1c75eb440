use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::errors::ServiceError;

/// Minimum accepted length for new passwords
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Argon2id hasher with configurable cost.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .finish()
    }
}

impl PasswordHasher {
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self, ServiceError> {
        let params = Params::new(memory_kib, iterations, Params::DEFAULT_P_COST, None)
            .map_err(|e| ServiceError::HashError(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hashes `password` into a PHC string with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, ServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ServiceError::HashError(e.to_string()))
    }

    /// Checks `password` against a stored PHC string. The parameters embedded
    /// in the stored hash win over the configured ones.
    pub fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, ServiceError> {
        let parsed =
            PasswordHash::new(stored_hash).map_err(|e| ServiceError::HashError(e.to_string()))?;
        match self.argon2().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(ServiceError::HashError(e.to_string())),
        }
    }

    /// [`hash`](Self::hash) on the blocking pool.
    pub async fn hash_blocking(&self, password: String) -> Result<String, ServiceError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| ServiceError::InternalError(format!("hashing task failed: {}", e)))?
    }

    /// [`verify`](Self::verify) on the blocking pool.
    pub async fn verify_blocking(
        &self,
        password: String,
        stored_hash: String,
    ) -> Result<bool, ServiceError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash))
            .await
            .map_err(|e| ServiceError::InternalError(format!("hashing task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> PasswordHasher {
        PasswordHasher::new(8, 1).unwrap()
    }

    #[test]
    fn hash_then_verify() {
        let hasher = fast_hasher();
        let hash = hasher.hash("admin123").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("admin123", &hash).unwrap());
        assert!(!hasher.verify("admin124", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let hasher = fast_hasher();
        assert_ne!(hasher.hash("secret").unwrap(), hasher.hash("secret").unwrap());
    }

    #[test]
    fn malformed_stored_hash_is_an_error() {
        let hasher = fast_hasher();
        assert!(matches!(
            hasher.verify("x", "not-a-phc-string"),
            Err(ServiceError::HashError(_))
        ));
    }

    #[test]
    fn zero_iterations_are_rejected() {
        assert!(PasswordHasher::new(8, 0).is_err());
    }

    #[tokio::test]
    async fn blocking_wrappers_round_trip() {
        let hasher = fast_hasher();
        let hash = hasher.hash_blocking("kasap".into()).await.unwrap();
        assert!(hasher
            .verify_blocking("kasap".into(), hash)
            .await
            .unwrap());
    }
}
