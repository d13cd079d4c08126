/// Password Hashing and Verification
///
/// bcrypt with a configurable work factor. Each hash embeds its own random
/// salt, so hashing one password twice yields two different strings.

use bcrypt::{hash, verify};

use crate::error::AppError;

#[derive(Debug, Clone, Copy)]
pub struct CredentialHasher {
    cost: u32,
}

impl CredentialHasher {
    /// # Arguments
    /// * `cost` - bcrypt work factor (4..=31)
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a plaintext password on the blocking pool
    ///
    /// # Errors
    /// Returns error if the cost is out of range or bcrypt fails
    pub async fn hash(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_string();
        let cost = self.cost;

        let hashed = tokio::task::spawn_blocking(move || hash(password, cost))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))??;
        Ok(hashed)
    }

    /// Verify a password against a stored hash on the blocking pool
    ///
    /// A hash that cannot be parsed never verifies.
    pub async fn verify(&self, password: &str, password_hash: &str) -> bool {
        let password = password.to_string();
        let password_hash = password_hash.to_string();

        match tokio::task::spawn_blocking(move || verify(password, &password_hash)).await {
            Ok(Ok(valid)) => valid,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Stored password hash could not be parsed");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Password verification task failed");
                false
            }
        }
    }
}
