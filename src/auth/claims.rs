/// JWT Claims structure
///
/// One claims layout serves both token types. `exp` bounds use of the token
/// itself; `rf_exp` bounds how long it may still be exchanged for a fresh
/// access token.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, TokenError};

/// Token-type discriminator carried in the `typ` claim
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    pub email: String,
    pub username: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Refresh deadline (Unix timestamp)
    pub rf_exp: i64,
    /// Unique token id
    pub jti: String,
    pub typ: TokenType,
    pub iss: String,
}

impl Claims {
    /// Extract the subject's user id
    ///
    /// # Errors
    /// Returns error if the subject is not an integer id
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| TokenError::Malformed("Invalid subject in token".to_string()).into())
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp < now
    }

    pub fn can_refresh_until(&self, now: i64) -> bool {
        now <= self.rf_exp
    }
}
