use crate::auth::jwt::TokenCodec;
use crate::error::{AppError, AuthError};
use crate::users::{User, UserRepository};

/// Request-time authorization
///
/// Order of checks: bearer header, token decode, subject lookup, active flag,
/// required roles. The subject is reloaded on every call so that a change to
/// `is_active` or `roles` applies to the very next request.
#[derive(Clone)]
pub struct AccessGuard {
    codec: TokenCodec,
    users: UserRepository,
    required_roles: Vec<String>,
    enforce_active: bool,
}

impl AccessGuard {
    pub fn new(codec: TokenCodec, users: UserRepository) -> Self {
        Self {
            codec,
            users,
            required_roles: Vec::new(),
            enforce_active: true,
        }
    }

    /// Every listed role must be held
    pub fn require_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Skip the active-flag check. Used by logout, which has no effect on
    /// server state and therefore stays available to disabled accounts.
    pub fn allow_inactive(mut self) -> Self {
        self.enforce_active = false;
        self
    }

    pub async fn authorize(&self, authorization: Option<&str>) -> Result<User, AppError> {
        let token = bearer_token(authorization)?;
        let claims = self.codec.decode_access(token)?;

        let user = self
            .users
            .find_by_id(claims.user_id()?)
            .await?
            .ok_or(AuthError::MissingUser)?;

        if self.enforce_active && !user.is_active {
            return Err(AuthError::Inactive.into());
        }
        user.roles.require(&self.required_roles)?;

        Ok(user)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(authorization: Option<&str>) -> Result<&str, AuthError> {
    let header = authorization.ok_or(AuthError::MissingToken)?;
    match header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AuthError::InvalidHeader),
    }
}
