/// Core business logic for authentication.
///
/// `AuthService` composes the user directory, the credential hasher and the
/// token codec. It returns domain values; HTTP status codes are decided by
/// the route handlers and by `AppError`.

use crate::auth::jwt::{Lifespans, TokenCodec, TokenPair};
use crate::auth::roles::ADMIN_ROLE;
use crate::error::{AppError, AuthError};
use crate::users::{User, UserRepository, UserResponse};
use crate::validators::NewUser;

pub const LOGOUT_MESSAGE: &str = "Successfully logged out.";

/// A user together with the tokens just minted for them
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    codec: TokenCodec,
}

impl AuthService {
    pub fn new(users: UserRepository, codec: TokenCodec) -> Self {
        Self { users, codec }
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Create the account and mint its first token pair
    pub async fn register(&self, new_user: &NewUser, lifespans: Lifespans) -> Result<Session, AppError> {
        let user = self.users.create(new_user).await?;
        let tokens = self.codec.encode_pair(&user, lifespans)?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        Ok(Session { user, tokens })
    }

    /// Authenticate by email and password
    ///
    /// # Errors
    /// - 401 `AuthError::UnknownUser` / `AuthError::WrongPassword`
    /// - 403 `AuthError::Inactive` when the password is right but the
    ///   account has been disabled
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        lifespans: Lifespans,
    ) -> Result<Session, AppError> {
        let user = self
            .users
            .find_by_email(email.trim())
            .await?
            .ok_or(AuthError::UnknownUser)?;

        if !self.users.hasher().verify(password, &user.password_hash).await {
            return Err(AuthError::WrongPassword.into());
        }
        if !user.is_active {
            return Err(AuthError::Inactive.into());
        }

        let tokens = self.codec.encode_pair(&user, lifespans)?;
        tracing::info!(user_id = user.id, "User logged in");
        Ok(Session { user, tokens })
    }

    /// Tokens are not tracked server-side, so there is nothing to revoke.
    /// The token stays usable until it expires.
    pub fn logout(&self, user: &User) -> &'static str {
        tracing::info!(user_id = user.id, "User logged out");
        LOGOUT_MESSAGE
    }

    /// Exchange `old_token` for a new access token. The subject is reloaded so
    /// that a deleted or disabled account cannot keep refreshing.
    pub async fn refresh(&self, old_token: &str) -> Result<String, AppError> {
        let refreshed = self.codec.refresh(old_token)?;

        let user = self
            .users
            .find_by_id(refreshed.claims.user_id()?)
            .await?
            .ok_or(AuthError::MissingUser)?;
        if !user.is_active {
            return Err(AuthError::Inactive.into());
        }

        tracing::info!(user_id = user.id, "Token refreshed");
        Ok(refreshed.token)
    }

    pub fn status(&self, user: &User) -> UserResponse {
        UserResponse::from(user)
    }

    /// Disable the account registered under `target_email`
    ///
    /// # Errors
    /// - 403 `AuthError::MissingRoles` unless `caller` holds the admin role
    /// - 404 when no account has that email
    pub async fn disable(&self, caller: &User, target_email: &str) -> Result<User, AppError> {
        caller.roles.require(&[ADMIN_ROLE.to_string()])?;

        let target_email = target_email.trim();
        let target = self
            .users
            .find_by_email(target_email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User Not Found by Email {}", target_email)))?;

        self.users.set_active(target.id, false).await?;

        tracing::info!(
            admin_id = caller.id,
            user_id = target.id,
            "User disabled"
        );
        Ok(User {
            is_active: false,
            ..target
        })
    }
}
