/// JWT Token Generation and Validation
///
/// `TokenCodec` mints, decodes and refreshes HS256 tokens. It is pure: no
/// database access happens here, callers resolve the subject themselves.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{Claims, TokenType};
use crate::configuration::AuthSettings;
use crate::error::{AppError, TokenError};
use crate::users::User;

/// Per-token lifespan overrides in seconds; `None` falls back to configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lifespans {
    pub access: Option<i64>,
    pub refresh: Option<i64>,
}

/// Access and refresh tokens minted together on login/registration
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful refresh
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub token: String,
    pub claims: Claims,
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_lifespan: i64,
    refresh_lifespan: i64,
    min_refresh_interval: i64,
}

impl TokenCodec {
    pub fn new(config: &AuthSettings) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            access_lifespan: config.access_token_lifespan,
            refresh_lifespan: config.refresh_token_lifespan,
            min_refresh_interval: config.min_refresh_interval,
        }
    }

    /// Mint a token of the given type for `user`
    ///
    /// # Errors
    /// Returns error if signing fails
    pub fn encode(
        &self,
        user: &User,
        token_type: TokenType,
        lifespans: Lifespans,
    ) -> Result<String, AppError> {
        self.encode_at(user, token_type, lifespans, Utc::now().timestamp())
    }

    pub fn encode_pair(&self, user: &User, lifespans: Lifespans) -> Result<TokenPair, AppError> {
        let now = Utc::now().timestamp();
        Ok(TokenPair {
            access_token: self.encode_at(user, TokenType::Access, lifespans, now)?,
            refresh_token: self.encode_at(user, TokenType::Refresh, lifespans, now)?,
        })
    }

    fn encode_at(
        &self,
        user: &User,
        token_type: TokenType,
        lifespans: Lifespans,
        now: i64,
    ) -> Result<String, AppError> {
        let access = lifespans.access.unwrap_or(self.access_lifespan);
        let refresh = lifespans.refresh.unwrap_or(self.refresh_lifespan);

        let rf_exp = now.saturating_add(refresh);
        let exp = match token_type {
            // An access token never outlives its refresh window
            TokenType::Access => now.saturating_add(access).min(rf_exp),
            TokenType::Refresh => rf_exp,
        };

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            username: user.username.clone(),
            iat: now,
            exp,
            rf_exp,
            jti: uuid::Uuid::new_v4().to_string(),
            typ: token_type,
            iss: self.issuer.clone(),
        };

        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Decode and verify a token of either type
    ///
    /// # Errors
    /// Returns a `TokenError` if the token is malformed, tampered with,
    /// signed with another key, issued elsewhere or expired
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        self.decode_with(token, true)
    }

    /// Decode a token that must be an access token
    pub fn decode_access(&self, token: &str) -> Result<Claims, AppError> {
        let claims = self.decode(token)?;
        if claims.typ != TokenType::Access {
            return Err(TokenError::MisusedRefreshToken.into());
        }
        Ok(claims)
    }

    fn decode_with(&self, token: &str, validate_exp: bool) -> Result<Claims, AppError> {
        check_segments(token)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;
        validation.validate_exp = validate_exp;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| map_jwt_error(e).into())
    }

    /// Exchange an old token for a fresh access token
    ///
    /// The old token may already be past `exp`; what matters is that its
    /// refresh deadline has not passed and that it is at least
    /// `min_refresh_interval` seconds old. The new token keeps the original
    /// refresh deadline.
    pub fn refresh(&self, old_token: &str) -> Result<RefreshedToken, AppError> {
        self.refresh_at(old_token, Utc::now().timestamp())
    }

    fn refresh_at(&self, old_token: &str, now: i64) -> Result<RefreshedToken, AppError> {
        let old = self.decode_with(old_token, false)?;

        if !old.can_refresh_until(now) {
            return Err(TokenError::ExpiredRefresh.into());
        }
        if now - old.iat < self.min_refresh_interval {
            return Err(TokenError::EarlyRefresh(self.min_refresh_interval).into());
        }

        let claims = Claims {
            iat: now,
            exp: now.saturating_add(self.access_lifespan).min(old.rf_exp),
            jti: uuid::Uuid::new_v4().to_string(),
            typ: TokenType::Access,
            ..old
        };
        let token = self.sign(&claims)?;

        Ok(RefreshedToken { token, claims })
    }
}

fn check_segments(token: &str) -> Result<(), TokenError> {
    match token.split('.').count() {
        n if n < 3 => Err(TokenError::NotEnoughSegments),
        3 => Ok(()),
        _ => Err(TokenError::WrongNumberOfSegments),
    }
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> TokenError {
    match e.kind() {
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidIssuer => TokenError::Malformed("Invalid issuer".to_string()),
        _ => TokenError::Malformed(e.to_string()),
    }
}
