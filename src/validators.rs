/// Input validators
///
/// Everything that reaches the user directory goes through here first:
/// 1. Length limits matching the `users` column sizes
/// 2. Email format
/// 3. Control character rejection
/// 4. Token lifespan override bounds

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 128;
const MIN_EMAIL_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 128;
// bcrypt only looks at the first 72 bytes
const MAX_PASSWORD_LENGTH: usize = 72;
/// Upper bound for per-token lifespan overrides (ten years)
pub const MAX_LIFESPAN_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).expect("email regex is valid");
}

/// Validated input for creating a user. The plaintext password only lives
/// as long as this value and is never logged.
pub struct NewUser {
    username: String,
    email: String,
    password: String,
}

impl NewUser {
    pub fn parse(username: &str, email: &str, password: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            username: is_valid_username(username)?,
            email: is_valid_email(email)?,
            password: is_valid_password(password)?.to_string(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

/// Validates email address
/// - Checks format using RFC 5322 simplified regex
/// - Verifies length constraints
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Validates username
/// - Non-empty after trimming, at most 128 characters
/// - No control characters or null bytes
pub fn is_valid_username(username: &str) -> Result<String, ValidationError> {
    let trimmed = username.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("username".to_string()));
    }

    if trimmed.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong("username".to_string(), MAX_USERNAME_LENGTH));
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::SuspiciousContent("username".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Passwords are taken verbatim (no trimming)
pub fn is_valid_password(password: &str) -> Result<&str, ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password".to_string(), MAX_PASSWORD_LENGTH));
    }

    Ok(password)
}

pub fn is_valid_lifespan(field: &str, seconds: Option<i64>) -> Result<Option<i64>, ValidationError> {
    match seconds {
        Some(s) if !(0..=MAX_LIFESPAN_SECONDS).contains(&s) => Err(ValidationError::OutOfRange(
            field.to_string(),
            0,
            MAX_LIFESPAN_SECONDS,
        )),
        other => Ok(other),
    }
}
