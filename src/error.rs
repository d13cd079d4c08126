/// Application Error Handling
///
/// Domain error enums are composed into a single `AppError`, which is what
/// handlers, the guard and the user directory return. `AppError` knows how to
/// log itself and how to render the JSON error body every endpoint shares:
///
/// ```json
/// {"status_code": 401, "error": "EarlyRefreshError", "message": "...", ...}
/// ```

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for input data
#[derive(Debug, Clone)]
pub enum ValidationError {
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
    SuspiciousContent(String),
    OutOfRange(String, i64, i64),
    /// Request body could not be deserialized
    Payload(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
            ValidationError::SuspiciousContent(field) => {
                write!(f, "{} contains suspicious content", field)
            }
            ValidationError::OutOfRange(field, min, max) => {
                write!(f, "{} must be between {} and {}", field, min, max)
            }
            ValidationError::Payload(detail) => {
                write!(f, "Input payload validation failed: {}", detail)
            }
        }
    }
}

impl StdError for ValidationError {}

/// Database operation errors
#[derive(Debug)]
pub enum DatabaseError {
    DuplicateEmail(String),
    DuplicateUsername(String),
    /// Any other constraint violation on write
    Integrity(String),
    /// A write failed for a non-constraint reason and was rolled back
    WriteFailed(String),
    QueryExecution(String),
    ConnectionPool(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::DuplicateEmail(email) => write!(f, "Email already exists: {}", email),
            DatabaseError::DuplicateUsername(username) => {
                write!(f, "Username already exists: {}", username)
            }
            DatabaseError::Integrity(msg) => write!(f, "Integrity error: {}", msg),
            DatabaseError::WriteFailed(msg) => write!(f, "Write failed: {}", msg),
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Token decoding and refresh errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    NotEnoughSegments,
    WrongNumberOfSegments,
    InvalidSignature,
    Expired,
    Malformed(String),
    /// A refresh token was presented where an access token is required
    MisusedRefreshToken,
    EarlyRefresh(i64),
    ExpiredRefresh,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::NotEnoughSegments => {
                write!(f, "failed to decode JWT token -- DecodeError: Not enough segments")
            }
            TokenError::WrongNumberOfSegments => {
                write!(f, "failed to decode JWT token -- DecodeError: Wrong number of segments")
            }
            TokenError::InvalidSignature => write!(
                f,
                "failed to decode JWT token -- InvalidSignatureError: Signature verification failed"
            ),
            TokenError::Expired => write!(
                f,
                "failed to decode JWT token -- ExpiredSignatureError: Signature has expired"
            ),
            TokenError::Malformed(detail) => {
                write!(f, "failed to decode JWT token -- DecodeError: {}", detail)
            }
            TokenError::MisusedRefreshToken => {
                write!(f, "Cannot access a protected endpoint with a refresh token")
            }
            TokenError::EarlyRefresh(interval) => write!(
                f,
                "Token must be at least {} seconds old before attempting refresh",
                interval
            ),
            TokenError::ExpiredRefresh => write!(f, "Refresh permission for token has expired"),
        }
    }
}

impl StdError for TokenError {}

/// Authentication and authorization errors
#[derive(Debug, Clone)]
pub enum AuthError {
    MissingToken,
    InvalidHeader,
    UnknownUser,
    WrongPassword,
    /// Token subject no longer resolves to a user
    MissingUser,
    Inactive,
    MissingRoles {
        required: Vec<String>,
        missing: Vec<String>,
    },
}

fn quoted_list(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{}'", n)).collect();
    format!("[{}]", quoted.join(", "))
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "JWT token not found in headers under 'Authorization'"),
            AuthError::InvalidHeader => {
                write!(f, "JWT header structure is invalid; expected 'Bearer <token>'")
            }
            AuthError::UnknownUser => write!(f, "Could not find the requested user"),
            AuthError::WrongPassword => write!(f, "The password is incorrect"),
            AuthError::MissingUser => write!(f, "Could not find the user identified by the token"),
            AuthError::Inactive => write!(f, "The user is not valid or has had access revoked"),
            AuthError::MissingRoles { required, missing } => write!(
                f,
                "This endpoint requires all the following roles: {}; missing: {}",
                quoted_list(required),
                quoted_list(missing)
            ),
        }
    }
}

impl StdError for AuthError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Database(DatabaseError),
    Token(TokenError),
    Auth(AuthError),
    NotFound(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Token(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::NotFound(msg) => write!(f, "{}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Token(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                // SQLite reports e.g. "UNIQUE constraint failed: users.email"
                if message.contains("constraint failed") {
                    AppError::Database(DatabaseError::Integrity(message))
                } else {
                    AppError::Database(DatabaseError::QueryExecution(message))
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::Database(DatabaseError::ConnectionPool(err.to_string()))
            }
            other => AppError::Database(DatabaseError::QueryExecution(other.to_string())),
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Credential hashing failed: {}", err))
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// HTTP status code
    pub status_code: u16,
    /// Short machine-readable error code
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Unique id for correlating with server logs
    pub error_id: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(status_code: u16, error: &str, message: String, error_id: String) -> Self {
        Self {
            status_code,
            error: error.to_string(),
            message,
            error_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl AppError {
    /// Short error code exposed to clients in the `error` field
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "ValidationError",
            AppError::Database(e) => match e {
                DatabaseError::DuplicateEmail(_) | DatabaseError::DuplicateUsername(_) => {
                    "DuplicateEntityError"
                }
                DatabaseError::Integrity(_) | DatabaseError::WriteFailed(_) => "IntegrityError",
                DatabaseError::ConnectionPool(_) => "ServiceUnavailable",
                DatabaseError::QueryExecution(_) => "DatabaseError",
            },
            AppError::Token(e) => match e {
                TokenError::Expired => "ExpiredAccessError",
                TokenError::MisusedRefreshToken => "MisusedRefreshToken",
                TokenError::EarlyRefresh(_) => "EarlyRefreshError",
                TokenError::ExpiredRefresh => "ExpiredRefreshError",
                _ => "InvalidTokenHeader",
            },
            AppError::Auth(e) => match e {
                AuthError::MissingToken => "MissingTokenHeader",
                AuthError::InvalidHeader => "InvalidTokenHeader",
                AuthError::UnknownUser | AuthError::WrongPassword => "AuthenticationError",
                AuthError::MissingUser => "MissingUserError",
                AuthError::Inactive => "InactiveUserError",
                AuthError::MissingRoles { .. } => "MissingRoleError",
            },
            AppError::NotFound(_) => "NotFoundError",
            AppError::Internal(_) => "InternalError",
        }
    }

    /// Message safe to show to clients; internal details stay in the logs
    fn public_message(&self) -> String {
        match self {
            AppError::Database(DatabaseError::QueryExecution(_)) => {
                "Database error occurred".to_string()
            }
            AppError::Database(DatabaseError::WriteFailed(_)) => {
                "Database write failed; no changes were saved".to_string()
            }
            AppError::Database(DatabaseError::ConnectionPool(_)) => {
                "Database service temporarily unavailable".to_string()
            }
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    fn log_error(&self, error_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Validation error");
            }
            AppError::Database(e @ (DatabaseError::DuplicateEmail(_) | DatabaseError::DuplicateUsername(_))) => {
                tracing::warn!(error_id = error_id, error = %e, "Duplicate entry attempt");
            }
            AppError::Database(DatabaseError::Integrity(msg)) => {
                tracing::warn!(error_id = error_id, error = %msg, "Integrity violation on write");
            }
            AppError::Database(e) => {
                tracing::error!(error_id = error_id, error = %e, "Database error");
            }
            AppError::Token(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Token rejected");
            }
            AppError::Auth(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Authentication error");
            }
            AppError::NotFound(msg) => {
                tracing::info!(error_id = error_id, error = %msg, "Resource not found");
            }
            AppError::Internal(msg) => {
                tracing::error!(error_id = error_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&error_id);

        let status = self.status_code();
        let body = ErrorResponse::new(status.as_u16(), self.code(), self.public_message(), error_id);

        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(e) => match e {
                DatabaseError::DuplicateEmail(_) | DatabaseError::DuplicateUsername(_) => {
                    StatusCode::CONFLICT
                }
                DatabaseError::Integrity(_) | DatabaseError::WriteFailed(_) => {
                    StatusCode::BAD_REQUEST
                }
                DatabaseError::ConnectionPool(_) => StatusCode::SERVICE_UNAVAILABLE,
                DatabaseError::QueryExecution(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Auth(e) => match e {
                AuthError::Inactive | AuthError::MissingRoles { .. } => StatusCode::FORBIDDEN,
                _ => StatusCode::UNAUTHORIZED,
            },
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
