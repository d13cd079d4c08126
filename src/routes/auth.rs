/// Authentication Routes
///
/// Handles registration, login, logout, token refresh, account status and
/// account disabling.

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{bearer_token, AuthService, Lifespans, Session};
use crate::error::{AppError, ValidationError};
use crate::users::{User, UserResponse};
use crate::validators::{is_valid_lifespan, NewUser};

/// User registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub access_lifespan: Option<i64>,
    pub refresh_lifespan: Option<i64>,
}

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub access_lifespan: Option<i64>,
    pub refresh_lifespan: Option<i64>,
}

#[derive(Deserialize)]
pub struct DisableRequest {
    pub email: String,
}

/// User projection plus freshly minted tokens
#[derive(Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub auth_token: String,
    pub refresh_token: String,
}

impl From<Session> for AuthResponse {
    fn from(session: Session) -> Self {
        Self {
            user: UserResponse::from(&session.user),
            auth_token: session.tokens.access_token,
            refresh_token: session.tokens.refresh_token,
        }
    }
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub auth_token: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn lifespans(access: Option<i64>, refresh: Option<i64>) -> Result<Lifespans, ValidationError> {
    Ok(Lifespans {
        access: is_valid_lifespan("access_lifespan", access)?,
        refresh: is_valid_lifespan("refresh_lifespan", refresh)?,
    })
}

/// POST /auth/register
///
/// Register a new user and return the user together with an access token and
/// a refresh token.
///
/// # Errors
/// - 400: Missing or invalid username/email/password, bad lifespan override
/// - 409: Email or username already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let new_user = NewUser::parse(&form.username, &form.email, &form.password)?;
    let lifespans = lifespans(form.access_lifespan, form.refresh_lifespan)?;

    let session = service.register(&new_user, lifespans).await?;

    Ok(HttpResponse::Created().json(AuthResponse::from(session)))
}

/// POST /auth/login
///
/// # Errors
/// - 400: Missing email or password
/// - 401: Unknown email or wrong password
/// - 403: Account is inactive
pub async fn login(
    form: web::Json<LoginRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    if form.email.trim().is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()).into());
    }
    if form.password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()).into());
    }
    let lifespans = lifespans(form.access_lifespan, form.refresh_lifespan)?;

    let session = service.login(&form.email, &form.password, lifespans).await?;

    Ok(HttpResponse::Ok().json(AuthResponse::from(session)))
}

/// GET /auth/logout
pub async fn logout(
    user: web::ReqData<User>,
    service: web::Data<AuthService>,
) -> HttpResponse {
    let message = service.logout(&user);
    HttpResponse::Ok().json(MessageResponse {
        message: message.to_string(),
    })
}

/// GET /auth/refresh
///
/// Exchange the bearer token (access or refresh) for a new access token.
/// Not wrapped by the JWT middleware: an expired access token is still
/// accepted here as long as its refresh deadline has not passed.
///
/// # Errors
/// - 401: Missing/undecodable token, `EarlyRefreshError`, `ExpiredRefreshError`
/// - 403: Account is inactive
pub async fn refresh(
    req: HttpRequest,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .map(|h| h.to_str().unwrap_or_default());
    let token = bearer_token(authorization)?;

    let auth_token = service.refresh(token).await?;

    Ok(HttpResponse::Ok().json(RefreshResponse { auth_token }))
}

/// GET /auth/status
pub async fn status(
    user: web::ReqData<User>,
    service: web::Data<AuthService>,
) -> HttpResponse {
    HttpResponse::Ok().json(service.status(&user))
}

/// PATCH /auth/disable
///
/// **Requires the `admin` role.** Marks the account registered under
/// `email` as inactive.
///
/// # Errors
/// - 403: Caller lacks the admin role (normally caught by the middleware)
/// - 404: No account with that email
pub async fn disable(
    user: web::ReqData<User>,
    form: web::Json<DisableRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let disabled = service.disable(&user, &form.email).await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: format!("disabled user {}", disabled.username),
    }))
}
