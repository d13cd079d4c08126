use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::AuthService;
use crate::error::AppError;
use crate::users::UserResponse;
use crate::validators::NewUser;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// GET /users/ping
pub async fn ping() -> HttpResponse {
    HttpResponse::Ok().json(PingResponse {
        status: "success",
        message: "pong!",
    })
}

/// GET /users/{user_id}
///
/// Ids that are not plain integers are reported as not found, echoing the
/// raw input.
pub async fn get_user(
    path: web::Path<String>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let raw_id = path.into_inner();
    let user = service
        .users()
        .find_by_raw_id(&raw_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User Not Found by Id {}", raw_id)))?;

    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}

/// GET /users/
pub async fn list_users(service: web::Data<AuthService>) -> Result<HttpResponse, AppError> {
    let users: Vec<UserResponse> = service
        .users()
        .list_all()
        .await?
        .iter()
        .map(UserResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(users))
}

/// POST /users/
///
/// # Errors
/// - 400: Invalid input
/// - 409: Email or username already registered
pub async fn create_user(
    form: web::Json<CreateUserRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let new_user = NewUser::parse(&form.username, &form.email, &form.password)?;
    let user = service.users().create(&new_user).await?;

    Ok(HttpResponse::Created().json(UserResponse::from(&user)))
}
