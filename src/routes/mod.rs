mod auth;
mod health_check;
mod users;

pub use auth::{disable, login, logout, refresh, register, status};
pub use health_check::health_check;
pub use users::{create_user, get_user, list_users, ping};
