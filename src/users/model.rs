use serde::Serialize;

use crate::auth::RoleSet;

/// Identity record as used by the rest of the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub admin: bool,
    pub is_active: bool,
    pub roles: RoleSet,
}

/// Row layout of the `users` table
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub admin: bool,
    pub roles: Option<String>,
    pub is_active: bool,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password,
            admin: row.admin,
            is_active: row.is_active,
            roles: RoleSet::from_column(row.roles.as_deref()),
        }
    }
}

/// Public projection of a user; never carries the password hash or roles
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub admin: bool,
    pub is_active: bool,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            admin: user.admin,
            is_active: user.is_active,
        }
    }
}

/// Parse a user id as received from a path or other untyped source.
///
/// Only plain non-negative decimal integers are accepted; anything else
/// (`"blah"`, `"-1"`, `"1.5"`, `""`) is `None`.
pub fn parse_user_id(raw: &str) -> Option<i64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<i64>().ok()
}
