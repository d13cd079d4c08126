/// Authentication module
///
/// Password hashing, JWT encoding/decoding and refresh, role sets,
/// request-time access control and the service tying them to the user
/// directory.

mod claims;
mod guard;
mod jwt;
mod password;
mod roles;
mod service;

pub use claims::{Claims, TokenType};
pub use guard::{bearer_token, AccessGuard};
pub use jwt::{Lifespans, RefreshedToken, TokenCodec, TokenPair};
pub use password::CredentialHasher;
pub use roles::{RoleSet, ADMIN_ROLE};
pub use service::{AuthService, Session, LOGOUT_MESSAGE};
