mod model;
mod repository;

pub use model::{parse_user_id, User, UserResponse};
pub use repository::UserRepository;
