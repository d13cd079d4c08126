/// User Directory
///
/// Every mutating call runs in its own transaction and is committed before it
/// returns. Errors drop the transaction, which rolls it back. Each write
/// transaction starts with its write statement, so SQLite takes the write
/// lock (waiting out the busy timeout) instead of upgrading a read snapshot.
/// Username/email uniqueness is enforced by the UNIQUE constraints on the
/// table. Non-constraint failures during a write surface as
/// `DatabaseError::WriteFailed`.

use sqlx::SqlitePool;

use crate::auth::{CredentialHasher, RoleSet};
use crate::error::{AppError, DatabaseError};
use crate::users::model::{parse_user_id, User, UserRow};
use crate::validators::NewUser;

const SELECT_USER: &str =
    "SELECT id, username, email, password, admin, roles, is_active FROM users";

#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
    hasher: CredentialHasher,
}

impl UserRepository {
    pub fn new(pool: SqlitePool, hasher: CredentialHasher) -> Self {
        Self { pool, hasher }
    }

    pub fn hasher(&self) -> &CredentialHasher {
        &self.hasher
    }

    /// Persist a new user with a freshly hashed password
    ///
    /// # Errors
    /// - `DatabaseError::DuplicateEmail` / `DuplicateUsername` on collision,
    ///   including collisions with a concurrent insert
    /// - `DatabaseError::Integrity` for any other constraint violation
    /// - `DatabaseError::WriteFailed` when the write could not be completed
    pub async fn create(&self, new_user: &NewUser) -> Result<User, AppError> {
        let password_hash = self.hasher.hash(new_user.password()).await?;

        let mut tx = self.pool.begin().await.map_err(write_failure)?;

        let inserted = sqlx::query("INSERT INTO users (username, email, password) VALUES (?, ?, ?)")
            .bind(new_user.username())
            .bind(new_user.email())
            .bind(&password_hash)
            .execute(&mut tx)
            .await;
        let result = match inserted {
            Ok(result) => result,
            Err(e) if is_unique_violation(&e) => {
                drop(tx);
                return Err(self.duplicate_error(e, new_user).await);
            }
            Err(e) => return Err(write_failure(e)),
        };

        let row = sqlx::query_as::<_, UserRow>(&format!("{} WHERE id = ?", SELECT_USER))
            .bind(result.last_insert_rowid())
            .fetch_one(&mut tx)
            .await
            .map_err(write_failure)?;

        tx.commit().await.map_err(write_failure)?;

        tracing::info!(user_id = row.id, username = %row.username, "User created");
        Ok(row.into())
    }

    /// Decide which field collided. Email is reported when both do.
    async fn duplicate_error(&self, err: sqlx::Error, new_user: &NewUser) -> AppError {
        if let Ok(Some(_)) = self.find_by_email(new_user.email()).await {
            return DatabaseError::DuplicateEmail(new_user.email().to_string()).into();
        }

        let username_taken =
            sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?")
                .bind(new_user.username())
                .fetch_optional(&self.pool)
                .await;
        if let Ok(Some(_)) = username_taken {
            return DatabaseError::DuplicateUsername(new_user.username().to_string()).into();
        }

        classify_insert_error(err, new_user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{} WHERE email = ?", SELECT_USER))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        if id < 0 {
            return Ok(None);
        }
        let row = sqlx::query_as::<_, UserRow>(&format!("{} WHERE id = ?", SELECT_USER))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    /// Look up a user by an untyped id; non-numeric input is simply not found
    pub async fn find_by_raw_id(&self, raw: &str) -> Result<Option<User>, AppError> {
        match parse_user_id(raw) {
            Some(id) => self.find_by_id(id).await,
            None => Ok(None),
        }
    }

    /// All users in creation order
    pub async fn list_all(&self) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!("{} ORDER BY id ASC", SELECT_USER))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    pub async fn set_active(&self, user_id: i64, active: bool) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(write_failure)?;

        let result = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(user_id)
            .execute(&mut tx)
            .await
            .map_err(write_failure)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User Not Found by Id {}", user_id)));
        }

        tx.commit().await.map_err(write_failure)?;
        tracing::info!(user_id = user_id, active = active, "User active flag updated");
        Ok(())
    }

    pub async fn set_privileges(
        &self,
        user_id: i64,
        roles: &RoleSet,
        admin: bool,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(write_failure)?;

        let result = sqlx::query("UPDATE users SET roles = ?, admin = ? WHERE id = ?")
            .bind(roles.to_column())
            .bind(admin)
            .bind(user_id)
            .execute(&mut tx)
            .await
            .map_err(write_failure)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User Not Found by Id {}", user_id)));
        }

        tx.commit().await.map_err(write_failure)?;
        tracing::info!(user_id = user_id, admin = admin, "User privileges updated");
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE constraint failed"))
}

/// Fallback when the colliding row could not be looked up
fn classify_insert_error(err: sqlx::Error, new_user: &NewUser) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        let message = db_err.message();
        if message.contains("users.email") {
            return DatabaseError::DuplicateEmail(new_user.email().to_string()).into();
        }
        if message.contains("users.username") {
            return DatabaseError::DuplicateUsername(new_user.username().to_string()).into();
        }
    }
    err.into()
}

/// Constraint violations keep their classification; anything else that
/// breaks a write is reported as a failed write.
fn write_failure(err: sqlx::Error) -> AppError {
    match AppError::from(err) {
        AppError::Database(
            DatabaseError::QueryExecution(msg) | DatabaseError::ConnectionPool(msg),
        ) => DatabaseError::WriteFailed(msg).into(),
        other => other,
    }
}
