use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::net::TcpListener;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::{AccessGuard, AuthService, CredentialHasher, TokenCodec, ADMIN_ROLE};
use crate::configuration::{AuthSettings, BootstrapAdmin, DatabaseSettings};
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    create_user, disable, get_user, health_check, list_users, login, logout, ping, refresh,
    register, status,
};
use crate::users::UserRepository;
use crate::validators::NewUser;

/// Open the SQLite pool, creating the database file if needed.
///
/// Connections never idle out: for `sqlite::memory:` each connection is its
/// own database, so dropping one would drop the data with it. Writers queue
/// on the busy timeout rather than failing with "database is locked".
pub async fn get_connection_pool(config: &DatabaseSettings) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .idle_timeout(Option::<Duration>::None)
        .max_lifetime(Option::<Duration>::None)
        .connect_with(options)
        .await
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Make sure the configured administrator exists and holds the admin role.
/// Safe to run on every start.
pub async fn bootstrap_admin(users: &UserRepository, admin: &BootstrapAdmin) -> Result<(), AppError> {
    let new_user = NewUser::parse(&admin.username, &admin.email, &admin.password)?;

    let user = match users.find_by_email(new_user.email()).await? {
        Some(user) => user,
        None => users.create(&new_user).await?,
    };

    let mut roles = user.roles.clone();
    roles.insert(ADMIN_ROLE);
    users.set_privileges(user.id, &roles, true).await?;

    tracing::info!(user_id = user.id, email = %user.email, "Administrator account ready");
    Ok(())
}

pub fn run(
    listener: TcpListener,
    pool: SqlitePool,
    auth_config: AuthSettings,
) -> Result<Server, std::io::Error> {
    let users = UserRepository::new(pool, CredentialHasher::new(auth_config.hash_cost));
    let codec = TokenCodec::new(&auth_config);
    let guard = AccessGuard::new(codec.clone(), users.clone());
    let service = web::Data::new(AuthService::new(users, codec));

    let server = HttpServer::new(move || {
        // Malformed or incomplete JSON bodies are reported like any other bad input
        let json_config = web::JsonConfig::default().error_handler(|err, _req| {
            AppError::from(ValidationError::Payload(err.to_string())).into()
        });

        App::new()
            // Global middleware
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(service.clone())
            .app_data(json_config)

            // Public routes (no authentication required)
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::get().to(refresh))
                    // Protected routes (require a bearer access token)
                    .service(
                        web::resource("/logout")
                            .route(web::get().to(logout))
                            .wrap(JwtMiddleware::new(guard.clone().allow_inactive())),
                    )
                    .service(
                        web::resource("/status")
                            .route(web::get().to(status))
                            .wrap(JwtMiddleware::new(guard.clone())),
                    )
                    .service(
                        web::resource("/disable")
                            .route(web::patch().to(disable))
                            .wrap(JwtMiddleware::new(guard.clone().require_roles([ADMIN_ROLE]))),
                    ),
            )
            .service(
                web::scope("/users")
                    .route("/ping", web::get().to(ping))
                    .service(
                        web::resource(vec!["", "/"])
                            .route(web::get().to(list_users))
                            .route(web::post().to(create_user))
                            .wrap(JwtMiddleware::new(guard.clone())),
                    )
                    .service(
                        web::resource("/{user_id}")
                            .route(web::get().to(get_user))
                            .wrap(JwtMiddleware::new(guard.clone())),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::RoleSet;

    async fn repository() -> UserRepository {
        let pool = get_connection_pool(&DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
        .expect("Failed to open in-memory database");
        migrate(&pool).await.expect("Failed to migrate the database");
        UserRepository::new(pool, CredentialHasher::new(4 /* bcrypt minimum cost */))
    }

    fn admin() -> BootstrapAdmin {
        BootstrapAdmin {
            username: "admin".to_string(),
            email: "admin@test.com".to_string(),
            password: "admin".to_string(),
        }
    }

    #[tokio::test]
    async fn bootstrap_admin_creates_admin() {
        let users = repository().await;
        bootstrap_admin(&users, &admin()).await.unwrap();

        let user = users.find_by_email("admin@test.com").await.unwrap().unwrap();
        assert!(user.admin);
        assert!(user.roles.contains(ADMIN_ROLE));
        assert!(users.hasher().verify("admin", &user.password_hash).await);
    }

    #[tokio::test]
    async fn bootstrap_admin_is_idempotent_and_promotes_existing_user() {
        let users = repository().await;
        let existing = users
            .create(&NewUser::parse("admin", "admin@test.com", "original").unwrap())
            .await
            .unwrap();
        users
            .set_privileges(existing.id, &RoleSet::new(["editor"]), false)
            .await
            .unwrap();

        bootstrap_admin(&users, &admin()).await.unwrap();
        bootstrap_admin(&users, &admin()).await.unwrap();

        let all = users.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].admin);
        assert_eq!(all[0].roles, RoleSet::new(["editor", ADMIN_ROLE]));
        // Existing credentials are left alone
        assert!(users.hasher().verify("original", &all[0].password_hash).await);
    }
}
