use std::net::TcpListener;
use user_auth::auth::CredentialHasher;
use user_auth::configuration::get_configuration;
use user_auth::startup::{bootstrap_admin, get_connection_pool, migrate, run};
use user_auth::telemetry::init_telemetry;
use user_auth::users::UserRepository;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!(auth = ?config.auth, "Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let pool = get_connection_pool(&configuration.database)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    migrate(&pool).await.map_err(|e| {
        tracing::error!("Failed to migrate the database: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Database migration error")
    })?;
    tracing::info!("Database ready");

    if let Some(admin) = &configuration.auth.bootstrap_admin {
        let users = UserRepository::new(
            pool.clone(),
            CredentialHasher::new(configuration.auth.hash_cost),
        );
        bootstrap_admin(&users, admin).await.map_err(|e| {
            tracing::error!("Failed to bootstrap administrator: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Administrator bootstrap error")
        })?;
    }

    let address = configuration.application.address();
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, pool, configuration.auth)?;
    server.await
}
