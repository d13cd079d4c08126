use config::ConfigError;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub auth: AuthSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

impl ApplicationSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    /// SQLite connection url, e.g. `sqlite://users.db` or `sqlite::memory:`
    pub url: String,
    pub max_connections: u32,
}

/// Token and credential settings
#[derive(serde::Deserialize, Clone)]
pub struct AuthSettings {
    pub secret: String,
    pub issuer: String,
    pub access_token_lifespan: i64,  // seconds
    pub refresh_token_lifespan: i64, // seconds
    pub min_refresh_interval: i64,   // seconds
    pub hash_cost: u32,
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

// Keeps the secret out of logs.
impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("issuer", &self.issuer)
            .field("access_token_lifespan", &self.access_token_lifespan)
            .field("refresh_token_lifespan", &self.refresh_token_lifespan)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .field("hash_cost", &self.hash_cost)
            .finish_non_exhaustive()
    }
}

/// First administrator, created at startup when absent
#[derive(serde::Deserialize, Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Reads `configuration.{yaml,toml,json}` from the working directory, then
/// applies `APP__SECTION__KEY` environment overrides.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8080)?
        .set_default("database.url", "sqlite://users.db")?
        .set_default("database.max_connections", 5)?
        .set_default("auth.issuer", "user_auth")?
        .set_default("auth.access_token_lifespan", 900)?
        .set_default("auth.refresh_token_lifespan", 2_592_000)?
        .set_default("auth.min_refresh_interval", 900)?
        .set_default("auth.hash_cost", bcrypt::DEFAULT_COST as i64)?
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
