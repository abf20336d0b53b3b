use ::config::{Config, ConfigError, Environment};
use dotenv::dotenv;
use serde::Deserialize;

pub const DEFAULT_SECRET: &str = "change-me-to-a-long-random-secret";

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub app_secret: String,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
    pub db_pool_size: u32,
}

impl AppConfig {
    /// Reads `.env` if present, then the process environment, over defaults.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv().ok();
        Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8000)?
            .set_default("database_url", "data.db")?
            .set_default("app_secret", DEFAULT_SECRET)?
            .set_default("session_ttl_hours", 24 * 30)?
            .set_default("cookie_secure", false)?
            .set_default("db_pool_size", 8)?
            .add_source(Environment::default())
            .build()?
            .try_deserialize()
    }

    pub fn uses_default_secret(&self) -> bool {
        self.app_secret == DEFAULT_SECRET
    }
}

// Redacts the signing secret.
impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "host={} port={} database_url={} session_ttl_hours={} cookie_secure={} db_pool_size={}",
            self.host,
            self.port,
            self.database_url,
            self.session_ttl_hours,
            self.cookie_secure,
            self.db_pool_size
        )
    }
}
