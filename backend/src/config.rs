use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Seconds a request waits for a pooled connection
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub rust_log: String,
    /// Empty means any origin
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")?;
        let max_connections: u32 = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()?;
        let acquire_timeout_secs: u64 = env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()?;
        let jwt_secret = env::var("JWT_SECRET")?;
        let port: u16 = env::var("PORT")?.parse()?;
        let host = env::var("HOST")?;
        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let cors_allowed_origins =
            parse_origins(&env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default());

        Ok(Config {
            database: DatabaseConfig {
                url: database_url,
                max_connections,
                acquire_timeout_secs,
            },
            auth: AuthConfig { jwt_secret },
            server: ServerConfig {
                port,
                host,
                rust_log,
                cors_allowed_origins,
            },
        })
    }
}

/// Comma-separated origin list; blank entries are dropped
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
