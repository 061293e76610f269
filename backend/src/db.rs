use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::api_error::ApiError;
use crate::config::DatabaseConfig;

pub type DbPool = PgPool;

pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.url)
        .await?;
    info!(
        max_connections = config.max_connections,
        acquire_timeout_secs = config.acquire_timeout_secs,
        "Database pool ready"
    );
    Ok(pool)
}

/// Round trip used by `GET /api/health`
pub async fn health_check(pool: &DbPool) -> Result<(), ApiError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
