use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tokio::signal;

mod api_error;
mod auth;
mod config;
mod db;
mod http;
mod middleware;
mod models;
mod service;
mod store;
mod telemetry;

use crate::auth::JwtConfig;
use crate::config::Config;
use crate::db::create_pool;
use crate::http::AppState;
use crate::middleware::cors_middleware;
use crate::store::{MatchStore, PgMatchStore};
use crate::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    init_telemetry(&config.server.rust_log);

    let db_pool = create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;
    let store: Arc<dyn MatchStore> = Arc::new(PgMatchStore::new(db_pool));
    let state = web::Data::new(AppState::new(store));
    let jwt_config = JwtConfig::new(config.auth.jwt_secret.clone());
    let cors_origins = config.server.cors_allowed_origins.clone();

    tracing::info!(
        "Starting match backend server on {}:{}",
        config.server.host,
        config.server.port
    );

    let server = HttpServer::new(move || {
        let jwt_config = jwt_config.clone();
        App::new()
            .app_data(state.clone())
            .wrap(cors_middleware(&cors_origins))
            .wrap(actix_web::middleware::Logger::default())
            .configure(move |cfg| http::configure_routes(cfg, &jwt_config))
    })
    .bind((config.server.host.clone(), config.server.port))?
    .run();

    // Graceful shutdown
    let server_handle = server.handle();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received, stopping server...");
        server_handle.stop(true).await;
    });

    server.await?;
    Ok(())
}
