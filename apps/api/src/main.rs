//! Restify API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod auth;
mod demo;
mod dev_seed;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use restify_application::ModelStore;
use restify_core::AppError;
use restify_infrastructure::{InMemoryModelStore, PostgresModelStore};
use tracing::info;

use crate::api_config::{ApiCommand, ApiConfig, StoreDriver, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;
    let address = config.socket_address()?;

    let router = match &config.store_driver {
        StoreDriver::Memory => {
            let store = InMemoryModelStore::new();
            dev_seed::run(&store).await?;

            let store: Arc<dyn ModelStore> = Arc::new(store);
            let app_state = api_services::build_app_state(store, &config, "memory")?;
            api_router::build_router(
                app_state,
                &config.route_prefix,
                &config.frontend_url,
                api_services::build_memory_session_layer(config.cookie_secure),
            )?
        }
        StoreDriver::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = api_services::connect_and_migrate(database_url, *max_connections).await?;
            let store = PostgresModelStore::new(pool.clone());

            match config.command {
                ApiCommand::Migrate => {
                    info!("database migrations applied successfully");
                    return Ok(());
                }
                ApiCommand::Seed => {
                    dev_seed::run(&store).await?;
                    return Ok(());
                }
                ApiCommand::Serve => {}
            }

            let store: Arc<dyn ModelStore> = Arc::new(store);
            let app_state = api_services::build_app_state(store, &config, "postgres")?;
            api_router::build_router(
                app_state,
                &config.route_prefix,
                &config.frontend_url,
                api_services::build_postgres_session_layer(pool, config.cookie_secure).await?,
            )?
        }
    };

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind API listener: {error}")))?;

    info!(%address, prefix = %config.route_prefix, "restify API listening");

    axum::serve(listener, router)
        .await
        .map_err(|error| AppError::Internal(format!("API server failed: {error}")))
}
