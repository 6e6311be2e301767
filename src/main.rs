//! charity-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use charity_gateway::api;
use charity_gateway::app_state::AppState;
use charity_gateway::config::{AppConfig, LogFormat, StoreBackend};
use charity_gateway::domain::EventBus;
use charity_gateway::persistence::{MemoryStore, PostgresStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    tracing::info!(addr = %config.listen_addr, backend = ?config.store_backend, "starting charity-gateway");

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Postgres => {
            let store = PostgresStore::connect(&config)
                .await
                .context("connecting to PostgreSQL")?;
            if config.run_migrations {
                store.migrate().await.context("running migrations")?;
                tracing::info!("migrations applied");
            }
            Arc::new(store)
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let event_bus = EventBus::new(config.event_bus_capacity);
    let state = AppState::new(store, config.rules_cache_ttl, event_bus);
    let app = api::build_app(state, config.request_timeout);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
