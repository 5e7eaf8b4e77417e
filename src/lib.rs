pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod query;
pub mod seed;
pub mod services;
pub mod store;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::api::{create_router, AppContext};
use crate::config::{AppConfig, Backend};
use crate::store::{MemoryStore, PostgresStore, Store};

pub use error::ApiError;

/// The full application router with its state attached.
pub fn build_app<S: Store + 'static>(context: AppContext<S>) -> Router {
    create_router::<S>(&context.settings).with_state(Arc::new(context))
}

/// Connect the configured backend and serve until the listener fails.
pub async fn run_server(config: &AppConfig) -> anyhow::Result<()> {
    match config.database.backend {
        Backend::Postgres => {
            let database_url = config.database_url()?;
            let store = PostgresStore::new(&database_url, config.database.max_connections.unwrap_or(20)).await?;

            log::info!("Running database migrations...");
            store.migrate().await?;
            serve(Arc::new(store), config).await
        }
        Backend::Memory => {
            log::warn!("Using the in-memory store; data is lost on exit");
            serve(Arc::new(MemoryStore::new()), config).await
        }
    }
}

async fn serve<S: Store + 'static>(store: Arc<S>, config: &AppConfig) -> anyhow::Result<()> {
    let app = build_app(AppContext::from_config(store, config)?);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("Bootcamp directory API running on http://{}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
