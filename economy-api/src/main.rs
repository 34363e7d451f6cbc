//! Server binary.

use economy_api::{run_server, ApiConfig, AppState};
use economy_core::{EconomyStore, MemoryStore, SledStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("economy_api=info,economy_core=info")),
        )
        .init();

    let config = ApiConfig::from_env();

    let store: Arc<dyn EconomyStore> = match &config.data_dir {
        Some(path) => {
            tracing::info!("opening sled store at {}", path);
            Arc::new(SledStore::open(path)?)
        }
        None => {
            tracing::warn!("ECONOMY_DATA_DIR not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    if config.internal_token.is_none() {
        tracing::warn!("ECONOMY_INTERNAL_TOKEN not set, internal routes are disabled");
    }

    let state = AppState::new(store, config.clone());
    run_server(config, state).await
}
