//! Application state for the API server.

use economy_core::{
    EconomyStore, LootboxLifecycle, LootboxScheduler, RankingClaims, RankingProcessor,
    RateLimiter, WalletLedger,
};
use std::sync::Arc;

/// API server state: the core services over one shared store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EconomyStore>,
    pub ledger: Arc<WalletLedger>,
    pub scheduler: Arc<LootboxScheduler>,
    pub lifecycle: Arc<LootboxLifecycle>,
    pub processor: Arc<RankingProcessor>,
    pub claims: Arc<RankingClaims>,
    pub limiter: Arc<RateLimiter>,
    pub config: Arc<ApiConfig>,
    pub version: String,
}

impl AppState {
    pub fn new(store: Arc<dyn EconomyStore>, config: ApiConfig) -> Self {
        Self {
            ledger: Arc::new(WalletLedger::new(store.clone())),
            scheduler: Arc::new(LootboxScheduler::new(store.clone())),
            lifecycle: Arc::new(LootboxLifecycle::new(store.clone())),
            processor: Arc::new(RankingProcessor::new(store.clone())),
            claims: Arc::new(RankingClaims::new(store.clone())),
            limiter: Arc::new(RateLimiter::new(store.clone())),
            store,
            config: Arc::new(config),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    /// Shared secret for `/internal/v1/*`; internal routes are
    /// refused outright when unset.
    pub internal_token: Option<String>,
    /// Sled data directory; in-memory store when unset.
    pub data_dir: Option<String>,
    /// Mutating-route budget per caller per minute.
    pub rate_limit_per_minute: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            enable_cors: true,
            internal_token: None,
            data_dir: None,
            rate_limit_per_minute: 60,
        }
    }
}

impl ApiConfig {
    /// Create from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("ECONOMY_HOST").unwrap_or(defaults.host),
            port: std::env::var("ECONOMY_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            enable_cors: std::env::var("ECONOMY_ENABLE_CORS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.enable_cors),
            internal_token: std::env::var("ECONOMY_INTERNAL_TOKEN").ok(),
            data_dir: std::env::var("ECONOMY_DATA_DIR").ok(),
            rate_limit_per_minute: std::env::var("ECONOMY_RATE_LIMIT_PER_MINUTE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.rate_limit_per_minute),
        }
    }
}
