//! API route handlers.

pub mod health;
pub mod internal;
pub mod lootbox;
pub mod ranking;
pub mod wallet;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        // Wallet endpoints
        .route("/api/v1/wallet", get(wallet::get_wallet))
        .route("/api/v1/wallet/credit", post(wallet::credit))
        .route("/api/v1/wallet/ledger", get(wallet::get_ledger))
        // Lootbox endpoints
        .route("/api/v1/lootboxes/heartbeat", post(lootbox::heartbeat))
        .route("/api/v1/lootboxes/activity", post(lootbox::activity_drop))
        .route("/api/v1/lootboxes/:id/decide", post(lootbox::decide))
        .route("/api/v1/lootboxes/:id/open", post(lootbox::open_stored))
        // Ranking reward endpoints
        .route("/api/v1/rank-rewards/pending", get(ranking::pending))
        .route("/api/v1/rank-rewards/claim", post(ranking::claim))
        .route("/api/v1/rank-rewards/dismiss", post(ranking::dismiss))
        // Internal endpoints
        .route(
            "/internal/v1/process-daily-winners",
            post(internal::process_daily_winners),
        )
        .route(
            "/internal/v1/backfill-daily-winners",
            post(internal::backfill_daily_winners),
        )
        .route(
            "/internal/v1/regenerate-lives",
            post(internal::regenerate_lives),
        )
        .route(
            "/internal/v1/leaderboard-snapshot",
            put(internal::put_leaderboard_snapshot),
        )
        // State
        .with_state(state)
}
