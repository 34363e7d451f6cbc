//! Health and readiness endpoints.

use axum::{extract::State, Json};

use crate::error::ApiResult;
use crate::state::AppState;

/// Liveness check.
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": state.version,
    }))
}

/// Readiness check: the store must answer.
pub async fn ready_check(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let stats = state.store.get_stats().await?;
    Ok(Json(serde_json::json!({
        "status": "ready",
        "wallets": stats.total_wallets,
        "ledger_entries": stats.total_ledger_entries,
        "lootboxes": stats.total_lootboxes,
        "active_drops": stats.active_drops,
        "pending_awards": stats.pending_awards,
    })))
}
