//! Internal endpoints: batch jobs and snapshot ingestion.
//!
//! All routes here require the shared secret in `X-Internal-Token`.

use axum::{extract::State, Json};
use chrono::Utc;
use economy_core::types::LeaderboardRow;

use crate::auth::InternalCaller;
use crate::dto::{
    BackfillRequest, ProcessWinnersRequest, ProcessingSummaryResponse, SnapshotRequest,
};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Run the daily winners job on demand (bypasses the local-time
/// window, not the per-scope processing log).
pub async fn process_daily_winners(
    State(state): State<AppState>,
    _caller: InternalCaller,
    Json(req): Json<ProcessWinnersRequest>,
) -> ApiResult<Json<ProcessingSummaryResponse>> {
    let summary = state
        .processor
        .process_daily_winners(Utc::now(), req.target_date, true)
        .await?;
    Ok(Json(summary.into()))
}

/// Backfill award rows for a historical date range.
pub async fn backfill_daily_winners(
    State(state): State<AppState>,
    _caller: InternalCaller,
    Json(req): Json<BackfillRequest>,
) -> ApiResult<Json<ProcessingSummaryResponse>> {
    let summary = state
        .processor
        .backfill_daily_winners(req.from, req.to)
        .await?;
    Ok(Json(summary.into()))
}

/// Life regeneration sweep over all wallets.
pub async fn regenerate_lives(
    State(state): State<AppState>,
    _caller: InternalCaller,
) -> ApiResult<Json<serde_json::Value>> {
    let touched = state.ledger.regenerate_sweep(Utc::now()).await?;
    Ok(Json(serde_json::json!({ "wallets_regenerated": touched })))
}

/// Ingest a precomputed leaderboard snapshot for (day, scope).
pub async fn put_leaderboard_snapshot(
    State(state): State<AppState>,
    _caller: InternalCaller,
    Json(req): Json<SnapshotRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if req.scope.trim().is_empty() {
        return Err(ApiError::Validation("scope must not be empty".to_string()));
    }
    if req.rows.is_empty() {
        return Err(ApiError::Validation("rows must not be empty".to_string()));
    }

    let rows: Vec<LeaderboardRow> = req.rows.into_iter().map(LeaderboardRow::from).collect();
    let count = rows.len();
    state
        .store
        .put_leaderboard_snapshot(req.day, &req.scope, rows)
        .await?;
    Ok(Json(serde_json::json!({ "ok": true, "rows": count })))
}
