//! Ranking reward endpoints.

use axum::{extract::State, Json};
use chrono::Utc;

use crate::auth::CallerIdentity;
use crate::dto::{AwardResponse, ClaimRequest, ClaimResponse, PendingAwardResponse};
use crate::error::ApiResult;
use crate::state::AppState;

/// The caller's most recent pending award, if any.
pub async fn pending(
    State(state): State<AppState>,
    CallerIdentity(user): CallerIdentity,
) -> ApiResult<Json<PendingAwardResponse>> {
    let award = state.claims.pending(&user).await?;
    Ok(Json(PendingAwardResponse {
        award: award.map(AwardResponse::from),
    }))
}

/// Claim the pending award for a day.
pub async fn claim(
    State(state): State<AppState>,
    CallerIdentity(user): CallerIdentity,
    Json(req): Json<ClaimRequest>,
) -> ApiResult<Json<ClaimResponse>> {
    let now = Utc::now();
    state
        .limiter
        .allow(user.as_str(), "rank_claim", state.config.rate_limit_per_minute, 60, now)
        .await?;

    let (award, credit) = state.claims.claim(&user, req.day_date, now).await?;
    Ok(Json(ClaimResponse {
        gold_credited: award.gold_awarded,
        lives_credited: award.lives_awarded,
        rank: award.rank,
        new_coins: credit.coins,
        new_lives: credit.lives,
        already_processed: credit.already_processed,
    }))
}

/// Dismiss the pending award for a day. Final, no credit.
pub async fn dismiss(
    State(state): State<AppState>,
    CallerIdentity(user): CallerIdentity,
    Json(req): Json<ClaimRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let now = Utc::now();
    state
        .limiter
        .allow(user.as_str(), "rank_dismiss", state.config.rate_limit_per_minute, 60, now)
        .await?;

    state.claims.dismiss(&user, req.day_date, now).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
