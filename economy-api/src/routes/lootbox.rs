//! Lootbox endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use economy_core::lootbox::DecideOutcome;
use rand::rngs::StdRng;
use rand::SeedableRng;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::dto::{
    ActivityRequest, ActivityResponse, DecideRequest, DecideResponse, HeartbeatResponse,
    LootboxResponse, OpenResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

/// Heartbeat tick: delivers a scheduled drop when one is due.
pub async fn heartbeat(
    State(state): State<AppState>,
    CallerIdentity(user): CallerIdentity,
) -> ApiResult<Json<HeartbeatResponse>> {
    let now = Utc::now();
    state
        .limiter
        .allow(user.as_str(), "heartbeat", state.config.rate_limit_per_minute, 60, now)
        .await?;

    let outcome = state.scheduler.heartbeat(&user, now).await?;
    Ok(Json(outcome.into()))
}

/// Activity-triggered drop attempt.
pub async fn activity_drop(
    State(state): State<AppState>,
    CallerIdentity(user): CallerIdentity,
    Json(req): Json<ActivityRequest>,
) -> ApiResult<Json<ActivityResponse>> {
    let now = Utc::now();
    state
        .limiter
        .allow(user.as_str(), "activity_drop", state.config.rate_limit_per_minute, 60, now)
        .await?;

    let mut rng = StdRng::from_entropy();
    let outcome = state
        .scheduler
        .activity_drop(&user, req.ordinal, req.kind, now, &mut rng)
        .await?;
    Ok(Json(ActivityResponse {
        granted: outcome.granted,
        lootbox: outcome.lootbox.map(LootboxResponse::from),
        capped: outcome.capped,
        cooldown_active: outcome.cooldown_active,
        already_granted: outcome.already_granted,
    }))
}

/// Resolve an active drop: open it now or store it.
pub async fn decide(
    State(state): State<AppState>,
    CallerIdentity(user): CallerIdentity,
    Path(id): Path<Uuid>,
    Json(req): Json<DecideRequest>,
) -> ApiResult<Json<DecideResponse>> {
    let now = Utc::now();
    state
        .limiter
        .allow(user.as_str(), "lootbox_decide", state.config.rate_limit_per_minute, 60, now)
        .await?;

    let mut rng = StdRng::from_entropy();
    let outcome = state
        .lifecycle
        .decide(&user, &id, req.decision, now, &mut rng)
        .await?;

    Ok(Json(match outcome {
        DecideOutcome::Stored(lootbox) => DecideResponse::Stored {
            lootbox: lootbox.into(),
        },
        DecideOutcome::Opened(opened) => DecideResponse::Opened(OpenResponse {
            lootbox: opened.lootbox.into(),
            new_coins: opened.credit.coins,
            new_lives: opened.credit.lives,
            already_processed: opened.credit.already_processed,
        }),
    }))
}

/// Open a previously stored lootbox.
pub async fn open_stored(
    State(state): State<AppState>,
    CallerIdentity(user): CallerIdentity,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OpenResponse>> {
    let now = Utc::now();
    state
        .limiter
        .allow(user.as_str(), "lootbox_open", state.config.rate_limit_per_minute, 60, now)
        .await?;

    let mut rng = StdRng::from_entropy();
    let opened = state.lifecycle.open_stored(&user, &id, now, &mut rng).await?;
    Ok(Json(OpenResponse {
        lootbox: opened.lootbox.into(),
        new_coins: opened.credit.coins,
        new_lives: opened.credit.lives,
        already_processed: opened.credit.already_processed,
    }))
}
