//! Wallet endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;

use crate::auth::CallerIdentity;
use crate::dto::{
    CreditRequest, CreditResponse, LedgerEntryResponse, LedgerQueryParams, WalletResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

/// Credit a gameplay reward, exactly once per (user, source_id).
pub async fn credit(
    State(state): State<AppState>,
    CallerIdentity(user): CallerIdentity,
    Json(req): Json<CreditRequest>,
) -> ApiResult<Json<CreditResponse>> {
    let now = Utc::now();
    state
        .limiter
        .allow(user.as_str(), "wallet_credit", state.config.rate_limit_per_minute, 60, now)
        .await?;

    let outcome = state
        .ledger
        .credit_game_reward(user, req.amount, &req.source_id, req.reason, now)
        .await?;
    Ok(Json(outcome.into()))
}

/// Current balances; lives regenerate opportunistically on read.
pub async fn get_wallet(
    State(state): State<AppState>,
    CallerIdentity(user): CallerIdentity,
) -> ApiResult<Json<WalletResponse>> {
    let wallet = state.ledger.balance(&user, Utc::now()).await?;
    Ok(Json(wallet.into()))
}

/// Recent ledger entries for the caller, newest first.
pub async fn get_ledger(
    State(state): State<AppState>,
    CallerIdentity(user): CallerIdentity,
    Query(params): Query<LedgerQueryParams>,
) -> ApiResult<Json<Vec<LedgerEntryResponse>>> {
    let entries = state.ledger.history(&user, params.limit.min(100)).await?;
    Ok(Json(
        entries.into_iter().map(LedgerEntryResponse::from).collect(),
    ))
}
