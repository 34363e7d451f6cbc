//! Integration tests for the economy API endpoints.

use axum_test::TestServer;
use economy_api::{create_router, ApiConfig, AppState};
use economy_core::MemoryStore;
use serde_json::json;
use std::sync::Arc;

const INTERNAL_TOKEN: &str = "test-internal-token";

fn test_config() -> ApiConfig {
    ApiConfig {
        internal_token: Some(INTERNAL_TOKEN.to_string()),
        ..ApiConfig::default()
    }
}

fn create_test_server_with(config: ApiConfig) -> TestServer {
    let state = AppState::new(Arc::new(MemoryStore::new()), config);
    TestServer::new(create_router(state)).unwrap()
}

fn create_test_server() -> TestServer {
    create_test_server_with(test_config())
}

// ============ Health Endpoint Tests ============

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_ready_check() {
    let server = create_test_server();

    let response = server.get("/ready").await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["wallets"], 0);
}

// ============ Wallet Endpoint Tests ============

#[tokio::test]
async fn test_credit_requires_identity() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/wallet/credit")
        .json(&json!({ "amount": 100, "source_id": "s1" }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_credit_is_idempotent_per_source() {
    let server = create_test_server();

    let first = server
        .post("/api/v1/wallet/credit")
        .add_header("X-User-Id", "u1")
        .json(&json!({ "amount": 100, "source_id": "quiz-42" }))
        .await;
    first.assert_status_ok();
    let body: serde_json::Value = first.json();
    assert_eq!(body["new_coins"], 100);
    assert_eq!(body["already_processed"], false);

    let replay = server
        .post("/api/v1/wallet/credit")
        .add_header("X-User-Id", "u1")
        .json(&json!({ "amount": 100, "source_id": "quiz-42" }))
        .await;
    replay.assert_status_ok();
    let body: serde_json::Value = replay.json();
    assert_eq!(body["new_coins"], 100);
    assert_eq!(body["already_processed"], true);

    // Same source_id with a different amount is a conflict.
    let conflict = server
        .post("/api/v1/wallet/credit")
        .add_header("X-User-Id", "u1")
        .json(&json!({ "amount": 200, "source_id": "quiz-42" }))
        .await;
    conflict.assert_status(axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_credit_amount_out_of_bounds() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/wallet/credit")
        .add_header("X-User-Id", "u1")
        .json(&json!({ "amount": 5000, "source_id": "s1" }))
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_get_wallet_creates_on_first_read() {
    let server = create_test_server();

    let response = server
        .get("/api/v1/wallet")
        .add_header("X-User-Id", "u1")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["coins"], 0);
    assert_eq!(body["lives"], body["max_lives"]);
}

#[tokio::test]
async fn test_ledger_history_newest_first() {
    let server = create_test_server();

    for (i, amount) in [100, 200].iter().enumerate() {
        server
            .post("/api/v1/wallet/credit")
            .add_header("X-User-Id", "u1")
            .json(&json!({ "amount": amount, "source_id": format!("s{}", i) }))
            .await
            .assert_status_ok();
    }

    let response = server
        .get("/api/v1/wallet/ledger")
        .add_header("X-User-Id", "u1")
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["delta_coins"], 200);
    assert_eq!(entries[0]["coins_after"], 300);
    assert_eq!(entries[1]["delta_coins"], 100);
}

// ============ Lootbox Endpoint Tests ============

#[tokio::test]
async fn test_heartbeat_returns_outcome_shape() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/lootboxes/heartbeat")
        .add_header("X-User-Id", "u1")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["has_active_drop"].is_boolean());
    assert!(body["drop_created"].is_boolean());
    assert!(body["needs_catchup"].is_boolean());
}

#[tokio::test]
async fn test_login_drop_store_then_open() {
    let server = create_test_server();

    // First login of the day: guaranteed drop.
    let drop = server
        .post("/api/v1/lootboxes/activity")
        .add_header("X-User-Id", "u1")
        .json(&json!({ "ordinal": 1, "kind": "login" }))
        .await;
    drop.assert_status_ok();
    let body: serde_json::Value = drop.json();
    assert_eq!(body["granted"], true);
    let id = body["lootbox"]["id"].as_str().unwrap().to_string();

    let stored = server
        .post(&format!("/api/v1/lootboxes/{}/decide", id))
        .add_header("X-User-Id", "u1")
        .json(&json!({ "decision": "store" }))
        .await;
    stored.assert_status_ok();
    let body: serde_json::Value = stored.json();
    assert_eq!(body["lootbox"]["status"], "stored");

    let opened = server
        .post(&format!("/api/v1/lootboxes/{}/open", id))
        .add_header("X-User-Id", "u1")
        .await;
    opened.assert_status_ok();
    let body: serde_json::Value = opened.json();
    assert_eq!(body["already_processed"], false);
    let coins = body["new_coins"].as_i64().unwrap();
    assert!(coins >= 75);

    // Re-open: original outcome, no second roll.
    let replay = server
        .post(&format!("/api/v1/lootboxes/{}/open", id))
        .add_header("X-User-Id", "u1")
        .await;
    replay.assert_status_ok();
    let body: serde_json::Value = replay.json();
    assert_eq!(body["already_processed"], true);
    assert_eq!(body["new_coins"].as_i64().unwrap(), coins);
}

#[tokio::test]
async fn test_decide_open_now_credits_wallet() {
    let server = create_test_server();

    let drop = server
        .post("/api/v1/lootboxes/activity")
        .add_header("X-User-Id", "u1")
        .json(&json!({ "ordinal": 1, "kind": "login" }))
        .await;
    let body: serde_json::Value = drop.json();
    let id = body["lootbox"]["id"].as_str().unwrap().to_string();

    let opened = server
        .post(&format!("/api/v1/lootboxes/{}/decide", id))
        .add_header("X-User-Id", "u1")
        .json(&json!({ "decision": "open_now" }))
        .await;
    opened.assert_status_ok();
    let body: serde_json::Value = opened.json();
    assert_eq!(body["lootbox"]["status"], "opened");
    let coins = body["new_coins"].as_i64().unwrap();

    let wallet = server
        .get("/api/v1/wallet")
        .add_header("X-User-Id", "u1")
        .await;
    let body: serde_json::Value = wallet.json();
    assert_eq!(body["coins"].as_i64().unwrap(), coins);

    // A second decide on the opened box is not found.
    let again = server
        .post(&format!("/api/v1/lootboxes/{}/decide", id))
        .add_header("X-User-Id", "u1")
        .json(&json!({ "decision": "store" }))
        .await;
    again.assert_status_not_found();
}

#[tokio::test]
async fn test_foreign_lootbox_not_found() {
    let server = create_test_server();

    let drop = server
        .post("/api/v1/lootboxes/activity")
        .add_header("X-User-Id", "owner")
        .json(&json!({ "ordinal": 1, "kind": "login" }))
        .await;
    let body: serde_json::Value = drop.json();
    let id = body["lootbox"]["id"].as_str().unwrap().to_string();

    let response = server
        .post(&format!("/api/v1/lootboxes/{}/decide", id))
        .add_header("X-User-Id", "intruder")
        .json(&json!({ "decision": "open_now" }))
        .await;
    response.assert_status_not_found();
}

// ============ Ranking Endpoint Tests ============

async fn ingest_and_process(server: &TestServer, day: &str, scope: &str) {
    let ingest = server
        .put("/internal/v1/leaderboard-snapshot")
        .add_header("X-Internal-Token", INTERNAL_TOKEN)
        .json(&json!({
            "day": day,
            "scope": scope,
            "rows": [
                { "rank": 1, "user_id": "winner", "score": 990 },
                { "rank": 2, "user_id": "second", "score": 800 },
            ],
        }))
        .await;
    ingest.assert_status_ok();

    let process = server
        .post("/internal/v1/process-daily-winners")
        .add_header("X-Internal-Token", INTERNAL_TOKEN)
        .json(&json!({ "target_date": day }))
        .await;
    process.assert_status_ok();
}

#[tokio::test]
async fn test_rank_reward_claim_flow() {
    let server = create_test_server();
    // 2026-03-02 is a Monday: top-10 window, no jackpot.
    ingest_and_process(&server, "2026-03-02", "UTC").await;

    let pending = server
        .get("/api/v1/rank-rewards/pending")
        .add_header("X-User-Id", "winner")
        .await;
    pending.assert_status_ok();
    let body: serde_json::Value = pending.json();
    assert_eq!(body["award"]["rank"], 1);
    assert_eq!(body["award"]["gold"], 500);
    assert_eq!(body["award"]["is_sunday_jackpot"], false);

    let claim = server
        .post("/api/v1/rank-rewards/claim")
        .add_header("X-User-Id", "winner")
        .json(&json!({ "day_date": "2026-03-02" }))
        .await;
    claim.assert_status_ok();
    let body: serde_json::Value = claim.json();
    assert_eq!(body["gold_credited"], 500);
    assert_eq!(body["lives_credited"], 5);
    assert_eq!(body["new_coins"], 500);

    // Claiming again: the award is no longer pending.
    let again = server
        .post("/api/v1/rank-rewards/claim")
        .add_header("X-User-Id", "winner")
        .json(&json!({ "day_date": "2026-03-02" }))
        .await;
    again.assert_status_not_found();
}

#[tokio::test]
async fn test_rank_reward_dismiss_is_final() {
    let server = create_test_server();
    ingest_and_process(&server, "2026-03-02", "UTC").await;

    let dismiss = server
        .post("/api/v1/rank-rewards/dismiss")
        .add_header("X-User-Id", "second")
        .json(&json!({ "day_date": "2026-03-02" }))
        .await;
    dismiss.assert_status_ok();

    let claim = server
        .post("/api/v1/rank-rewards/claim")
        .add_header("X-User-Id", "second")
        .json(&json!({ "day_date": "2026-03-02" }))
        .await;
    claim.assert_status_not_found();

    let wallet = server
        .get("/api/v1/wallet")
        .add_header("X-User-Id", "second")
        .await;
    let body: serde_json::Value = wallet.json();
    assert_eq!(body["coins"], 0);
}

#[tokio::test]
async fn test_sunday_snapshot_yields_jackpot() {
    let server = create_test_server();
    // 2026-03-01 is a Sunday.
    ingest_and_process(&server, "2026-03-01", "UTC").await;

    let pending = server
        .get("/api/v1/rank-rewards/pending")
        .add_header("X-User-Id", "winner")
        .await;
    let body: serde_json::Value = pending.json();
    assert_eq!(body["award"]["is_sunday_jackpot"], true);
    assert_eq!(body["award"]["gold"], 1000);
}

// ============ Internal Endpoint Tests ============

#[tokio::test]
async fn test_internal_routes_require_token() {
    let server = create_test_server();

    let missing = server
        .post("/internal/v1/process-daily-winners")
        .json(&json!({}))
        .await;
    missing.assert_status_unauthorized();

    let wrong = server
        .post("/internal/v1/process-daily-winners")
        .add_header("X-Internal-Token", "nope")
        .json(&json!({}))
        .await;
    wrong.assert_status_unauthorized();
}

#[tokio::test]
async fn test_internal_routes_disabled_without_configured_token() {
    let server = create_test_server_with(ApiConfig::default());

    let response = server
        .post("/internal/v1/regenerate-lives")
        .add_header("X-Internal-Token", "anything")
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_process_rerun_writes_nothing() {
    let server = create_test_server();
    ingest_and_process(&server, "2026-03-02", "UTC").await;

    let rerun = server
        .post("/internal/v1/process-daily-winners")
        .add_header("X-Internal-Token", INTERNAL_TOKEN)
        .json(&json!({ "target_date": "2026-03-02" }))
        .await;
    rerun.assert_status_ok();
    let body: serde_json::Value = rerun.json();
    assert_eq!(body["awards_written"], 0);
    assert_eq!(body["scopes_skipped"], 1);
}

#[tokio::test]
async fn test_regenerate_lives_sweep() {
    let server = create_test_server();

    // Touch a wallet so the sweep has something to look at.
    server
        .get("/api/v1/wallet")
        .add_header("X-User-Id", "u1")
        .await
        .assert_status_ok();

    let response = server
        .post("/internal/v1/regenerate-lives")
        .add_header("X-Internal-Token", INTERNAL_TOKEN)
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    // Fresh wallet is at max lives already.
    assert_eq!(body["wallets_regenerated"], 0);
}

#[tokio::test]
async fn test_snapshot_rejects_empty_rows() {
    let server = create_test_server();

    let response = server
        .put("/internal/v1/leaderboard-snapshot")
        .add_header("X-Internal-Token", INTERNAL_TOKEN)
        .json(&json!({ "day": "2026-03-02", "scope": "UTC", "rows": [] }))
        .await;
    response.assert_status_bad_request();
}

// ============ Rate Limit Tests ============

#[tokio::test]
async fn test_mutating_route_rate_limited() {
    let config = ApiConfig {
        rate_limit_per_minute: 2,
        ..test_config()
    };
    let server = create_test_server_with(config);

    for i in 0..2 {
        server
            .post("/api/v1/wallet/credit")
            .add_header("X-User-Id", "u1")
            .json(&json!({ "amount": 10, "source_id": format!("s{}", i) }))
            .await
            .assert_status_ok();
    }

    let limited = server
        .post("/api/v1/wallet/credit")
        .add_header("X-User-Id", "u1")
        .json(&json!({ "amount": 10, "source_id": "s3" }))
        .await;
    limited.assert_status(axum::http::StatusCode::TOO_MANY_REQUESTS);
    let body: serde_json::Value = limited.json();
    assert_eq!(body["code"], "RATE_LIMITED");
    assert!(body["retry_after_secs"].as_u64().unwrap() <= 60);
}
