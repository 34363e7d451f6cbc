//! Request and response DTOs.
//!
//! Core types never cross the wire directly; each response shape is
//! owned here so storage details can change without breaking clients.

use chrono::{DateTime, NaiveDate, Utc};
use economy_core::rewards::{LootboxReward, LootboxTier};
use economy_core::types::{
    AwardStatus, CreditOutcome, DailyWinnerAward, HeartbeatOutcome, LeaderboardRow, LedgerEntry,
    LootboxDecision, LootboxInstance, LootboxSource, LootboxStatus, ProcessingSummary,
    RewardSource, UserId, WalletState,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============ Wallet ============

#[derive(Debug, Deserialize)]
pub struct CreditRequest {
    pub amount: i64,
    pub source_id: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreditResponse {
    pub new_coins: i64,
    pub new_lives: i64,
    pub already_processed: bool,
}

impl From<CreditOutcome> for CreditResponse {
    fn from(outcome: CreditOutcome) -> Self {
        Self {
            new_coins: outcome.coins,
            new_lives: outcome.lives,
            already_processed: outcome.already_processed,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WalletResponse {
    pub coins: i64,
    pub lives: i64,
    pub max_lives: i64,
    pub regeneration_interval_minutes: i64,
    pub last_regeneration_at: DateTime<Utc>,
}

impl From<WalletState> for WalletResponse {
    fn from(wallet: WalletState) -> Self {
        Self {
            coins: wallet.coins,
            lives: wallet.lives,
            max_lives: wallet.max_lives,
            regeneration_interval_minutes: wallet.regeneration_interval_minutes,
            last_regeneration_at: wallet.last_regeneration_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LedgerQueryParams {
    #[serde(default = "default_ledger_limit")]
    pub limit: usize,
}

fn default_ledger_limit() -> usize {
    20
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerEntryResponse {
    pub delta_coins: i64,
    pub delta_lives: i64,
    pub source: RewardSource,
    pub idempotency_key: String,
    pub coins_after: i64,
    pub lives_after: i64,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for LedgerEntryResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            delta_coins: entry.delta_coins,
            delta_lives: entry.delta_lives,
            source: entry.source,
            idempotency_key: entry.idempotency_key,
            coins_after: entry.coins_after,
            lives_after: entry.lives_after,
            created_at: entry.created_at,
        }
    }
}

// ============ Lootboxes ============

#[derive(Debug, Serialize, Deserialize)]
pub struct RewardResponse {
    pub tier: LootboxTier,
    pub gold: i64,
    pub lives: i64,
}

impl From<LootboxReward> for RewardResponse {
    fn from(reward: LootboxReward) -> Self {
        Self {
            tier: reward.tier,
            gold: reward.gold,
            lives: reward.lives,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LootboxResponse {
    pub id: Uuid,
    pub status: LootboxStatus,
    pub source: LootboxSource,
    pub expires_at: Option<DateTime<Utc>>,
    pub rewards: Option<RewardResponse>,
    pub created_at: DateTime<Utc>,
}

impl From<LootboxInstance> for LootboxResponse {
    fn from(lb: LootboxInstance) -> Self {
        Self {
            id: lb.id,
            status: lb.status,
            source: lb.source,
            expires_at: lb.expires_at,
            rewards: lb.rewards.map(RewardResponse::from),
            created_at: lb.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub has_active_drop: bool,
    pub drop_created: bool,
    pub lootbox: Option<LootboxResponse>,
    pub cooldown_active: bool,
    pub remaining_minutes: Option<i64>,
    pub needs_catchup: bool,
}

impl From<HeartbeatOutcome> for HeartbeatResponse {
    fn from(outcome: HeartbeatOutcome) -> Self {
        Self {
            has_active_drop: outcome.has_active_drop,
            drop_created: outcome.drop_created,
            lootbox: outcome.lootbox.map(LootboxResponse::from),
            cooldown_active: outcome.cooldown_active,
            remaining_minutes: outcome.remaining_minutes,
            needs_catchup: outcome.needs_catchup,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    pub decision: LootboxDecision,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenResponse {
    pub lootbox: LootboxResponse,
    pub new_coins: i64,
    pub new_lives: i64,
    pub already_processed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DecideResponse {
    Opened(OpenResponse),
    Stored { lootbox: LootboxResponse },
}

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub ordinal: u32,
    pub kind: economy_core::lootbox::ActivityKind,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActivityResponse {
    pub granted: bool,
    pub lootbox: Option<LootboxResponse>,
    pub capped: bool,
    pub cooldown_active: bool,
    pub already_granted: bool,
}

// ============ Ranking ============

#[derive(Debug, Serialize, Deserialize)]
pub struct AwardResponse {
    pub day_date: NaiveDate,
    pub scope: String,
    pub rank: u32,
    pub gold: i64,
    pub lives: i64,
    pub is_sunday_jackpot: bool,
    pub status: AwardStatus,
}

impl From<DailyWinnerAward> for AwardResponse {
    fn from(award: DailyWinnerAward) -> Self {
        Self {
            day_date: award.day_date,
            scope: award.scope,
            rank: award.rank,
            gold: award.gold_awarded,
            lives: award.lives_awarded,
            is_sunday_jackpot: award.is_sunday_jackpot,
            status: award.status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PendingAwardResponse {
    pub award: Option<AwardResponse>,
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub day_date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub gold_credited: i64,
    pub lives_credited: i64,
    pub rank: u32,
    pub new_coins: i64,
    pub new_lives: i64,
    pub already_processed: bool,
}

// ============ Internal ============

#[derive(Debug, Deserialize)]
pub struct ProcessWinnersRequest {
    pub target_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct BackfillRequest {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessingSummaryResponse {
    pub scopes_processed: u32,
    pub scopes_skipped: u32,
    pub scopes_failed: u32,
    pub awards_written: u32,
}

impl From<ProcessingSummary> for ProcessingSummaryResponse {
    fn from(summary: ProcessingSummary) -> Self {
        Self {
            scopes_processed: summary.scopes_processed,
            scopes_skipped: summary.scopes_skipped,
            scopes_failed: summary.scopes_failed,
            awards_written: summary.awards_written,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SnapshotRowRequest {
    pub rank: u32,
    pub user_id: String,
    pub score: i64,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotRequest {
    pub day: NaiveDate,
    pub scope: String,
    pub rows: Vec<SnapshotRowRequest>,
}

impl From<SnapshotRowRequest> for LeaderboardRow {
    fn from(row: SnapshotRowRequest) -> Self {
        Self {
            rank: row.rank,
            user_id: UserId::new(row.user_id),
            score: row.score,
        }
    }
}
