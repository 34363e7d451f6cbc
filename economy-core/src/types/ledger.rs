//! Ledger entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Origin of a balance-changing operation.
///
/// A closed enum rather than a free string so the ledger's invariants
/// stay machine-checkable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardSource {
    GameReward,
    LootboxOpen,
    DailyGift,
    Invitation,
    Purchase,
    DailyRankReward,
}

impl RewardSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GameReward => "game_reward",
            Self::LootboxOpen => "lootbox_open",
            Self::DailyGift => "daily_gift",
            Self::Invitation => "invitation",
            Self::Purchase => "purchase",
            Self::DailyRankReward => "daily_rank_reward",
        }
    }
}

/// A balance-changing operation before it is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub user_id: UserId,
    pub delta_coins: i64,
    pub delta_lives: i64,
    pub source: RewardSource,
    pub idempotency_key: String,
    pub metadata: serde_json::Value,
}

/// Immutable, append-only record of one applied balance change.
///
/// `coins_after`/`lives_after` persist the balances as they stood
/// after this entry so a replay of the same idempotency key returns
/// the original result. At most one entry ever exists per key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub user_id: UserId,
    pub delta_coins: i64,
    pub delta_lives: i64,
    pub source: RewardSource,
    pub idempotency_key: String,
    pub metadata: serde_json::Value,
    pub coins_after: i64,
    pub lives_after: i64,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// True if `other` would re-apply a different effect under this
    /// entry's key. Used to surface `Conflict` instead of silently
    /// treating a divergent payload as a replay.
    pub fn diverges_from(&self, other: &NewLedgerEntry) -> bool {
        self.user_id != other.user_id
            || self.delta_coins != other.delta_coins
            || self.delta_lives != other.delta_lives
            || self.source != other.source
    }
}

/// Result of applying (or replaying) a credit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditOutcome {
    pub coins: i64,
    pub lives: i64,
    pub already_processed: bool,
}

/// Stable idempotency-key formats, one per source.
///
/// These formats are a contract with callers; changing them silently
/// breaks duplicate detection for already-issued keys.
pub mod keys {
    use super::UserId;
    use chrono::NaiveDate;
    use uuid::Uuid;

    pub fn game_reward(user: &UserId, source_id: &str) -> String {
        format!("game_reward:{}:{}", user, source_id)
    }

    pub fn lootbox_open(lootbox_id: &Uuid) -> String {
        format!("lootbox_open::{}", lootbox_id)
    }

    pub fn daily_rank_claim(user: &UserId, day: NaiveDate) -> String {
        format!("daily_rank_claim:{}:{}", user, day)
    }
}
