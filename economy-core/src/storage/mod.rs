//! Storage layer for the economy core.
//!
//! The trait below is the concurrency contract of the whole system:
//! every method that changes more than one record (`apply_credit`,
//! `open_lootbox_and_credit`, `deliver_slot`, `claim_award_and_credit`,
//! `insert_awards`) is one atomic unit inside the store. Services
//! never compose a balance or status change out of separate
//! read-then-write calls.

pub mod memory;
pub mod sled;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::EconomyResult;
use crate::rewards::LootboxReward;
use crate::types::{
    ActivityGrant, CreditOutcome, DailyPlan, DailyWinnerAward, LeaderboardRow, LedgerEntry,
    LootboxInstance, LootboxStatus, NewLedgerEntry, UserId, WalletState,
};

/// Result of the atomic lootbox open.
#[derive(Debug, Clone)]
pub struct OpenedLootbox {
    pub lootbox: LootboxInstance,
    pub credit: CreditOutcome,
}

/// Persistent store for the economy core.
#[async_trait]
pub trait EconomyStore: Send + Sync {
    // ==================== Wallet / ledger ====================

    /// Get a user's wallet, if one exists.
    async fn get_wallet(&self, user: &UserId) -> EconomyResult<Option<WalletState>>;

    /// Create or replace a wallet. Used for wallet creation and for
    /// the deterministic regeneration step (last-write-wins on the
    /// same monotonic computation).
    async fn put_wallet(&self, wallet: &WalletState) -> EconomyResult<()>;

    /// All wallets, for the background regeneration sweep.
    async fn list_wallets(&self) -> EconomyResult<Vec<WalletState>>;

    /// The atomic apply step: insert the ledger entry if its
    /// idempotency key is absent and apply the deltas to the wallet,
    /// creating the wallet on first touch.
    ///
    /// If an entry with the key already exists, no mutation happens
    /// and the stored after-balances come back with
    /// `already_processed = true`. A divergent payload under an
    /// existing key is a `Conflict` error. Concurrent callers with
    /// the same key are serialized; exactly one insert wins.
    async fn apply_credit(
        &self,
        entry: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> EconomyResult<CreditOutcome>;

    /// Look up a ledger entry by idempotency key.
    async fn get_ledger_entry(&self, key: &str) -> EconomyResult<Option<LedgerEntry>>;

    /// Most recent ledger entries for a user, newest first.
    async fn list_ledger_entries(
        &self,
        user: &UserId,
        limit: usize,
    ) -> EconomyResult<Vec<LedgerEntry>>;

    // ==================== Lootboxes ====================

    /// Insert a new lootbox instance.
    async fn insert_lootbox(&self, lootbox: &LootboxInstance) -> EconomyResult<()>;

    /// Get a lootbox by id.
    async fn get_lootbox(&self, id: &Uuid) -> EconomyResult<Option<LootboxInstance>>;

    /// The user's unexpired `active_drop`, if any.
    async fn active_drop(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> EconomyResult<Option<LootboxInstance>>;

    /// Creation time of the user's most recent lootbox of any status.
    async fn latest_lootbox_created_at(
        &self,
        user: &UserId,
    ) -> EconomyResult<Option<DateTime<Utc>>>;

    /// Number of lootboxes created for the user on a calendar day.
    async fn count_lootboxes_on_day(&self, user: &UserId, day: NaiveDate) -> EconomyResult<u32>;

    /// CAS `active_drop` -> `stored`, clearing `expires_at`. Returns
    /// the updated instance, or `None` on any owner/status mismatch.
    async fn mark_lootbox_stored(
        &self,
        id: &Uuid,
        user: &UserId,
    ) -> EconomyResult<Option<LootboxInstance>>;

    /// CAS `active_drop` -> `expired`. Returns the updated instance,
    /// or `None` on any owner/status mismatch.
    async fn expire_lootbox(
        &self,
        id: &Uuid,
        user: &UserId,
    ) -> EconomyResult<Option<LootboxInstance>>;

    /// The atomic open: verify the current status is one of
    /// `allowed`, write the rewards, flip to `opened` and apply the
    /// ledger credit, all in one unit.
    ///
    /// If the box is already `opened` and a ledger entry exists under
    /// `entry.idempotency_key`, the original rewards and balances are
    /// returned with `already_processed = true`. Owner mismatch or a
    /// disallowed status yields `None`.
    async fn open_lootbox_and_credit(
        &self,
        id: &Uuid,
        user: &UserId,
        allowed: &[LootboxStatus],
        rewards: LootboxReward,
        entry: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> EconomyResult<Option<OpenedLootbox>>;

    // ==================== Daily plans / activity grants ====================

    /// Insert the plan if none exists for (user, day); otherwise
    /// return the existing plan unchanged.
    async fn get_or_insert_daily_plan(&self, plan: DailyPlan) -> EconomyResult<DailyPlan>;

    /// Atomically mark the slot delivered, bump `delivered_count` and
    /// insert the drop. Returns `None` if the slot is not pending
    /// (a concurrent heartbeat won).
    async fn deliver_slot(
        &self,
        user: &UserId,
        day: NaiveDate,
        slot_id: u32,
        lootbox: LootboxInstance,
    ) -> EconomyResult<Option<DailyPlan>>;

    /// Insert-if-absent on (user, day, ordinal). Returns `true` if
    /// this call inserted the grant.
    async fn insert_activity_grant(&self, grant: &ActivityGrant) -> EconomyResult<bool>;

    // ==================== Ranking ====================

    /// Store the precomputed leaderboard snapshot for (day, scope).
    async fn put_leaderboard_snapshot(
        &self,
        day: NaiveDate,
        scope: &str,
        rows: Vec<LeaderboardRow>,
    ) -> EconomyResult<()>;

    /// Snapshot rows for (day, scope), ascending by rank.
    async fn get_leaderboard_snapshot(
        &self,
        day: NaiveDate,
        scope: &str,
    ) -> EconomyResult<Vec<LeaderboardRow>>;

    /// Distinct scopes with at least one snapshot.
    async fn list_snapshot_scopes(&self) -> EconomyResult<Vec<String>>;

    /// Days with a snapshot for the scope, ascending.
    async fn list_snapshot_days(&self, scope: &str) -> EconomyResult<Vec<NaiveDate>>;

    /// Whether any award rows exist for (day, scope).
    async fn has_awards_for(&self, day: NaiveDate, scope: &str) -> EconomyResult<bool>;

    /// Existence-guarded batch insert: writes the award rows only if
    /// none exist yet for (day, scope). Returns `true` if this call
    /// inserted them, `false` if the pair was already processed.
    async fn insert_awards(
        &self,
        day: NaiveDate,
        scope: &str,
        awards: Vec<DailyWinnerAward>,
    ) -> EconomyResult<bool>;

    /// The user's most recent pending award, if any.
    async fn pending_award(&self, user: &UserId) -> EconomyResult<Option<DailyWinnerAward>>;

    /// The user's pending award for a specific day, if any.
    async fn pending_award_on(
        &self,
        user: &UserId,
        day: NaiveDate,
    ) -> EconomyResult<Option<DailyWinnerAward>>;

    /// The atomic claim: CAS the (user, day) award from `pending` to
    /// `claimed` and apply the ledger credit in the same unit.
    /// Returns `None` when no pending award matches.
    async fn claim_award_and_credit(
        &self,
        user: &UserId,
        day: NaiveDate,
        entry: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> EconomyResult<Option<(DailyWinnerAward, CreditOutcome)>>;

    /// CAS the (user, day) award from `pending` to `lost`, no credit.
    async fn dismiss_award(
        &self,
        user: &UserId,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> EconomyResult<Option<DailyWinnerAward>>;

    /// Last date the daily-winners job completed for a scope.
    async fn last_processed_date(&self, scope: &str) -> EconomyResult<Option<NaiveDate>>;

    /// Record job completion for a scope.
    async fn set_last_processed_date(&self, scope: &str, day: NaiveDate) -> EconomyResult<()>;

    // ==================== Rate limiting ====================

    /// Increment and return the call count for (key, window_start).
    /// Counters are ephemeral and may be approximate.
    async fn incr_rate_counter(&self, key: &str, window_start: i64) -> EconomyResult<u32>;

    // ==================== Stats ====================

    /// Aggregate counts, for health reporting.
    async fn get_stats(&self) -> EconomyResult<StorageStats>;
}

/// Aggregate storage counts.
#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    pub total_wallets: u64,
    pub total_ledger_entries: u64,
    pub total_lootboxes: u64,
    pub active_drops: u64,
    pub total_awards: u64,
    pub pending_awards: u64,
}

pub use self::sled::SledStore;
pub use memory::MemoryStore;
