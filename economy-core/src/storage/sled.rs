//! Sled-backed persistent store.
//!
//! One tree per collection, serde_json values. Multi-record atomic
//! units are serialized by a coarse async mutex, which gives
//! concurrent callers the same single-winner semantics as the memory
//! store; crash atomicity across trees is not claimed. Rate-limit
//! counters are ephemeral and stay in memory.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{EconomyStore, OpenedLootbox, StorageStats};
use crate::error::{EconomyError, EconomyResult};
use crate::rewards::LootboxReward;
use crate::types::{
    ActivityGrant, AwardStatus, CreditOutcome, DailyPlan, DailyWinnerAward, LeaderboardRow,
    LedgerEntry, LootboxInstance, LootboxStatus, NewLedgerEntry, SlotStatus, UserId, WalletState,
};

const WALLETS_TREE: &str = "wallets";
const LEDGER_TREE: &str = "ledger";
const LOOTBOXES_TREE: &str = "lootboxes";
const PLANS_TREE: &str = "daily_plans";
const ACTIVITY_GRANTS_TREE: &str = "activity_grants";
const SNAPSHOTS_TREE: &str = "leaderboard_snapshots";
const AWARDS_TREE: &str = "daily_winner_awards";
const PROCESSING_LOG_TREE: &str = "processing_log";

/// Sled persistent store.
pub struct SledStore {
    db: sled::Db,
    wallets: sled::Tree,
    ledger: sled::Tree,
    lootboxes: sled::Tree,
    plans: sled::Tree,
    activity_grants: sled::Tree,
    snapshots: sled::Tree,
    awards: sled::Tree,
    processing_log: sled::Tree,
    // Serializes the multi-record atomic units.
    write_lock: Mutex<()>,
    rate_counters: RwLock<HashMap<(String, i64), u32>>,
}

fn storage_err(context: &str, err: impl std::fmt::Display) -> EconomyError {
    EconomyError::Storage(format!("{}: {}", context, err))
}

impl SledStore {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> EconomyResult<Self> {
        let db = sled::open(path).map_err(|e| storage_err("open sled db", e))?;
        let tree = |name: &str| {
            db.open_tree(name)
                .map_err(|e| storage_err(&format!("open {} tree", name), e))
        };
        Ok(Self {
            wallets: tree(WALLETS_TREE)?,
            ledger: tree(LEDGER_TREE)?,
            lootboxes: tree(LOOTBOXES_TREE)?,
            plans: tree(PLANS_TREE)?,
            activity_grants: tree(ACTIVITY_GRANTS_TREE)?,
            snapshots: tree(SNAPSHOTS_TREE)?,
            awards: tree(AWARDS_TREE)?,
            processing_log: tree(PROCESSING_LOG_TREE)?,
            db,
            write_lock: Mutex::new(()),
            rate_counters: RwLock::new(HashMap::new()),
        })
    }

    /// Flush to disk.
    pub fn flush(&self) -> EconomyResult<()> {
        self.db.flush().map_err(|e| storage_err("flush", e))?;
        Ok(())
    }

    fn serialize<T: Serialize>(value: &T) -> EconomyResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| EconomyError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> EconomyResult<T> {
        serde_json::from_slice(bytes).map_err(|e| EconomyError::Serialization(e.to_string()))
    }

    fn get_value<T: DeserializeOwned>(tree: &sled::Tree, key: &[u8]) -> EconomyResult<Option<T>> {
        match tree.get(key).map_err(|e| storage_err("get", e))? {
            Some(bytes) => Ok(Some(Self::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_value<T: Serialize>(tree: &sled::Tree, key: &[u8], value: &T) -> EconomyResult<()> {
        tree.insert(key, Self::serialize(value)?)
            .map_err(|e| storage_err("insert", e))?;
        Ok(())
    }

    fn plan_key(user: &UserId, day: NaiveDate) -> Vec<u8> {
        format!("{}|{}", user, day).into_bytes()
    }

    fn grant_key(grant: &ActivityGrant) -> Vec<u8> {
        format!("{}|{}|{}", grant.user_id, grant.day, grant.ordinal).into_bytes()
    }

    fn snapshot_key(day: NaiveDate, scope: &str) -> Vec<u8> {
        format!("{}|{}", day, scope).into_bytes()
    }

    fn award_key(day: NaiveDate, scope: &str, user: &UserId) -> Vec<u8> {
        format!("{}|{}|{}", day, scope, user).into_bytes()
    }

    fn all_lootboxes(&self) -> EconomyResult<Vec<LootboxInstance>> {
        self.lootboxes
            .iter()
            .map(|item| {
                let (_, bytes) = item.map_err(|e| storage_err("iter lootboxes", e))?;
                Self::deserialize(&bytes)
            })
            .collect()
    }

    fn all_awards(&self) -> EconomyResult<Vec<DailyWinnerAward>> {
        self.awards
            .iter()
            .map(|item| {
                let (_, bytes) = item.map_err(|e| storage_err("iter awards", e))?;
                Self::deserialize(&bytes)
            })
            .collect()
    }

    /// Credit step shared by the atomic units; callers hold the
    /// write lock.
    fn credit_locked(
        &self,
        entry: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> EconomyResult<CreditOutcome> {
        let ledger_key = entry.idempotency_key.as_bytes().to_vec();
        if let Some(existing) = Self::get_value::<LedgerEntry>(&self.ledger, &ledger_key)? {
            if existing.diverges_from(&entry) {
                return Err(EconomyError::Conflict(entry.idempotency_key));
            }
            return Ok(CreditOutcome {
                coins: existing.coins_after,
                lives: existing.lives_after,
                already_processed: true,
            });
        }

        let wallet_key = entry.user_id.as_str().as_bytes().to_vec();
        let mut wallet = Self::get_value::<WalletState>(&self.wallets, &wallet_key)?
            .unwrap_or_else(|| WalletState::new(entry.user_id.clone(), now));

        if wallet.coins + entry.delta_coins < 0 {
            return Err(EconomyError::Validation(format!(
                "insufficient coins: have {}, delta {}",
                wallet.coins, entry.delta_coins
            )));
        }

        wallet.apply_deltas(entry.delta_coins, entry.delta_lives);
        let applied = LedgerEntry {
            user_id: entry.user_id,
            delta_coins: entry.delta_coins,
            delta_lives: entry.delta_lives,
            source: entry.source,
            idempotency_key: entry.idempotency_key,
            metadata: entry.metadata,
            coins_after: wallet.coins,
            lives_after: wallet.lives,
            created_at: now,
        };
        Self::put_value(&self.wallets, &wallet_key, &wallet)?;
        Self::put_value(&self.ledger, &ledger_key, &applied)?;
        Ok(CreditOutcome {
            coins: applied.coins_after,
            lives: applied.lives_after,
            already_processed: false,
        })
    }
}

#[async_trait]
impl EconomyStore for SledStore {
    // ==================== Wallet / ledger ====================

    async fn get_wallet(&self, user: &UserId) -> EconomyResult<Option<WalletState>> {
        Self::get_value(&self.wallets, user.as_str().as_bytes())
    }

    async fn put_wallet(&self, wallet: &WalletState) -> EconomyResult<()> {
        let _guard = self.write_lock.lock().await;
        Self::put_value(&self.wallets, wallet.user_id.as_str().as_bytes(), wallet)
    }

    async fn list_wallets(&self) -> EconomyResult<Vec<WalletState>> {
        self.wallets
            .iter()
            .map(|item| {
                let (_, bytes) = item.map_err(|e| storage_err("iter wallets", e))?;
                Self::deserialize(&bytes)
            })
            .collect()
    }

    async fn apply_credit(
        &self,
        entry: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> EconomyResult<CreditOutcome> {
        let _guard = self.write_lock.lock().await;
        self.credit_locked(entry, now)
    }

    async fn get_ledger_entry(&self, key: &str) -> EconomyResult<Option<LedgerEntry>> {
        Self::get_value(&self.ledger, key.as_bytes())
    }

    async fn list_ledger_entries(
        &self,
        user: &UserId,
        limit: usize,
    ) -> EconomyResult<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self
            .ledger
            .iter()
            .map(|item| {
                let (_, bytes) = item.map_err(|e| storage_err("iter ledger", e))?;
                Self::deserialize::<LedgerEntry>(&bytes)
            })
            .collect::<EconomyResult<Vec<_>>>()?
            .into_iter()
            .filter(|e| &e.user_id == user)
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }

    // ==================== Lootboxes ====================

    async fn insert_lootbox(&self, lootbox: &LootboxInstance) -> EconomyResult<()> {
        let _guard = self.write_lock.lock().await;
        Self::put_value(&self.lootboxes, lootbox.id.as_bytes(), lootbox)
    }

    async fn get_lootbox(&self, id: &Uuid) -> EconomyResult<Option<LootboxInstance>> {
        Self::get_value(&self.lootboxes, id.as_bytes())
    }

    async fn active_drop(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> EconomyResult<Option<LootboxInstance>> {
        Ok(self.all_lootboxes()?.into_iter().find(|lb| {
            &lb.user_id == user && lb.status == LootboxStatus::ActiveDrop && !lb.is_expired(now)
        }))
    }

    async fn latest_lootbox_created_at(
        &self,
        user: &UserId,
    ) -> EconomyResult<Option<DateTime<Utc>>> {
        Ok(self
            .all_lootboxes()?
            .into_iter()
            .filter(|lb| &lb.user_id == user)
            .map(|lb| lb.created_at)
            .max())
    }

    async fn count_lootboxes_on_day(&self, user: &UserId, day: NaiveDate) -> EconomyResult<u32> {
        Ok(self
            .all_lootboxes()?
            .into_iter()
            .filter(|lb| &lb.user_id == user && lb.created_at.date_naive() == day)
            .count() as u32)
    }

    async fn mark_lootbox_stored(
        &self,
        id: &Uuid,
        user: &UserId,
    ) -> EconomyResult<Option<LootboxInstance>> {
        let _guard = self.write_lock.lock().await;
        match Self::get_value::<LootboxInstance>(&self.lootboxes, id.as_bytes())? {
            Some(mut lb) if &lb.user_id == user && lb.status == LootboxStatus::ActiveDrop => {
                lb.status = LootboxStatus::Stored;
                lb.expires_at = None;
                Self::put_value(&self.lootboxes, id.as_bytes(), &lb)?;
                Ok(Some(lb))
            }
            _ => Ok(None),
        }
    }

    async fn expire_lootbox(
        &self,
        id: &Uuid,
        user: &UserId,
    ) -> EconomyResult<Option<LootboxInstance>> {
        let _guard = self.write_lock.lock().await;
        match Self::get_value::<LootboxInstance>(&self.lootboxes, id.as_bytes())? {
            Some(mut lb) if &lb.user_id == user && lb.status == LootboxStatus::ActiveDrop => {
                lb.status = LootboxStatus::Expired;
                Self::put_value(&self.lootboxes, id.as_bytes(), &lb)?;
                Ok(Some(lb))
            }
            _ => Ok(None),
        }
    }

    async fn open_lootbox_and_credit(
        &self,
        id: &Uuid,
        user: &UserId,
        allowed: &[LootboxStatus],
        rewards: LootboxReward,
        entry: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> EconomyResult<Option<OpenedLootbox>> {
        let _guard = self.write_lock.lock().await;

        let current = match Self::get_value::<LootboxInstance>(&self.lootboxes, id.as_bytes())? {
            Some(lb) if &lb.user_id == user => lb,
            _ => return Ok(None),
        };

        if current.status == LootboxStatus::Opened {
            let existing =
                Self::get_value::<LedgerEntry>(&self.ledger, entry.idempotency_key.as_bytes())?
                    .ok_or_else(|| {
                        EconomyError::Storage(format!(
                            "opened lootbox {} has no ledger entry",
                            id
                        ))
                    })?;
            return Ok(Some(OpenedLootbox {
                lootbox: current,
                credit: CreditOutcome {
                    coins: existing.coins_after,
                    lives: existing.lives_after,
                    already_processed: true,
                },
            }));
        }

        if !allowed.contains(&current.status) || current.is_expired(now) {
            return Ok(None);
        }

        let credit = self.credit_locked(entry, now)?;
        let mut lb = current;
        lb.rewards = Some(rewards);
        lb.status = LootboxStatus::Opened;
        lb.expires_at = None;
        Self::put_value(&self.lootboxes, id.as_bytes(), &lb)?;
        Ok(Some(OpenedLootbox {
            lootbox: lb,
            credit,
        }))
    }

    // ==================== Daily plans / activity grants ====================

    async fn get_or_insert_daily_plan(&self, plan: DailyPlan) -> EconomyResult<DailyPlan> {
        let _guard = self.write_lock.lock().await;
        let key = Self::plan_key(&plan.user_id, plan.day);
        if let Some(existing) = Self::get_value::<DailyPlan>(&self.plans, &key)? {
            return Ok(existing);
        }
        Self::put_value(&self.plans, &key, &plan)?;
        Ok(plan)
    }

    async fn deliver_slot(
        &self,
        user: &UserId,
        day: NaiveDate,
        slot_id: u32,
        lootbox: LootboxInstance,
    ) -> EconomyResult<Option<DailyPlan>> {
        let _guard = self.write_lock.lock().await;
        let key = Self::plan_key(user, day);
        let mut plan = match Self::get_value::<DailyPlan>(&self.plans, &key)? {
            Some(plan) => plan,
            None => return Ok(None),
        };
        match plan.slots.iter_mut().find(|s| s.slot_id == slot_id) {
            Some(slot) if slot.status == SlotStatus::Pending => {
                slot.status = SlotStatus::Delivered;
            }
            _ => return Ok(None),
        }
        plan.delivered_count += 1;
        Self::put_value(&self.plans, &key, &plan)?;
        Self::put_value(&self.lootboxes, lootbox.id.as_bytes(), &lootbox)?;
        Ok(Some(plan))
    }

    async fn insert_activity_grant(&self, grant: &ActivityGrant) -> EconomyResult<bool> {
        let _guard = self.write_lock.lock().await;
        let key = Self::grant_key(grant);
        if self
            .activity_grants
            .contains_key(&key)
            .map_err(|e| storage_err("contains_key", e))?
        {
            return Ok(false);
        }
        Self::put_value(&self.activity_grants, &key, grant)?;
        Ok(true)
    }

    // ==================== Ranking ====================

    async fn put_leaderboard_snapshot(
        &self,
        day: NaiveDate,
        scope: &str,
        rows: Vec<LeaderboardRow>,
    ) -> EconomyResult<()> {
        let _guard = self.write_lock.lock().await;
        Self::put_value(&self.snapshots, &Self::snapshot_key(day, scope), &rows)
    }

    async fn get_leaderboard_snapshot(
        &self,
        day: NaiveDate,
        scope: &str,
    ) -> EconomyResult<Vec<LeaderboardRow>> {
        let mut rows: Vec<LeaderboardRow> =
            Self::get_value(&self.snapshots, &Self::snapshot_key(day, scope))?
                .unwrap_or_default();
        rows.sort_by_key(|r| r.rank);
        Ok(rows)
    }

    async fn list_snapshot_scopes(&self) -> EconomyResult<Vec<String>> {
        let mut scopes = Vec::new();
        for item in self.snapshots.iter() {
            let (key, _) = item.map_err(|e| storage_err("iter snapshots", e))?;
            let key = String::from_utf8_lossy(&key);
            if let Some((_, scope)) = key.split_once('|') {
                scopes.push(scope.to_string());
            }
        }
        scopes.sort();
        scopes.dedup();
        Ok(scopes)
    }

    async fn list_snapshot_days(&self, scope: &str) -> EconomyResult<Vec<NaiveDate>> {
        let mut days = Vec::new();
        for item in self.snapshots.iter() {
            let (key, _) = item.map_err(|e| storage_err("iter snapshots", e))?;
            let key = String::from_utf8_lossy(&key);
            if let Some((day, s)) = key.split_once('|') {
                if s == scope {
                    if let Ok(day) = day.parse::<NaiveDate>() {
                        days.push(day);
                    }
                }
            }
        }
        days.sort();
        Ok(days)
    }

    async fn has_awards_for(&self, day: NaiveDate, scope: &str) -> EconomyResult<bool> {
        let prefix = format!("{}|{}|", day, scope).into_bytes();
        Ok(self.awards.scan_prefix(&prefix).next().is_some())
    }

    async fn insert_awards(
        &self,
        day: NaiveDate,
        scope: &str,
        awards: Vec<DailyWinnerAward>,
    ) -> EconomyResult<bool> {
        let _guard = self.write_lock.lock().await;
        let prefix = format!("{}|{}|", day, scope).into_bytes();
        if self.awards.scan_prefix(&prefix).next().is_some() {
            return Ok(false);
        }
        for award in awards {
            let key = Self::award_key(award.day_date, &award.scope, &award.user_id);
            Self::put_value(&self.awards, &key, &award)?;
        }
        Ok(true)
    }

    async fn pending_award(&self, user: &UserId) -> EconomyResult<Option<DailyWinnerAward>> {
        Ok(self
            .all_awards()?
            .into_iter()
            .filter(|a| &a.user_id == user && a.status == AwardStatus::Pending)
            .max_by_key(|a| a.day_date))
    }

    async fn pending_award_on(
        &self,
        user: &UserId,
        day: NaiveDate,
    ) -> EconomyResult<Option<DailyWinnerAward>> {
        Ok(self.all_awards()?.into_iter().find(|a| {
            &a.user_id == user && a.day_date == day && a.status == AwardStatus::Pending
        }))
    }

    async fn claim_award_and_credit(
        &self,
        user: &UserId,
        day: NaiveDate,
        entry: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> EconomyResult<Option<(DailyWinnerAward, CreditOutcome)>> {
        let _guard = self.write_lock.lock().await;
        let mut award = match self.all_awards()?.into_iter().find(|a| {
            &a.user_id == user && a.day_date == day && a.status == AwardStatus::Pending
        }) {
            Some(award) => award,
            None => return Ok(None),
        };

        let credit = self.credit_locked(entry, now)?;
        award.status = AwardStatus::Claimed;
        award.resolved_at = Some(now);
        let key = Self::award_key(award.day_date, &award.scope, &award.user_id);
        Self::put_value(&self.awards, &key, &award)?;
        Ok(Some((award, credit)))
    }

    async fn dismiss_award(
        &self,
        user: &UserId,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> EconomyResult<Option<DailyWinnerAward>> {
        let _guard = self.write_lock.lock().await;
        let mut award = match self.all_awards()?.into_iter().find(|a| {
            &a.user_id == user && a.day_date == day && a.status == AwardStatus::Pending
        }) {
            Some(award) => award,
            None => return Ok(None),
        };
        award.status = AwardStatus::Lost;
        award.resolved_at = Some(now);
        let key = Self::award_key(award.day_date, &award.scope, &award.user_id);
        Self::put_value(&self.awards, &key, &award)?;
        Ok(Some(award))
    }

    async fn last_processed_date(&self, scope: &str) -> EconomyResult<Option<NaiveDate>> {
        Self::get_value(&self.processing_log, scope.as_bytes())
    }

    async fn set_last_processed_date(&self, scope: &str, day: NaiveDate) -> EconomyResult<()> {
        let _guard = self.write_lock.lock().await;
        Self::put_value(&self.processing_log, scope.as_bytes(), &day)
    }

    // ==================== Rate limiting ====================

    async fn incr_rate_counter(&self, key: &str, window_start: i64) -> EconomyResult<u32> {
        let mut counters = self.rate_counters.write().await;
        let count = counters.entry((key.to_string(), window_start)).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    // ==================== Stats ====================

    async fn get_stats(&self) -> EconomyResult<StorageStats> {
        let lootboxes = self.all_lootboxes()?;
        let awards = self.all_awards()?;
        Ok(StorageStats {
            total_wallets: self.wallets.len() as u64,
            total_ledger_entries: self.ledger.len() as u64,
            total_lootboxes: lootboxes.len() as u64,
            active_drops: lootboxes
                .iter()
                .filter(|lb| lb.status == LootboxStatus::ActiveDrop)
                .count() as u64,
            total_awards: awards.len() as u64,
            pending_awards: awards
                .iter()
                .filter(|a| a.status == AwardStatus::Pending)
                .count() as u64,
        })
    }
}
