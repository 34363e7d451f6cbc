//! In-memory store, used for tests and development.
//!
//! All collections live behind one `RwLock`: the atomic units span
//! records (ledger entry + wallet, lootbox + credit, award + credit),
//! so a single write guard is the serialization point that makes them
//! atomic.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EconomyStore, OpenedLootbox, StorageStats};
use crate::error::{EconomyError, EconomyResult};
use crate::rewards::LootboxReward;
use crate::types::{
    ActivityGrant, AwardStatus, CreditOutcome, DailyPlan, DailyWinnerAward, LeaderboardRow,
    LedgerEntry, LootboxInstance, LootboxStatus, NewLedgerEntry, SlotStatus, UserId, WalletState,
};

#[derive(Debug, Default)]
struct MemoryInner {
    wallets: HashMap<UserId, WalletState>,
    ledger: HashMap<String, LedgerEntry>,
    ledger_by_user: HashMap<UserId, Vec<String>>,
    lootboxes: HashMap<Uuid, LootboxInstance>,
    lootboxes_by_user: HashMap<UserId, Vec<Uuid>>,
    plans: HashMap<(UserId, NaiveDate), DailyPlan>,
    activity_grants: HashSet<ActivityGrant>,
    snapshots: HashMap<(NaiveDate, String), Vec<LeaderboardRow>>,
    awards: HashMap<(UserId, NaiveDate, String), DailyWinnerAward>,
    processing_log: HashMap<String, NaiveDate>,
    rate_counters: HashMap<(String, i64), u32>,
}

impl MemoryInner {
    /// Shared credit step; callers hold the write guard.
    fn credit_locked(
        &mut self,
        entry: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> EconomyResult<CreditOutcome> {
        if let Some(existing) = self.ledger.get(&entry.idempotency_key) {
            if existing.diverges_from(&entry) {
                return Err(EconomyError::Conflict(entry.idempotency_key));
            }
            return Ok(CreditOutcome {
                coins: existing.coins_after,
                lives: existing.lives_after,
                already_processed: true,
            });
        }

        let wallet = self
            .wallets
            .entry(entry.user_id.clone())
            .or_insert_with(|| WalletState::new(entry.user_id.clone(), now));

        if wallet.coins + entry.delta_coins < 0 {
            return Err(EconomyError::Validation(format!(
                "insufficient coins: have {}, delta {}",
                wallet.coins, entry.delta_coins
            )));
        }

        wallet.apply_deltas(entry.delta_coins, entry.delta_lives);
        let applied = LedgerEntry {
            user_id: entry.user_id.clone(),
            delta_coins: entry.delta_coins,
            delta_lives: entry.delta_lives,
            source: entry.source,
            idempotency_key: entry.idempotency_key.clone(),
            metadata: entry.metadata,
            coins_after: wallet.coins,
            lives_after: wallet.lives,
            created_at: now,
        };
        self.ledger_by_user
            .entry(entry.user_id)
            .or_default()
            .push(entry.idempotency_key.clone());
        let outcome = CreditOutcome {
            coins: applied.coins_after,
            lives: applied.lives_after,
            already_processed: false,
        };
        self.ledger.insert(entry.idempotency_key, applied);
        Ok(outcome)
    }

    fn insert_lootbox_locked(&mut self, lootbox: LootboxInstance) {
        self.lootboxes_by_user
            .entry(lootbox.user_id.clone())
            .or_default()
            .push(lootbox.id);
        self.lootboxes.insert(lootbox.id, lootbox);
    }

    fn user_lootboxes(&self, user: &UserId) -> impl Iterator<Item = &LootboxInstance> {
        self.lootboxes_by_user
            .get(user)
            .into_iter()
            .flatten()
            .filter_map(|id| self.lootboxes.get(id))
    }
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all data.
    pub async fn clear(&self) {
        *self.inner.write().await = MemoryInner::default();
    }
}

#[async_trait]
impl EconomyStore for MemoryStore {
    // ==================== Wallet / ledger ====================

    async fn get_wallet(&self, user: &UserId) -> EconomyResult<Option<WalletState>> {
        Ok(self.inner.read().await.wallets.get(user).cloned())
    }

    async fn put_wallet(&self, wallet: &WalletState) -> EconomyResult<()> {
        self.inner
            .write()
            .await
            .wallets
            .insert(wallet.user_id.clone(), wallet.clone());
        Ok(())
    }

    async fn list_wallets(&self) -> EconomyResult<Vec<WalletState>> {
        Ok(self.inner.read().await.wallets.values().cloned().collect())
    }

    async fn apply_credit(
        &self,
        entry: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> EconomyResult<CreditOutcome> {
        self.inner.write().await.credit_locked(entry, now)
    }

    async fn get_ledger_entry(&self, key: &str) -> EconomyResult<Option<LedgerEntry>> {
        Ok(self.inner.read().await.ledger.get(key).cloned())
    }

    async fn list_ledger_entries(
        &self,
        user: &UserId,
        limit: usize,
    ) -> EconomyResult<Vec<LedgerEntry>> {
        let inner = self.inner.read().await;
        Ok(inner
            .ledger_by_user
            .get(user)
            .into_iter()
            .flatten()
            .rev()
            .take(limit)
            .filter_map(|key| inner.ledger.get(key).cloned())
            .collect())
    }

    // ==================== Lootboxes ====================

    async fn insert_lootbox(&self, lootbox: &LootboxInstance) -> EconomyResult<()> {
        self.inner
            .write()
            .await
            .insert_lootbox_locked(lootbox.clone());
        Ok(())
    }

    async fn get_lootbox(&self, id: &Uuid) -> EconomyResult<Option<LootboxInstance>> {
        Ok(self.inner.read().await.lootboxes.get(id).cloned())
    }

    async fn active_drop(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> EconomyResult<Option<LootboxInstance>> {
        let inner = self.inner.read().await;
        let found = inner
            .user_lootboxes(user)
            .find(|lb| lb.status == LootboxStatus::ActiveDrop && !lb.is_expired(now))
            .cloned();
        Ok(found)
    }

    async fn latest_lootbox_created_at(
        &self,
        user: &UserId,
    ) -> EconomyResult<Option<DateTime<Utc>>> {
        let inner = self.inner.read().await;
        Ok(inner.user_lootboxes(user).map(|lb| lb.created_at).max())
    }

    async fn count_lootboxes_on_day(&self, user: &UserId, day: NaiveDate) -> EconomyResult<u32> {
        let inner = self.inner.read().await;
        Ok(inner
            .user_lootboxes(user)
            .filter(|lb| lb.created_at.date_naive() == day)
            .count() as u32)
    }

    async fn mark_lootbox_stored(
        &self,
        id: &Uuid,
        user: &UserId,
    ) -> EconomyResult<Option<LootboxInstance>> {
        let mut inner = self.inner.write().await;
        match inner.lootboxes.get_mut(id) {
            Some(lb) if &lb.user_id == user && lb.status == LootboxStatus::ActiveDrop => {
                lb.status = LootboxStatus::Stored;
                lb.expires_at = None;
                Ok(Some(lb.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn expire_lootbox(
        &self,
        id: &Uuid,
        user: &UserId,
    ) -> EconomyResult<Option<LootboxInstance>> {
        let mut inner = self.inner.write().await;
        match inner.lootboxes.get_mut(id) {
            Some(lb) if &lb.user_id == user && lb.status == LootboxStatus::ActiveDrop => {
                lb.status = LootboxStatus::Expired;
                Ok(Some(lb.clone()))
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
        let mut inner = self.inner.write().await;

        let current = match inner.lootboxes.get(id) {
            Some(lb) if &lb.user_id == user => lb.clone(),
            _ => return Ok(None),
        };

        if current.status == LootboxStatus::Opened {
            // Replay: hand back the original result.
            let existing = inner.ledger.get(&entry.idempotency_key).cloned().ok_or_else(|| {
                EconomyError::Storage(format!("opened lootbox {} has no ledger entry", id))
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

        let credit = inner.credit_locked(entry, now)?;
        let lb = inner
            .lootboxes
            .get_mut(id)
            .ok_or_else(|| EconomyError::Storage(format!("lootbox {} vanished mid-open", id)))?;
        lb.rewards = Some(rewards);
        lb.status = LootboxStatus::Opened;
        lb.expires_at = None;
        Ok(Some(OpenedLootbox {
            lootbox: lb.clone(),
            credit,
        }))
    }

    // ==================== Daily plans / activity grants ====================

    async fn get_or_insert_daily_plan(&self, plan: DailyPlan) -> EconomyResult<DailyPlan> {
        let mut inner = self.inner.write().await;
        let key = (plan.user_id.clone(), plan.day);
        Ok(inner.plans.entry(key).or_insert(plan).clone())
    }

    async fn deliver_slot(
        &self,
        user: &UserId,
        day: NaiveDate,
        slot_id: u32,
        lootbox: LootboxInstance,
    ) -> EconomyResult<Option<DailyPlan>> {
        let mut inner = self.inner.write().await;
        let updated = {
            let plan = match inner.plans.get_mut(&(user.clone(), day)) {
                Some(plan) => plan,
                None => return Ok(None),
            };
            let slot = match plan.slots.iter_mut().find(|s| s.slot_id == slot_id) {
                Some(slot) if slot.status == SlotStatus::Pending => slot,
                _ => return Ok(None),
            };
            slot.status = SlotStatus::Delivered;
            plan.delivered_count += 1;
            plan.clone()
        };
        inner.insert_lootbox_locked(lootbox);
        Ok(Some(updated))
    }

    async fn insert_activity_grant(&self, grant: &ActivityGrant) -> EconomyResult<bool> {
        Ok(self.inner.write().await.activity_grants.insert(grant.clone()))
    }

    // ==================== Ranking ====================

    async fn put_leaderboard_snapshot(
        &self,
        day: NaiveDate,
        scope: &str,
        rows: Vec<LeaderboardRow>,
    ) -> EconomyResult<()> {
        self.inner
            .write()
            .await
            .snapshots
            .insert((day, scope.to_string()), rows);
        Ok(())
    }

    async fn get_leaderboard_snapshot(
        &self,
        day: NaiveDate,
        scope: &str,
    ) -> EconomyResult<Vec<LeaderboardRow>> {
        let inner = self.inner.read().await;
        let mut rows = inner
            .snapshots
            .get(&(day, scope.to_string()))
            .cloned()
            .unwrap_or_default();
        rows.sort_by_key(|r| r.rank);
        Ok(rows)
    }

    async fn list_snapshot_scopes(&self) -> EconomyResult<Vec<String>> {
        let inner = self.inner.read().await;
        let mut scopes: Vec<String> = inner
            .snapshots
            .keys()
            .map(|(_, scope)| scope.clone())
            .collect();
        scopes.sort();
        scopes.dedup();
        Ok(scopes)
    }

    async fn list_snapshot_days(&self, scope: &str) -> EconomyResult<Vec<NaiveDate>> {
        let inner = self.inner.read().await;
        let mut days: Vec<NaiveDate> = inner
            .snapshots
            .keys()
            .filter(|(_, s)| s == scope)
            .map(|(day, _)| *day)
            .collect();
        days.sort();
        Ok(days)
    }

    async fn has_awards_for(&self, day: NaiveDate, scope: &str) -> EconomyResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner
            .awards
            .keys()
            .any(|(_, d, s)| *d == day && s == scope))
    }

    async fn insert_awards(
        &self,
        day: NaiveDate,
        scope: &str,
        awards: Vec<DailyWinnerAward>,
    ) -> EconomyResult<bool> {
        let mut inner = self.inner.write().await;
        let exists = inner
            .awards
            .keys()
            .any(|(_, d, s)| *d == day && s == scope);
        if exists {
            return Ok(false);
        }
        for award in awards {
            let key = (award.user_id.clone(), award.day_date, award.scope.clone());
            inner.awards.insert(key, award);
        }
        Ok(true)
    }

    async fn pending_award(&self, user: &UserId) -> EconomyResult<Option<DailyWinnerAward>> {
        let inner = self.inner.read().await;
        Ok(inner
            .awards
            .values()
            .filter(|a| &a.user_id == user && a.status == AwardStatus::Pending)
            .max_by_key(|a| a.day_date)
            .cloned())
    }

    async fn pending_award_on(
        &self,
        user: &UserId,
        day: NaiveDate,
    ) -> EconomyResult<Option<DailyWinnerAward>> {
        let inner = self.inner.read().await;
        Ok(inner
            .awards
            .values()
            .find(|a| &a.user_id == user && a.day_date == day && a.status == AwardStatus::Pending)
            .cloned())
    }

    async fn claim_award_and_credit(
        &self,
        user: &UserId,
        day: NaiveDate,
        entry: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> EconomyResult<Option<(DailyWinnerAward, CreditOutcome)>> {
        let mut inner = self.inner.write().await;
        let key = match inner
            .awards
            .iter()
            .find(|((u, d, _), a)| {
                u == user && *d == day && a.status == AwardStatus::Pending
            })
            .map(|(k, _)| k.clone())
        {
            Some(key) => key,
            None => return Ok(None),
        };

        let credit = inner.credit_locked(entry, now)?;
        let award = inner
            .awards
            .get_mut(&key)
            .ok_or_else(|| EconomyError::Storage("award vanished mid-claim".to_string()))?;
        award.status = AwardStatus::Claimed;
        award.resolved_at = Some(now);
        Ok(Some((award.clone(), credit)))
    }

    async fn dismiss_award(
        &self,
        user: &UserId,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> EconomyResult<Option<DailyWinnerAward>> {
        let mut inner = self.inner.write().await;
        let award = inner.awards.values_mut().find(|a| {
            &a.user_id == user && a.day_date == day && a.status == AwardStatus::Pending
        });
        match award {
            Some(award) => {
                award.status = AwardStatus::Lost;
                award.resolved_at = Some(now);
                Ok(Some(award.clone()))
            }
            None => Ok(None),
        }
    }

    async fn last_processed_date(&self, scope: &str) -> EconomyResult<Option<NaiveDate>> {
        Ok(self.inner.read().await.processing_log.get(scope).copied())
    }

    async fn set_last_processed_date(&self, scope: &str, day: NaiveDate) -> EconomyResult<()> {
        self.inner
            .write()
            .await
            .processing_log
            .insert(scope.to_string(), day);
        Ok(())
    }

    // ==================== Rate limiting ====================

    async fn incr_rate_counter(&self, key: &str, window_start: i64) -> EconomyResult<u32> {
        let mut inner = self.inner.write().await;
        let count = inner
            .rate_counters
            .entry((key.to_string(), window_start))
            .or_insert(0);
        *count += 1;
        Ok(*count)
    }

    // ==================== Stats ====================

    async fn get_stats(&self) -> EconomyResult<StorageStats> {
        let inner = self.inner.read().await;
        Ok(StorageStats {
            total_wallets: inner.wallets.len() as u64,
            total_ledger_entries: inner.ledger.len() as u64,
            total_lootboxes: inner.lootboxes.len() as u64,
            active_drops: inner
                .lootboxes
                .values()
                .filter(|lb| lb.status == LootboxStatus::ActiveDrop)
                .count() as u64,
            total_awards: inner.awards.len() as u64,
            pending_awards: inner
                .awards
                .values()
                .filter(|a| a.status == AwardStatus::Pending)
                .count() as u64,
        })
    }
}
