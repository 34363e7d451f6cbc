//! Lootbox lifecycle: the store/open decision and stored opens.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{EconomyError, EconomyResult};
use crate::logging::operations;
use crate::rewards::roll_lootbox_reward;
use crate::storage::{EconomyStore, OpenedLootbox};
use crate::types::{
    keys, LootboxDecision, LootboxInstance, LootboxStatus, NewLedgerEntry, RewardSource, UserId,
};

/// Result of a decide call.
#[derive(Debug, Clone)]
pub enum DecideOutcome {
    Stored(LootboxInstance),
    Opened(OpenedLootbox),
}

/// Transitions lootboxes through their terminal states.
pub struct LootboxLifecycle {
    store: Arc<dyn EconomyStore>,
}

impl LootboxLifecycle {
    pub fn new(store: Arc<dyn EconomyStore>) -> Self {
        Self { store }
    }

    /// Resolve an active drop: store it for later or open it now.
    ///
    /// Only an unexpired `active_drop` owned by the caller can be
    /// decided; everything else (wrong owner, wrong status, expired,
    /// missing) is `NotFoundOrAlreadyProcessed`. Expiry is advisory:
    /// a drop past its TTL is flipped to `expired` here, at decide
    /// time.
    pub async fn decide<R: Rng + ?Sized>(
        &self,
        user: &UserId,
        lootbox_id: &Uuid,
        decision: LootboxDecision,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> EconomyResult<DecideOutcome> {
        let lootbox = self
            .store
            .get_lootbox(lootbox_id)
            .await?
            .filter(|lb| &lb.user_id == user)
            .ok_or(EconomyError::NotFoundOrAlreadyProcessed)?;

        if lootbox.is_expired(now) {
            self.store.expire_lootbox(lootbox_id, user).await?;
            debug!(
                operation = operations::LOOTBOX_DECIDE,
                user_id = %user,
                lootbox_id = %lootbox_id,
                "drop expired at decide time"
            );
            return Err(EconomyError::NotFoundOrAlreadyProcessed);
        }

        match decision {
            LootboxDecision::Store => {
                let stored = self
                    .store
                    .mark_lootbox_stored(lootbox_id, user)
                    .await?
                    .ok_or(EconomyError::NotFoundOrAlreadyProcessed)?;
                info!(
                    operation = operations::LOOTBOX_DECIDE,
                    user_id = %user,
                    lootbox_id = %lootbox_id,
                    "drop stored"
                );
                Ok(DecideOutcome::Stored(stored))
            }
            LootboxDecision::OpenNow => {
                let opened = self
                    .open(user, &lootbox, &[LootboxStatus::ActiveDrop], now, rng)
                    .await?;
                Ok(DecideOutcome::Opened(opened))
            }
        }
    }

    /// Open a previously stored lootbox.
    pub async fn open_stored<R: Rng + ?Sized>(
        &self,
        user: &UserId,
        lootbox_id: &Uuid,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> EconomyResult<OpenedLootbox> {
        let lootbox = self
            .store
            .get_lootbox(lootbox_id)
            .await?
            .filter(|lb| &lb.user_id == user)
            .ok_or(EconomyError::NotFoundOrAlreadyProcessed)?;

        self.open(
            user,
            &lootbox,
            &[LootboxStatus::Stored, LootboxStatus::Opened],
            now,
            rng,
        )
        .await
    }

    /// Roll a reward and run the atomic open.
    ///
    /// The roll happens outside the store op, but the ledger key
    /// `lootbox_open::<id>` makes re-invocation return the first
    /// roll's outcome; a second roll never lands.
    async fn open<R: Rng + ?Sized>(
        &self,
        user: &UserId,
        lootbox: &LootboxInstance,
        allowed: &[LootboxStatus],
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> EconomyResult<OpenedLootbox> {
        if lootbox.open_cost_gold > 0 {
            let wallet = self.store.get_wallet(user).await?;
            let coins = wallet.map(|w| w.coins).unwrap_or(0);
            if coins < lootbox.open_cost_gold {
                return Err(EconomyError::Validation(format!(
                    "open costs {} gold, balance is {}",
                    lootbox.open_cost_gold, coins
                )));
            }
        }

        let reward = roll_lootbox_reward(rng);
        let entry = NewLedgerEntry {
            user_id: user.clone(),
            delta_coins: reward.gold - lootbox.open_cost_gold,
            delta_lives: reward.lives,
            source: RewardSource::LootboxOpen,
            idempotency_key: keys::lootbox_open(&lootbox.id),
            metadata: serde_json::json!({
                "lootbox_id": lootbox.id,
                "tier": reward.tier,
            }),
        };

        let opened = self
            .store
            .open_lootbox_and_credit(&lootbox.id, user, allowed, reward, entry, now)
            .await?
            .ok_or(EconomyError::NotFoundOrAlreadyProcessed)?;

        if opened.credit.already_processed {
            debug!(
                operation = operations::LOOTBOX_OPEN,
                user_id = %user,
                lootbox_id = %lootbox.id,
                "open replayed"
            );
        } else {
            info!(
                operation = operations::LOOTBOX_OPEN,
                user_id = %user,
                lootbox_id = %lootbox.id,
                gold = reward.gold,
                lives = reward.lives,
                "lootbox opened"
            );
        }
        Ok(opened)
    }
}
