//! Wallet ledger service: idempotent crediting and life regeneration.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{EconomyError, EconomyResult};
use crate::logging::operations;
use crate::storage::EconomyStore;
use crate::types::{keys, CreditOutcome, NewLedgerEntry, RewardSource, UserId, WalletState};

/// Bounds on a single gameplay credit.
pub const MIN_GAMEPLAY_CREDIT: i64 = 1;
pub const MAX_GAMEPLAY_CREDIT: i64 = 1000;

/// Facade over the ledger's atomic credit and the regeneration step.
pub struct WalletLedger {
    store: Arc<dyn EconomyStore>,
}

impl WalletLedger {
    pub fn new(store: Arc<dyn EconomyStore>) -> Self {
        Self { store }
    }

    /// Apply a credit exactly once per idempotency key.
    ///
    /// Replays succeed with `already_processed = true`; a divergent
    /// payload under an existing key is a `Conflict`.
    pub async fn credit(
        &self,
        entry: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> EconomyResult<CreditOutcome> {
        if entry.idempotency_key.trim().is_empty() {
            return Err(EconomyError::Validation(
                "idempotency_key must not be empty".to_string(),
            ));
        }

        let user = entry.user_id.clone();
        let key = entry.idempotency_key.clone();
        let outcome = self.store.apply_credit(entry, now).await?;
        if outcome.already_processed {
            debug!(
                operation = operations::CREDIT,
                user_id = %user,
                idempotency_key = %key,
                "credit replayed"
            );
        } else {
            info!(
                operation = operations::CREDIT,
                user_id = %user,
                idempotency_key = %key,
                coins = outcome.coins,
                lives = outcome.lives,
                "credit applied"
            );
        }
        Ok(outcome)
    }

    /// Gameplay reward credit, keyed `game_reward:<user>:<source_id>`.
    pub async fn credit_game_reward(
        &self,
        user: UserId,
        amount: i64,
        source_id: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> EconomyResult<CreditOutcome> {
        if !(MIN_GAMEPLAY_CREDIT..=MAX_GAMEPLAY_CREDIT).contains(&amount) {
            return Err(EconomyError::Validation(format!(
                "amount must be within {}..={}, got {}",
                MIN_GAMEPLAY_CREDIT, MAX_GAMEPLAY_CREDIT, amount
            )));
        }
        if source_id.trim().is_empty() {
            return Err(EconomyError::Validation(
                "source_id must not be empty".to_string(),
            ));
        }

        let entry = NewLedgerEntry {
            idempotency_key: keys::game_reward(&user, source_id),
            user_id: user,
            delta_coins: amount,
            delta_lives: 0,
            source: RewardSource::GameReward,
            metadata: serde_json::json!({
                "source_id": source_id,
                "reason": reason,
            }),
        };
        self.credit(entry, now).await
    }

    /// Current balances with opportunistic regeneration applied.
    ///
    /// Creates the wallet on first read. The regeneration step is
    /// deterministic in `(wallet, now)`, so a concurrent write of the
    /// same computation is harmless.
    pub async fn balance(&self, user: &UserId, now: DateTime<Utc>) -> EconomyResult<WalletState> {
        let mut wallet = match self.store.get_wallet(user).await? {
            Some(wallet) => wallet,
            None => WalletState::new(user.clone(), now),
        };

        let added = wallet.regenerate(now);
        self.store.put_wallet(&wallet).await?;
        if added > 0 {
            debug!(
                operation = operations::REGENERATE,
                user_id = %user,
                count = added,
                "lives regenerated on read"
            );
        }
        Ok(wallet)
    }

    /// Background sweep: regenerate lives for every wallet. Returns
    /// the number of wallets that gained lives. Per-wallet failures
    /// are logged and the sweep continues.
    pub async fn regenerate_sweep(&self, now: DateTime<Utc>) -> EconomyResult<u32> {
        let wallets = self.store.list_wallets().await?;
        let mut touched = 0u32;
        for mut wallet in wallets {
            if wallet.regenerate(now) > 0 {
                if let Err(err) = self.store.put_wallet(&wallet).await {
                    warn!(
                        operation = operations::REGENERATE,
                        user_id = %wallet.user_id,
                        error = %err,
                        "failed to persist regenerated wallet"
                    );
                    continue;
                }
                touched += 1;
            }
        }
        info!(
            operation = operations::REGENERATE,
            count = touched,
            "regeneration sweep finished"
        );
        Ok(touched)
    }

    /// Most recent ledger entries for a user, newest first.
    pub async fn history(
        &self,
        user: &UserId,
        limit: usize,
    ) -> EconomyResult<Vec<crate::types::LedgerEntry>> {
        self.store.list_ledger_entries(user, limit).await
    }
}
