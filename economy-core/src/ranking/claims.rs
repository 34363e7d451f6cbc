//! Claiming and dismissing pending ranking awards.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::info;

use crate::error::{EconomyError, EconomyResult};
use crate::logging::operations;
use crate::storage::EconomyStore;
use crate::types::{
    keys, CreditOutcome, DailyWinnerAward, NewLedgerEntry, RewardSource, UserId,
};

/// Resolves pending awards to `Claimed` or `Lost`.
pub struct RankingClaims {
    store: Arc<dyn EconomyStore>,
}

impl RankingClaims {
    pub fn new(store: Arc<dyn EconomyStore>) -> Self {
        Self { store }
    }

    /// The user's most recent pending award, if any.
    pub async fn pending(&self, user: &UserId) -> EconomyResult<Option<DailyWinnerAward>> {
        self.store.pending_award(user).await
    }

    /// Claim the pending award for (user, day).
    ///
    /// Gold and lives are credited as one ledger entry under
    /// `daily_rank_claim:<user>:<day>`, and the pending -> claimed
    /// transition rides the same atomic store op, so a concurrent
    /// claim or dismiss loses cleanly. A claimed, dismissed or absent
    /// award is `NotFoundOrAlreadyProcessed`.
    pub async fn claim(
        &self,
        user: &UserId,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> EconomyResult<(DailyWinnerAward, CreditOutcome)> {
        let pending = self
            .store
            .pending_award_on(user, day)
            .await?
            .ok_or(EconomyError::NotFoundOrAlreadyProcessed)?;

        let entry = NewLedgerEntry {
            user_id: user.clone(),
            delta_coins: pending.gold_awarded,
            delta_lives: pending.lives_awarded,
            source: RewardSource::DailyRankReward,
            idempotency_key: keys::daily_rank_claim(user, day),
            metadata: serde_json::json!({
                "scope": pending.scope,
                "rank": pending.rank,
                "is_sunday_jackpot": pending.is_sunday_jackpot,
            }),
        };

        let (award, credit) = self
            .store
            .claim_award_and_credit(user, day, entry, now)
            .await?
            .ok_or(EconomyError::NotFoundOrAlreadyProcessed)?;

        info!(
            operation = operations::CLAIM,
            user_id = %user,
            day = %day,
            gold = award.gold_awarded,
            lives = award.lives_awarded,
            "rank reward claimed"
        );
        Ok((award, credit))
    }

    /// Dismiss the pending award for (user, day). No credit; final.
    pub async fn dismiss(
        &self,
        user: &UserId,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> EconomyResult<DailyWinnerAward> {
        let award = self
            .store
            .dismiss_award(user, day, now)
            .await?
            .ok_or(EconomyError::NotFoundOrAlreadyProcessed)?;

        info!(
            operation = operations::DISMISS,
            user_id = %user,
            day = %day,
            "rank reward dismissed"
        );
        Ok(award)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::AwardStatus;

    async fn store_with_award(user: &UserId, day: NaiveDate) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let award = DailyWinnerAward {
            user_id: user.clone(),
            day_date: day,
            scope: "UTC".to_string(),
            rank: 1,
            gold_awarded: 500,
            lives_awarded: 5,
            is_sunday_jackpot: false,
            status: AwardStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        };
        store.insert_awards(day, "UTC", vec![award]).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_claim_credits_once_and_finalizes() {
        let user = UserId::new("u1");
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let store = store_with_award(&user, day).await;
        let claims = RankingClaims::new(store.clone());
        let now = Utc::now();

        let (award, credit) = claims.claim(&user, day, now).await.unwrap();
        assert_eq!(award.status, AwardStatus::Claimed);
        assert!(award.resolved_at.is_some());
        assert_eq!(credit.coins, 500);
        assert!(!credit.already_processed);

        let err = claims.claim(&user, day, now).await.unwrap_err();
        assert!(matches!(err, EconomyError::NotFoundOrAlreadyProcessed));

        let wallet = store.get_wallet(&user).await.unwrap().unwrap();
        assert_eq!(wallet.coins, 500);
    }

    #[tokio::test]
    async fn test_dismiss_is_final_and_credits_nothing() {
        let user = UserId::new("u1");
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let store = store_with_award(&user, day).await;
        let claims = RankingClaims::new(store.clone());
        let now = Utc::now();

        let award = claims.dismiss(&user, day, now).await.unwrap();
        assert_eq!(award.status, AwardStatus::Lost);

        let err = claims.claim(&user, day, now).await.unwrap_err();
        assert!(matches!(err, EconomyError::NotFoundOrAlreadyProcessed));
        assert!(store.get_wallet(&user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_without_award_is_not_found() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let claims = RankingClaims::new(store);
        let err = claims
            .claim(
                &UserId::new("nobody"),
                NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EconomyError::NotFoundOrAlreadyProcessed));
    }

    #[tokio::test]
    async fn test_pending_returns_most_recent() {
        let user = UserId::new("u1");
        let d1 = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        let store = store_with_award(&user, d1).await;
        let mut newer = store
            .pending_award_on(&user, d1)
            .await
            .unwrap()
            .unwrap();
        newer.day_date = d2;
        newer.rank = 3;
        store.insert_awards(d2, "UTC", vec![newer]).await.unwrap();

        let claims = RankingClaims::new(store);
        let latest = claims.pending(&user).await.unwrap().unwrap();
        assert_eq!(latest.day_date, d2);
    }
}
