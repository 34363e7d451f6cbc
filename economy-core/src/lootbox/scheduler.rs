//! Drop scheduling: heartbeat-driven slot delivery and
//! activity-triggered drops.

use chrono::{DateTime, Timelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::constants::{
    ACTIVITY_COOLDOWN_MINUTES, ACTIVITY_DROP_CHANCE, CATCHUP_CHECK_HOUR, DAILY_LOOTBOX_CAP,
    GUARANTEED_DAILY_MINIMUM, GUARANTEED_LOGIN_DROPS, HEARTBEAT_COOLDOWN_MINUTES,
};
use crate::error::EconomyResult;
use crate::logging::operations;
use crate::storage::EconomyStore;
use crate::types::{
    ActivityGrant, DailyPlan, HeartbeatOutcome, LootboxInstance, LootboxSource, UserId,
};

/// What kind of activity is asking for a drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Login,
    Gameplay,
}

/// Result of an activity-drop attempt. At most one of the flags is
/// set when `lootbox` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDropOutcome {
    pub granted: bool,
    pub lootbox: Option<LootboxInstance>,
    pub capped: bool,
    pub cooldown_active: bool,
    /// The (day, ordinal) grant was already consumed.
    pub already_granted: bool,
}

impl ActivityDropOutcome {
    fn denied() -> Self {
        Self {
            granted: false,
            lootbox: None,
            capped: false,
            cooldown_active: false,
            already_granted: false,
        }
    }
}

/// Decides when lootboxes appear for a user.
pub struct LootboxScheduler {
    store: Arc<dyn EconomyStore>,
}

impl LootboxScheduler {
    pub fn new(store: Arc<dyn EconomyStore>) -> Self {
        Self { store }
    }

    /// One heartbeat tick for a user.
    ///
    /// Order matters: an existing unexpired drop short-circuits, then
    /// the creation cooldown, then the daily plan's earliest due slot.
    /// Slot delivery and drop insertion happen in one store op, so a
    /// concurrent heartbeat for the same slot produces one drop.
    pub async fn heartbeat(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> EconomyResult<HeartbeatOutcome> {
        if let Some(active) = self.store.active_drop(user, now).await? {
            return Ok(HeartbeatOutcome {
                has_active_drop: true,
                lootbox: Some(active),
                ..HeartbeatOutcome::empty()
            });
        }

        if let Some(remaining) = self.cooldown_remaining(user, now, HEARTBEAT_COOLDOWN_MINUTES).await? {
            debug!(
                operation = operations::HEARTBEAT,
                user_id = %user,
                remaining_minutes = remaining,
                "heartbeat inside creation cooldown"
            );
            return Ok(HeartbeatOutcome {
                cooldown_active: true,
                remaining_minutes: Some(remaining),
                ..HeartbeatOutcome::empty()
            });
        }

        let day = now.date_naive();
        let plan = self
            .store
            .get_or_insert_daily_plan(DailyPlan::generate(user.clone(), day))
            .await?;

        let due_slot = match plan.next_due_slot(now) {
            Some(slot) => slot.slot_id,
            None => {
                return Ok(HeartbeatOutcome {
                    needs_catchup: Self::needs_catchup(&plan, now),
                    ..HeartbeatOutcome::empty()
                });
            }
        };

        let lootbox = LootboxInstance::new_drop(
            user.clone(),
            LootboxSource::ScheduledSlot,
            serde_json::json!({ "slot_id": due_slot }),
            now,
        );
        let delivered = self
            .store
            .deliver_slot(user, day, due_slot, lootbox.clone())
            .await?;

        let plan = match delivered {
            Some(plan) => plan,
            // A concurrent heartbeat delivered this slot first.
            None => {
                return Ok(HeartbeatOutcome {
                    needs_catchup: Self::needs_catchup(&plan, now),
                    ..HeartbeatOutcome::empty()
                });
            }
        };

        info!(
            operation = operations::HEARTBEAT,
            user_id = %user,
            lootbox_id = %lootbox.id,
            slot_id = due_slot,
            "scheduled drop delivered"
        );
        Ok(HeartbeatOutcome {
            has_active_drop: true,
            drop_created: true,
            lootbox: Some(lootbox),
            needs_catchup: Self::needs_catchup(&plan, now),
            ..HeartbeatOutcome::empty()
        })
    }

    /// Activity-triggered drop attempt.
    ///
    /// The first [`GUARANTEED_LOGIN_DROPS`] logins of a day always
    /// grant; other activities roll against the drop chance. The
    /// (user, day, ordinal) grant record is consumed before the roll,
    /// so retrying a failed roll never rerolls.
    pub async fn activity_drop<R: Rng + ?Sized>(
        &self,
        user: &UserId,
        ordinal: u32,
        kind: ActivityKind,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> EconomyResult<ActivityDropOutcome> {
        let day = now.date_naive();

        if self.store.count_lootboxes_on_day(user, day).await? >= DAILY_LOOTBOX_CAP {
            return Ok(ActivityDropOutcome {
                capped: true,
                ..ActivityDropOutcome::denied()
            });
        }

        if self
            .cooldown_remaining(user, now, ACTIVITY_COOLDOWN_MINUTES)
            .await?
            .is_some()
        {
            return Ok(ActivityDropOutcome {
                cooldown_active: true,
                ..ActivityDropOutcome::denied()
            });
        }

        let grant = ActivityGrant {
            user_id: user.clone(),
            day,
            ordinal,
        };
        if !self.store.insert_activity_grant(&grant).await? {
            debug!(
                operation = operations::ACTIVITY_DROP,
                user_id = %user,
                ordinal,
                "activity grant already consumed"
            );
            return Ok(ActivityDropOutcome {
                already_granted: true,
                ..ActivityDropOutcome::denied()
            });
        }

        let guaranteed = kind == ActivityKind::Login && ordinal <= GUARANTEED_LOGIN_DROPS;
        if !guaranteed && !rng.gen_bool(ACTIVITY_DROP_CHANCE) {
            return Ok(ActivityDropOutcome::denied());
        }

        let source = if guaranteed {
            LootboxSource::LoginBonus
        } else {
            LootboxSource::ActivityChance
        };
        let lootbox = LootboxInstance::new_drop(
            user.clone(),
            source,
            serde_json::json!({ "ordinal": ordinal }),
            now,
        );
        self.store.insert_lootbox(&lootbox).await?;

        info!(
            operation = operations::ACTIVITY_DROP,
            user_id = %user,
            lootbox_id = %lootbox.id,
            ordinal,
            guaranteed,
            "activity drop created"
        );
        Ok(ActivityDropOutcome {
            granted: true,
            lootbox: Some(lootbox),
            capped: false,
            cooldown_active: false,
            already_granted: false,
        })
    }

    /// Minutes left of the creation cooldown, if it is in effect.
    async fn cooldown_remaining(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
        cooldown_minutes: i64,
    ) -> EconomyResult<Option<i64>> {
        let latest = match self.store.latest_lootbox_created_at(user).await? {
            Some(at) => at,
            None => return Ok(None),
        };
        let elapsed = (now - latest).num_minutes();
        if elapsed < cooldown_minutes {
            Ok(Some(cooldown_minutes - elapsed))
        } else {
            Ok(None)
        }
    }

    fn needs_catchup(plan: &DailyPlan, now: DateTime<Utc>) -> bool {
        now.hour() >= CATCHUP_CHECK_HOUR && plan.delivered_count < GUARANTEED_DAILY_MINIMUM
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scheduler() -> LootboxScheduler {
        LootboxScheduler::new(Arc::new(MemoryStore::new()))
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn test_heartbeat_delivers_due_slot_once() {
        let sched = scheduler();
        let user = UserId::new("u1");

        let first = sched.heartbeat(&user, at(8, 1)).await.unwrap();
        assert!(first.drop_created);
        let lb = first.lootbox.unwrap();
        assert_eq!(lb.source, LootboxSource::ScheduledSlot);
        assert!(lb.expires_at.is_some());

        // Within the active drop's TTL the same drop comes back.
        let again = sched.heartbeat(&user, at(8, 1)).await.unwrap();
        assert!(again.has_active_drop);
        assert!(!again.drop_created);
        assert_eq!(again.lootbox.unwrap().id, lb.id);
    }

    #[tokio::test]
    async fn test_heartbeat_cooldown_after_expiry() {
        let sched = scheduler();
        let user = UserId::new("u1");

        sched.heartbeat(&user, at(8, 1)).await.unwrap();

        // Drop expired (TTL 60s) but the 15-minute creation cooldown
        // still holds.
        let out = sched.heartbeat(&user, at(8, 5)).await.unwrap();
        assert!(out.cooldown_active);
        assert_eq!(out.remaining_minutes, Some(11));
        assert!(!out.drop_created);
    }

    #[tokio::test]
    async fn test_heartbeat_no_pending_slot_before_window() {
        let sched = scheduler();
        let user = UserId::new("u1");

        let out = sched.heartbeat(&user, at(6, 0)).await.unwrap();
        assert!(!out.drop_created);
        assert!(!out.has_active_drop);
        assert!(!out.cooldown_active);
    }

    #[tokio::test]
    async fn test_heartbeat_catchup_flag_near_end_of_day() {
        let sched = scheduler();
        let user = UserId::new("u1");

        // First heartbeat of the day at 21:30 delivers a due slot and
        // still reports catch-up: only 1 of the guaranteed 2 arrived.
        let out = sched.heartbeat(&user, at(21, 30)).await.unwrap();
        assert!(out.drop_created);
        assert!(out.needs_catchup);
    }

    #[tokio::test]
    async fn test_login_drops_guaranteed_then_grant_consumed() {
        let sched = scheduler();
        let user = UserId::new("u1");
        let mut rng = StdRng::seed_from_u64(7);

        let first = sched
            .activity_drop(&user, 1, ActivityKind::Login, at(9, 0), &mut rng)
            .await
            .unwrap();
        assert!(first.granted);
        assert_eq!(first.lootbox.unwrap().source, LootboxSource::LoginBonus);

        // Same ordinal again: grant consumed, cooldown aside.
        let replay = sched
            .activity_drop(&user, 1, ActivityKind::Login, at(9, 10), &mut rng)
            .await
            .unwrap();
        assert!(!replay.granted);
        assert!(replay.already_granted);
    }

    #[tokio::test]
    async fn test_activity_cooldown_blocks_back_to_back_drops() {
        let sched = scheduler();
        let user = UserId::new("u1");
        let mut rng = StdRng::seed_from_u64(7);

        sched
            .activity_drop(&user, 1, ActivityKind::Login, at(9, 0), &mut rng)
            .await
            .unwrap();
        let second = sched
            .activity_drop(&user, 2, ActivityKind::Login, at(9, 2), &mut rng)
            .await
            .unwrap();
        assert!(second.cooldown_active);
        assert!(!second.granted);
    }

    #[tokio::test]
    async fn test_daily_cap_blocks_creation() {
        let store = Arc::new(MemoryStore::new());
        let sched = LootboxScheduler::new(store.clone());
        let user = UserId::new("u1");
        let now = at(9, 0);

        for _ in 0..DAILY_LOOTBOX_CAP {
            let lb = LootboxInstance::new_drop(
                user.clone(),
                LootboxSource::ActivityChance,
                serde_json::json!({}),
                now,
            );
            store.insert_lootbox(&lb).await.unwrap();
        }

        let mut rng = StdRng::seed_from_u64(7);
        let out = sched
            .activity_drop(&user, 1, ActivityKind::Login, at(23, 0), &mut rng)
            .await
            .unwrap();
        assert!(out.capped);
        assert!(!out.granted);
    }
}
