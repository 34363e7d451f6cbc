//! Lootbox instances and daily delivery plans.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;
use crate::constants::{
    ACTIVE_DROP_TTL_SECONDS, DAILY_PLAN_TARGET, PLAN_WINDOW_END_HOUR, PLAN_WINDOW_START_HOUR,
};
use crate::rewards::LootboxReward;

/// Lifecycle state of a lootbox instance.
///
/// `Opened` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LootboxStatus {
    ActiveDrop,
    Stored,
    Opened,
    Expired,
}

/// How a lootbox instance came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LootboxSource {
    ScheduledSlot,
    LoginBonus,
    ActivityChance,
}

/// One randomized-reward container instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LootboxInstance {
    pub id: Uuid,
    pub user_id: UserId,
    pub status: LootboxStatus,
    pub source: LootboxSource,
    pub open_cost_gold: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub rewards: Option<LootboxReward>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl LootboxInstance {
    /// New active drop expiring after the standard TTL.
    pub fn new_drop(
        user_id: UserId,
        source: LootboxSource,
        metadata: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: LootboxStatus::ActiveDrop,
            source,
            open_cost_gold: 0,
            expires_at: Some(now + chrono::Duration::seconds(ACTIVE_DROP_TTL_SECONDS)),
            rewards: None,
            metadata,
            created_at: now,
        }
    }

    /// True for an active drop whose TTL has elapsed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == LootboxStatus::ActiveDrop
            && self.expires_at.map(|e| e <= now).unwrap_or(false)
    }
}

/// Delivery state of one plan slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Pending,
    Delivered,
}

/// One scheduled drop opportunity within a daily plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySlot {
    pub slot_id: u32,
    pub slot_time: DateTime<Utc>,
    pub status: SlotStatus,
}

/// Per-user per-day delivery schedule, generated once on the first
/// heartbeat of the day and mutated by the heartbeat step only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPlan {
    pub user_id: UserId,
    pub day: NaiveDate,
    pub target_count: u32,
    pub delivered_count: u32,
    pub slots: Vec<DeliverySlot>,
}

impl DailyPlan {
    /// Evenly spaced slots across the plan window for the given day.
    pub fn generate(user_id: UserId, day: NaiveDate) -> Self {
        let target = DAILY_PLAN_TARGET;
        let window_minutes =
            ((PLAN_WINDOW_END_HOUR - PLAN_WINDOW_START_HOUR) * 60).saturating_sub(1);
        let step = if target > 1 {
            window_minutes / (target - 1)
        } else {
            0
        };

        let slots = (0..target)
            .map(|i| {
                let minute_of_day = PLAN_WINDOW_START_HOUR * 60 + i * step;
                let time = NaiveTime::from_hms_opt(minute_of_day / 60, minute_of_day % 60, 0)
                    .unwrap_or(NaiveTime::MIN);
                DeliverySlot {
                    slot_id: i,
                    slot_time: Utc.from_utc_datetime(&day.and_time(time)),
                    status: SlotStatus::Pending,
                }
            })
            .collect();

        Self {
            user_id,
            day,
            target_count: target,
            delivered_count: 0,
            slots,
        }
    }

    /// Earliest pending slot that is already due.
    pub fn next_due_slot(&self, now: DateTime<Utc>) -> Option<&DeliverySlot> {
        self.slots
            .iter()
            .filter(|s| s.status == SlotStatus::Pending && s.slot_time <= now)
            .min_by_key(|s| s.slot_time)
    }
}

/// Existence record deduplicating activity-triggered drops per
/// (user, day, activity-ordinal).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityGrant {
    pub user_id: UserId,
    pub day: NaiveDate,
    pub ordinal: u32,
}

/// Caller decision on an active drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LootboxDecision {
    OpenNow,
    Store,
}

/// What a heartbeat call observed or did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatOutcome {
    pub has_active_drop: bool,
    pub drop_created: bool,
    pub lootbox: Option<LootboxInstance>,
    pub cooldown_active: bool,
    pub remaining_minutes: Option<i64>,
    pub needs_catchup: bool,
}

impl HeartbeatOutcome {
    pub fn empty() -> Self {
        Self {
            has_active_drop: false,
            drop_created: false,
            lootbox: None,
            cooldown_active: false,
            remaining_minutes: None,
            needs_catchup: false,
        }
    }
}
