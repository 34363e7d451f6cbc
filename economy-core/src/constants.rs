//! Tunable constants for the economy core.

/// Minimum age of the most recent lootbox before the heartbeat may
/// create another one, in minutes.
pub const HEARTBEAT_COOLDOWN_MINUTES: i64 = 15;

/// Lifetime of an `active_drop` before it is considered expired,
/// in seconds. Expiry is advisory and checked at read/decide time.
pub const ACTIVE_DROP_TTL_SECONDS: i64 = 60;

/// Cooldown between activity-triggered drops, in minutes.
pub const ACTIVITY_COOLDOWN_MINUTES: i64 = 5;

/// Hard cap on lootboxes created per user per day, any source.
pub const DAILY_LOOTBOX_CAP: u32 = 20;

/// The first N logins of a day each grant a guaranteed drop.
pub const GUARANTEED_LOGIN_DROPS: u32 = 3;

/// Chance that a qualifying non-login activity grants a drop.
pub const ACTIVITY_DROP_CHANCE: f64 = 0.30;

/// Number of scheduled delivery slots in a daily plan.
pub const DAILY_PLAN_TARGET: u32 = 4;

/// First slot of the daily plan, hour of day (UTC).
pub const PLAN_WINDOW_START_HOUR: u32 = 8;

/// Last slot of the daily plan must fall before this hour (UTC).
pub const PLAN_WINDOW_END_HOUR: u32 = 22;

/// From this hour on, the heartbeat reports `needs_catchup` when the
/// plan is behind the guaranteed minimum.
pub const CATCHUP_CHECK_HOUR: u32 = 21;

/// Minimum deliveries a day should reach; below this near end-of-day
/// the heartbeat raises the advisory catch-up flag.
pub const GUARANTEED_DAILY_MINIMUM: u32 = 2;

/// Default maximum lives for a new wallet.
pub const DEFAULT_MAX_LIVES: i64 = 30;

/// Default life regeneration interval, in minutes.
pub const DEFAULT_REGEN_INTERVAL_MINUTES: i64 = 30;

/// Ranking reward window: top N ranks on a regular day.
pub const RANK_WINDOW_WEEKDAY: u32 = 10;

/// Ranking reward window: top N ranks on Sundays (jackpot).
pub const RANK_WINDOW_SUNDAY: u32 = 25;

/// Local-time processing window for the daily winners job: from
/// 23:55 (inclusive) to 23:59 (inclusive) in the scope's timezone.
pub const PROCESSING_WINDOW_START_MINUTE: u32 = 23 * 60 + 55;
pub const PROCESSING_WINDOW_END_MINUTE: u32 = 23 * 60 + 59;
