//! Wallet state and life regeneration.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;
use crate::constants::{DEFAULT_MAX_LIVES, DEFAULT_REGEN_INTERVAL_MINUTES};

/// Current balances and regeneration metadata for one user.
///
/// Mutated only as the side effect of applying a ledger entry or of
/// the deterministic regeneration step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletState {
    pub user_id: UserId,
    pub coins: i64,
    pub lives: i64,
    pub max_lives: i64,
    pub last_regeneration_at: DateTime<Utc>,
    pub regeneration_interval_minutes: i64,
}

impl WalletState {
    /// Fresh wallet with full lives and default regeneration settings.
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            coins: 0,
            lives: DEFAULT_MAX_LIVES,
            max_lives: DEFAULT_MAX_LIVES,
            last_regeneration_at: now,
            regeneration_interval_minutes: DEFAULT_REGEN_INTERVAL_MINUTES,
        }
    }

    /// Apply coin/life deltas, clamping lives to `[0, max_lives]`.
    pub fn apply_deltas(&mut self, delta_coins: i64, delta_lives: i64) {
        self.coins += delta_coins;
        self.lives = (self.lives + delta_lives).clamp(0, self.max_lives);
    }

    /// Deterministic life regeneration.
    ///
    /// Adds `floor(elapsed / interval)` lives capped at `max_lives`,
    /// and advances `last_regeneration_at` by exactly the consumed
    /// intervals so fractional progress is never lost. A
    /// `last_regeneration_at` in the future is clamped to `now`
    /// (self-healing). Returns the number of lives added.
    pub fn regenerate(&mut self, now: DateTime<Utc>) -> i64 {
        if self.last_regeneration_at > now {
            self.last_regeneration_at = now;
            return 0;
        }

        let interval = Duration::minutes(self.regeneration_interval_minutes.max(1));
        let elapsed = now - self.last_regeneration_at;
        let intervals = elapsed.num_minutes() / interval.num_minutes();
        if intervals <= 0 || self.lives >= self.max_lives {
            // At full lives the anchor moves to now so a later dip
            // does not backdate regeneration.
            if self.lives >= self.max_lives {
                self.last_regeneration_at = now;
            }
            return 0;
        }

        let to_add = intervals.min(self.max_lives - self.lives);
        self.lives += to_add;
        self.last_regeneration_at += interval * (to_add as i32);
        to_add
    }
}
