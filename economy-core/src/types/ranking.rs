//! Ranking-reward types: awards, processing log, snapshots.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Resolution state of a computed ranking reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardStatus {
    Pending,
    Claimed,
    Lost,
}

/// A leaderboard prize computed once per (user, day, scope).
///
/// Created exactly once by the ranking processor; transitioned to
/// `Claimed` or `Lost` by the claim manager. Once non-pending the row
/// is immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyWinnerAward {
    pub user_id: UserId,
    pub day_date: NaiveDate,
    pub scope: String,
    pub rank: u32,
    pub gold_awarded: i64,
    pub lives_awarded: i64,
    pub is_sunday_jackpot: bool,
    pub status: AwardStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// One row of a precomputed leaderboard snapshot for (day, scope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub rank: u32,
    pub user_id: UserId,
    pub score: i64,
}

/// Summary of one processor or backfill run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingSummary {
    /// Scopes for which awards were written this run.
    pub scopes_processed: u32,
    /// Scopes skipped by the window/log guard or missing snapshots.
    pub scopes_skipped: u32,
    /// Scopes that failed and were logged.
    pub scopes_failed: u32,
    /// Total award rows written.
    pub awards_written: u32,
}
