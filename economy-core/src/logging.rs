//! Logging conventions for the economy core.
//!
//! All modules log through `tracing` with structured fields. Use the
//! constants below instead of ad hoc field names so log queries stay
//! stable across modules.
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | per-scope batch failures, storage failures |
//! | WARN  | fail-open limiter, clamped timestamps |
//! | INFO  | credits applied, drops created, batch runs |
//! | DEBUG | replay hits, cooldown rejections |

/// Standard log field names.
pub mod fields {
    /// User identifier
    pub const USER_ID: &str = "user_id";
    /// Idempotency key
    pub const IDEMPOTENCY_KEY: &str = "idempotency_key";
    /// Lootbox instance id
    pub const LOOTBOX_ID: &str = "lootbox_id";
    /// Timezone scope of a batch run
    pub const SCOPE: &str = "scope";
    /// Calendar day being processed
    pub const DAY: &str = "day";
    /// Operation name
    pub const OPERATION: &str = "operation";
    /// Error message
    pub const ERROR: &str = "error";
    /// Item count
    pub const COUNT: &str = "count";
}

/// Log operation names for consistent querying.
pub mod operations {
    pub const CREDIT: &str = "credit";
    pub const REGENERATE: &str = "regenerate";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const ACTIVITY_DROP: &str = "activity_drop";
    pub const LOOTBOX_DECIDE: &str = "lootbox_decide";
    pub const LOOTBOX_OPEN: &str = "lootbox_open";
    pub const PROCESS_WINNERS: &str = "process_winners";
    pub const BACKFILL_WINNERS: &str = "backfill_winners";
    pub const CLAIM: &str = "claim";
    pub const DISMISS: &str = "dismiss";
}
