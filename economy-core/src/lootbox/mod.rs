//! Lootbox delivery and lifecycle.
//!
//! [`LootboxScheduler`] decides when a drop appears (heartbeat slots,
//! login bonuses, activity chances). [`LootboxLifecycle`] handles what
//! happens to a drop afterwards (store, open, expire).

pub mod lifecycle;
pub mod scheduler;

pub use lifecycle::{DecideOutcome, LootboxLifecycle};
pub use scheduler::{ActivityDropOutcome, ActivityKind, LootboxScheduler};
