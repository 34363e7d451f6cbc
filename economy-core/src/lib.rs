//! Core of the virtual-economy backend: reward crediting, lootbox
//! lifecycle and ranking-reward processing.
//!
//! The crate is organized around one rule: every balance or status
//! change goes through a single atomic storage operation. The
//! [`storage::EconomyStore`] trait names those atomic units; the
//! services in [`ledger`], [`lootbox`] and [`ranking`] only compose
//! them and never read-then-write from the caller's side.

pub mod constants;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod lootbox;
pub mod ranking;
pub mod ratelimit;
pub mod rewards;
pub mod storage;
pub mod types;

pub use error::{EconomyError, EconomyResult};
pub use ledger::WalletLedger;
pub use lootbox::{LootboxLifecycle, LootboxScheduler};
pub use ranking::{RankingClaims, RankingProcessor};
pub use ratelimit::RateLimiter;
pub use storage::{EconomyStore, MemoryStore, SledStore};
