//! Domain types for the economy core.

mod ledger;
mod lootbox;
mod ranking;
mod wallet;

pub use ledger::*;
pub use lootbox::*;
pub use ranking::*;
pub use wallet::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque user identifier, established by the caller's auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
