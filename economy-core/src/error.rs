//! Error types for the economy core.

use thiserror::Error;

/// Economy operation errors.
///
/// `NotFoundOrAlreadyProcessed` deliberately conflates "never existed"
/// with "already resolved" so callers cannot distinguish the two and
/// double-submits stay information-free.
#[derive(Error, Debug)]
pub enum EconomyError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found or already processed")]
    NotFoundOrAlreadyProcessed,

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Idempotency key conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EconomyError {
    fn from(err: serde_json::Error) -> Self {
        EconomyError::Serialization(err.to_string())
    }
}

/// Result type alias for economy operations.
pub type EconomyResult<T> = Result<T, EconomyError>;
