//! Fixed-window rate limiter.
//!
//! The limiter protects the economy, it is not part of it: a store
//! failure here is logged and the call is allowed through (fail-open)
//! rather than turning a counter hiccup into an outage.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::warn;

use crate::error::{EconomyError, EconomyResult};
use crate::storage::EconomyStore;

/// Per-(caller, action) fixed-window limiter.
pub struct RateLimiter {
    store: Arc<dyn EconomyStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn EconomyStore>) -> Self {
        Self { store }
    }

    /// Count this call against `(caller_key, action)` and reject with
    /// `RateLimited` once the window's budget is spent.
    pub async fn allow(
        &self,
        caller_key: &str,
        action: &str,
        max_calls: u32,
        window_secs: u64,
        now: DateTime<Utc>,
    ) -> EconomyResult<()> {
        let window = window_secs.max(1) as i64;
        let window_start = now.timestamp().div_euclid(window) * window;
        let key = format!("{}:{}", action, caller_key);

        let count = match self.store.incr_rate_counter(&key, window_start).await {
            Ok(count) => count,
            Err(err) => {
                warn!(
                    action,
                    caller_key,
                    error = %err,
                    "rate counter unavailable, allowing call"
                );
                return Ok(());
            }
        };

        if count > max_calls {
            let retry_after_secs = (window_start + window - now.timestamp()).max(0) as u64;
            return Err(EconomyError::RateLimited { retry_after_secs });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_budget_spent_within_window() {
        let limiter = RateLimiter::new(Arc::new(MemoryStore::new()));
        let now = Utc::now();

        for _ in 0..3 {
            limiter.allow("u1", "credit", 3, 60, now).await.unwrap();
        }
        let err = limiter.allow("u1", "credit", 3, 60, now).await.unwrap_err();
        match err {
            EconomyError::RateLimited { retry_after_secs } => {
                assert!(retry_after_secs <= 60);
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }

        // Another caller and another action keep their own budgets.
        limiter.allow("u2", "credit", 3, 60, now).await.unwrap();
        limiter.allow("u1", "heartbeat", 3, 60, now).await.unwrap();
    }

    #[tokio::test]
    async fn test_window_rollover_resets_budget() {
        let limiter = RateLimiter::new(Arc::new(MemoryStore::new()));
        let now = Utc::now();

        limiter.allow("u1", "claim", 1, 60, now).await.unwrap();
        assert!(limiter.allow("u1", "claim", 1, 60, now).await.is_err());

        let next_window = now + chrono::Duration::seconds(60);
        limiter.allow("u1", "claim", 1, 60, next_window).await.unwrap();
    }
}
