//! Caller identity and the internal-route gate.
//!
//! Identity issuance is out of scope: the upstream gateway
//! authenticates the user and forwards the id in `X-User-Id`. Batch
//! and ingestion routes under `/internal/v1/` are gated by a shared
//! secret in `X-Internal-Token`.

use axum::{extract::FromRequestParts, http::request::Parts};
use economy_core::types::UserId;

use crate::error::ApiError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const INTERNAL_TOKEN_HEADER: &str = "X-Internal-Token";

/// The authenticated caller, extracted from `X-User-Id`.
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub UserId);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ApiError::Unauthorized(format!("Missing {} header", USER_ID_HEADER))
            })?;

        Ok(CallerIdentity(UserId::new(value)))
    }
}

/// Gate for internal routes. Refuses everything until a token is
/// configured; comparison against the configured secret otherwise.
pub fn require_internal(state: &AppState, parts_token: Option<&str>) -> Result<(), ApiError> {
    let expected = state.config.internal_token.as_deref().ok_or_else(|| {
        ApiError::Unauthorized("Internal routes are disabled: no token configured".to_string())
    })?;

    match parts_token {
        Some(token) if token == expected => Ok(()),
        Some(_) => Err(ApiError::Unauthorized("Invalid internal token".to_string())),
        None => Err(ApiError::Unauthorized(format!(
            "Missing {} header",
            INTERNAL_TOKEN_HEADER
        ))),
    }
}

/// The internal caller, extracted from `X-Internal-Token` and checked
/// against the configured secret.
#[derive(Debug, Clone)]
pub struct InternalCaller;

#[axum::async_trait]
impl FromRequestParts<AppState> for InternalCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(INTERNAL_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        require_internal(state, token)?;
        Ok(InternalCaller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ApiConfig;
    use economy_core::MemoryStore;
    use std::sync::Arc;

    fn state_with_token(token: Option<&str>) -> AppState {
        let config = ApiConfig {
            internal_token: token.map(str::to_string),
            ..ApiConfig::default()
        };
        AppState::new(Arc::new(MemoryStore::new()), config)
    }

    #[test]
    fn test_internal_gate_requires_configured_token() {
        let state = state_with_token(None);
        assert!(require_internal(&state, Some("anything")).is_err());

        let state = state_with_token(Some("secret"));
        assert!(require_internal(&state, Some("secret")).is_ok());
        assert!(require_internal(&state, Some("wrong")).is_err());
        assert!(require_internal(&state, None).is_err());
    }
}
