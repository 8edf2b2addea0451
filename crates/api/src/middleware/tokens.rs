//! Static bearer-token extractors.
//!
//! End-user authentication lives outside this service. Two machine callers
//! authenticate here: the verification engine on the ingest endpoints and
//! the admin dashboard on `/admin`. Each presents a shared token configured
//! through the environment.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use onlyvalid_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// Caller presented `ENGINE_API_TOKEN`.
///
/// ```ignore
/// async fn ingest(_: RequireEngine, ...) -> AppResult<...> { ... }
/// ```
pub struct RequireEngine;

/// Caller presented `ADMIN_API_TOKEN`.
pub struct RequireAdmin;

impl FromRequestParts<AppState> for RequireEngine {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        check_bearer(parts, &state.config.engine_api_token)?;
        Ok(RequireEngine)
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        check_bearer(parts, &state.config.admin_api_token)?;
        Ok(RequireAdmin)
    }
}

fn check_bearer(parts: &Parts, expected: &str) -> Result<(), AppError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Missing Authorization header".into(),
            ))
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Core(CoreError::Unauthorized(
            "Invalid Authorization format. Expected: Bearer <token>".into(),
        ))
    })?;

    if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        return Err(AppError::Core(CoreError::Unauthorized(
            "Invalid API token".into(),
        )));
    }
    Ok(())
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret-longer"));
        assert!(!constant_time_eq(b"", b"x"));
    }
}
