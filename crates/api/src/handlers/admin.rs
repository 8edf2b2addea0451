//! Admin dashboard handlers. Every endpoint requires [`RequireAdmin`].

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use onlyvalid_core::error::CoreError;
use onlyvalid_core::promo::{generate_code, normalize_code};
use onlyvalid_core::types::DbId;
use onlyvalid_db::models::credit_transaction::{AdjustCredits, AdjustOutcome};
use onlyvalid_db::models::promo_code::CreatePromoCode;
use onlyvalid_db::models::stats::DatabaseStats;
use onlyvalid_db::repositories::{CreditRepo, PromoCodeRepo, StatsRepo, UserRepo};
use serde::Serialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::tokens::RequireAdmin;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Users and credits
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/users
pub async fn list_users(
    _: RequireAdmin,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let users = UserRepo::list(&state.pool, params.limit, params.offset).await?;
    Ok(Json(DataResponse { data: users }))
}

/// POST /api/v1/admin/users/{id}/credits
///
/// Apply a signed adjustment. The balance may not go negative (402).
pub async fn adjust_credits(
    _: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<AdjustCredits>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    match CreditRepo::adjust(&state.pool, id, input.amount, input.note.as_deref()).await? {
        AdjustOutcome::Adjusted(change) => {
            tracing::info!(
                user_id = id,
                amount = input.amount,
                balance = change.balance,
                "Credits adjusted by admin"
            );
            Ok(Json(DataResponse { data: change }))
        }
        AdjustOutcome::UnknownUser => Err(AppError::Core(CoreError::not_found("User", id))),
        AdjustOutcome::Rejected(err) => Err(AppError::Core(err)),
    }
}

// ---------------------------------------------------------------------------
// Promo codes
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/promo-codes
pub async fn list_promo_codes(
    _: RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let codes = PromoCodeRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: codes }))
}

/// POST /api/v1/admin/promo-codes
///
/// Creates a code; a random one is generated when `code` is omitted.
/// Duplicate codes are rejected with 409.
pub async fn create_promo_code(
    _: RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CreatePromoCode>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let code = match input.code.as_deref() {
        Some(raw) => normalize_code(raw)?,
        None => generate_code(),
    };

    let promo = PromoCodeRepo::create(&state.pool, &code, &input).await?;
    tracing::info!(promo_code_id = promo.id, code = %promo.code, credits = promo.credits, "Promo code created");

    Ok((StatusCode::CREATED, Json(DataResponse { data: promo })))
}

/// POST /api/v1/admin/promo-codes/{id}/deactivate
pub async fn deactivate_promo_code(
    _: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let promo = PromoCodeRepo::deactivate(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::not_found("PromoCode", id)))?;
    tracing::info!(promo_code_id = id, "Promo code deactivated");
    Ok(Json(DataResponse { data: promo }))
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct AdminStats {
    #[serde(flatten)]
    pub database: DatabaseStats,
    /// Job channels with at least one subscriber.
    pub active_channels: usize,
    pub open_connections: usize,
}

/// GET /api/v1/admin/stats
pub async fn stats(
    _: RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let database = StatsRepo::database_stats(&state.pool).await?;
    Ok(Json(DataResponse {
        data: AdminStats {
            database,
            active_channels: state.registry.channel_count().await,
            open_connections: state.ws_manager.connection_count().await,
        },
    }))
}
