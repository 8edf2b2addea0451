//! Handlers for the `/users` resource: accounts, ledger and promo
//! redemption.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use onlyvalid_core::error::CoreError;
use onlyvalid_core::promo::normalize_code;
use onlyvalid_core::types::DbId;
use onlyvalid_db::models::credit_transaction::{RedeemPromo, RedemptionOutcome};
use onlyvalid_db::models::user::{CreateUser, User};
use onlyvalid_db::repositories::{CreditRepo, UserRepo};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// Load a user or fail with 404.
pub(crate) async fn find_user(pool: &sqlx::PgPool, id: DbId) -> AppResult<User> {
    UserRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::not_found("User", id)))
}

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<CreateUser>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let user = UserRepo::create(&state.pool, &input).await?;

    tracing::info!(user_id = user.id, "User created");

    Ok((StatusCode::CREATED, Json(DataResponse { data: user })))
}

/// GET /api/v1/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let user = find_user(&state.pool, id).await?;
    Ok(Json(DataResponse { data: user }))
}

/// GET /api/v1/users/{id}/transactions
///
/// The user's credit ledger, newest first.
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    find_user(&state.pool, id).await?;
    let transactions =
        CreditRepo::list_transactions(&state.pool, id, params.limit, params.offset).await?;
    Ok(Json(DataResponse { data: transactions }))
}

/// POST /api/v1/users/{id}/promo-redemptions
///
/// Redeem a promo code. Returns 201 with the new balance and the ledger
/// row; 409 if this user already redeemed the code.
pub async fn redeem_promo(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<RedeemPromo>,
) -> AppResult<impl IntoResponse> {
    let code = normalize_code(&input.code)?;

    match CreditRepo::redeem_promo(&state.pool, id, &code).await? {
        RedemptionOutcome::Redeemed(change) => {
            tracing::info!(
                user_id = id,
                code = %code,
                balance = change.balance,
                "Promo code redeemed"
            );
            Ok((StatusCode::CREATED, Json(DataResponse { data: change })))
        }
        RedemptionOutcome::UnknownCode => {
            Err(AppError::Core(CoreError::not_found("PromoCode", code)))
        }
        RedemptionOutcome::UnknownUser => Err(AppError::Core(CoreError::not_found("User", id))),
        RedemptionOutcome::Rejected(rejection) => {
            tracing::debug!(user_id = id, code = %code, %rejection, "Promo redemption rejected");
            Err(AppError::Core(rejection.into()))
        }
    }
}
