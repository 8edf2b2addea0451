//! Route definitions for the `/users` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::users;
use crate::state::AppState;

/// Routes mounted at `/users`.
///
/// ```text
/// POST   /                          -> create_user
/// GET    /{id}                      -> get_user
/// GET    /{id}/transactions         -> list_transactions
/// POST   /{id}/promo-redemptions    -> redeem_promo
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(users::create_user))
        .route("/{id}", get(users::get_user))
        .route("/{id}/transactions", get(users::list_transactions))
        .route("/{id}/promo-redemptions", post(users::redeem_promo))
}
