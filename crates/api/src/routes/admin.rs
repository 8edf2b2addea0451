//! Route definitions for `/admin`. All endpoints require the admin token.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// ```text
/// GET    /users                          -> list_users
/// POST   /users/{id}/credits             -> adjust_credits
/// GET    /promo-codes                    -> list_promo_codes
/// POST   /promo-codes                    -> create_promo_code
/// POST   /promo-codes/{id}/deactivate    -> deactivate_promo_code
/// GET    /stats                          -> stats
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}/credits", post(admin::adjust_credits))
        .route(
            "/promo-codes",
            get(admin::list_promo_codes).post(admin::create_promo_code),
        )
        .route(
            "/promo-codes/{id}/deactivate",
            post(admin::deactivate_promo_code),
        )
        .route("/stats", get(admin::stats))
}
