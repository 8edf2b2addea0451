pub mod admin;
pub mod engine;
pub mod health;
pub mod jobs;
pub mod users;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws                                      job progress relay (WebSocket)
///
/// /users                                   create
/// /users/{id}                              get
/// /users/{id}/transactions                 credit ledger
/// /users/{id}/promo-redemptions            redeem a promo code
///
/// /jobs                                    list, create
/// /jobs/{id}                               get
/// /jobs/{id}/export                        results as CSV
///
/// /engine/jobs/{id}/progress               relay progress (engine token)
/// /engine/jobs/{id}/completed              relay completion
/// /engine/jobs/{id}/failed                 relay failure
/// /engine/jobs/{id}/results                store per-address results
///
/// /admin/users                             list (admin token)
/// /admin/users/{id}/credits                adjust balance
/// /admin/promo-codes                       list, create
/// /admin/promo-codes/{id}/deactivate       deactivate
/// /admin/stats                             dashboard counters
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/users", users::router())
        .nest("/jobs", jobs::router())
        .nest("/engine", engine::router())
        .nest("/admin", admin::router())
}
