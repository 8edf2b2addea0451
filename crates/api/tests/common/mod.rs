#![allow(dead_code)]

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceExt;

use onlyvalid_api::config::ServerConfig;
use onlyvalid_api::router::build_app_router;
use onlyvalid_api::state::AppState;
use onlyvalid_core::types::DbId;
use onlyvalid_db::models::user::CreateUser;
use onlyvalid_db::repositories::{CreditRepo, UserRepo};

pub const ENGINE_TOKEN: &str = "engine-test-token";
pub const ADMIN_TOKEN: &str = "admin-test-token";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        database_url: "postgres://localhost/onlyvalid_test".to_string(),
        engine_api_token: ENGINE_TOKEN.to_string(),
        admin_api_token: ADMIN_TOKEN.to_string(),
    }
}

pub fn test_state(pool: PgPool) -> AppState {
    AppState::new(pool, test_config())
}

/// Build the full application router with all middleware layers, using the
/// given database pool.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app_router(test_state(pool), &test_config())
}

/// Router over an existing state, so a test can inspect the registry and
/// connection manager behind it.
pub fn build_app_with_state(state: AppState) -> Router {
    build_app_router(state, &test_config())
}

/// A pool that never connects unless queried. For relay tests that do not
/// touch the database.
pub fn lazy_pool() -> PgPool {
    PgPoolOptions::new()
        .connect_lazy("postgres://localhost/onlyvalid_unused")
        .unwrap()
}

/// Serve the app on an ephemeral local port.
pub async fn spawn_server(state: AppState) -> SocketAddr {
    let app = build_app_with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Insert a user and, when `credits > 0`, grant them that balance.
pub async fn create_user_with_credits(pool: &PgPool, email: &str, credits: i64) -> DbId {
    let user = UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            name: None,
        },
    )
    .await
    .unwrap();
    if credits > 0 {
        CreditRepo::adjust(pool, user.id, credits, Some("test grant"))
            .await
            .unwrap();
    }
    user.id
}
