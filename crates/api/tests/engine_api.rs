//! Integration tests for the verification engine ingest endpoints.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, post_json, post_json_auth, send, ADMIN_TOKEN, ENGINE_TOKEN};
use onlyvalid_core::job_events::JobEvent;
use onlyvalid_core::types::JobId;
use onlyvalid_db::repositories::{CreditRepo, JobRepo, JobResultRepo, UserRepo};
use onlyvalid_events::JobPersistence;
use serde_json::{json, Value};
use sqlx::PgPool;

fn counters(total: i64, processed: i64) -> Value {
    json!({
        "total": total,
        "processed": processed,
        "valid": processed,
        "invalid": 0,
        "unknown": 0,
    })
}

/// Create a job through the API and return its id.
async fn create_job(pool: &PgPool, user_id: i64, total: i64) -> String {
    let app = common::build_test_app(pool.clone());
    let response = post_json(
        app,
        "/api/v1/jobs",
        json!({ "user_id": user_id, "total_emails": total }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}

// ---------------------------------------------------------------------------
// Relay endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn progress_without_subscribers_is_accepted() {
    let app = common::build_test_app(common::lazy_pool());
    let response = post_json_auth(
        app,
        "/api/v1/engine/jobs/not-in-db/progress",
        counters(10, 3),
        ENGINE_TOKEN,
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["delivered"], 0);
}

#[tokio::test]
async fn ingest_requires_engine_token() {
    let app = common::build_test_app(common::lazy_pool());
    let response = post_json(app, "/api/v1/engine/jobs/j/progress", counters(1, 0)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let app = common::build_test_app(common::lazy_pool());
    let response = post_json_auth(
        app,
        "/api/v1/engine/jobs/j/progress",
        counters(1, 0),
        ADMIN_TOKEN,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn impossible_counters_are_rejected() {
    let app = common::build_test_app(common::lazy_pool());
    let response = post_json_auth(
        app,
        "/api/v1/engine/jobs/j/progress",
        counters(2, 5),
        ENGINE_TOKEN,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn empty_failure_message_is_rejected() {
    let app = common::build_test_app(common::lazy_pool());
    let response = post_json_auth(
        app,
        "/api/v1/engine/jobs/j/failed",
        json!({ "error": "" }),
        ENGINE_TOKEN,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn reported_events_are_published_on_the_bus(pool: PgPool) {
    let state = common::test_state(pool);
    let mut bus = state.event_bus.subscribe();
    let app = common::build_app_with_state(state);

    let response = post_json_auth(
        app,
        "/api/v1/engine/jobs/job-5/failed",
        json!({ "error": "Upstream resolver timed out" }),
        ENGINE_TOKEN,
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    match bus.recv().await.unwrap() {
        JobEvent::Failed(e) => {
            assert_eq!(e.job_id, JobId::from("job-5"));
            assert_eq!(e.error, "Upstream resolver timed out");
        }
        other => panic!("Expected failure event, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn results_are_stored_for_existing_job(pool: PgPool) {
    let user_id = common::create_user_with_credits(&pool, "ada@example.com", 10).await;
    let job_id = create_job(&pool, user_id, 2).await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/engine/jobs/{job_id}/results"),
        json!([
            { "email": "a@example.com", "outcome": "valid" },
            { "email": "b@example.com", "outcome": "risky", "reason": "catch-all domain" },
        ]),
        ENGINE_TOKEN,
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["data"]["stored"], 2);

    let stored = JobResultRepo::list_for_job(&pool, &JobId::from(job_id.as_str()), None)
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].reason.as_deref(), Some("catch-all domain"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn results_for_unknown_job_return_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_json_auth(
        app,
        "/api/v1/engine/jobs/missing/results",
        json!([{ "email": "a@example.com", "outcome": "valid" }]),
        ENGINE_TOKEN,
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn results_with_unknown_outcome_are_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = send(
        app,
        Method::POST,
        "/api/v1/engine/jobs/any/results",
        Some(ENGINE_TOKEN),
        Some(json!([{ "email": "a@example.com", "outcome": "bounced" }])),
    )
    .await;

    assert!(response.status().is_client_error());
}

// ---------------------------------------------------------------------------
// Persistence of relayed events
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn relayed_progress_is_persisted(pool: PgPool) {
    let user_id = common::create_user_with_credits(&pool, "ada@example.com", 10).await;
    let job_id = create_job(&pool, user_id, 4).await;

    let state = common::test_state(pool.clone());
    let mut bus = state.event_bus.subscribe();
    let app = common::build_app_with_state(state);
    let response = post_json_auth(
        app,
        &format!("/api/v1/engine/jobs/{job_id}/progress"),
        counters(4, 1),
        ENGINE_TOKEN,
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let event = bus.recv().await.unwrap();
    JobPersistence::persist(&pool, &event).await.unwrap();

    let job = JobRepo::find_by_id(&pool, &JobId::from(job_id.as_str()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, "PROCESSING");
    assert_eq!(job.processed, 1);
    assert_eq!(job.percentage, 25);
    assert!(job.started_at.is_some());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn failure_refunds_unprocessed_addresses(pool: PgPool) {
    let user_id = common::create_user_with_credits(&pool, "ada@example.com", 10).await;
    let job_id = create_job(&pool, user_id, 8).await;
    let job = JobId::from(job_id.as_str());

    JobPersistence::persist(
        &pool,
        &JobEvent::progress(
            job.clone(),
            serde_json::from_value(counters(8, 3)).unwrap(),
        ),
    )
    .await
    .unwrap();
    JobPersistence::persist(&pool, &JobEvent::failed(job.clone(), "engine crashed"))
        .await
        .unwrap();

    let stored = JobRepo::find_by_id(&pool, &job).await.unwrap().unwrap();
    assert_eq!(stored.status, "FAILED");
    assert_eq!(stored.error_message.as_deref(), Some("engine crashed"));

    // 10 granted, 8 debited, 5 refunded.
    let user = UserRepo::find_by_id(&pool, user_id).await.unwrap().unwrap();
    assert_eq!(user.credits, 7);

    let ledger = CreditRepo::list_transactions(&pool, user_id, None, None)
        .await
        .unwrap();
    assert_eq!(ledger[0].kind, "refund");
    assert_eq!(ledger[0].amount, 5);
    assert_eq!(ledger[0].job_id.as_deref(), Some(job_id.as_str()));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn completion_report_is_stored_before_relaying(pool: PgPool) {
    let user_id = common::create_user_with_credits(&pool, "ada@example.com", 10).await;
    let job_id = create_job(&pool, user_id, 4).await;

    let response = post_json_auth(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/engine/jobs/{job_id}/completed"),
        counters(4, 4),
        ENGINE_TOKEN,
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let job = JobRepo::find_by_id(&pool, &JobId::from(job_id.as_str()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, "COMPLETED");
    assert_eq!(job.processed, 4);
    assert_eq!(job.percentage, 100);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn failure_refund_does_not_depend_on_the_event_bus(pool: PgPool) {
    let user_id = common::create_user_with_credits(&pool, "ada@example.com", 10).await;
    let job_id = create_job(&pool, user_id, 8).await;
    let job = JobId::from(job_id.as_str());

    let state = common::test_state(pool.clone());
    // A consumer that never keeps up: the bus overwrites what it has not read.
    let mut stalled = state.event_bus.subscribe();
    for processed in 0..2_000 {
        state.event_bus.publish(JobEvent::progress(
            job.clone(),
            serde_json::from_value(counters(8, processed % 8)).unwrap(),
        ));
    }

    let response = post_json_auth(
        common::build_app_with_state(state),
        &format!("/api/v1/engine/jobs/{job_id}/failed"),
        json!({ "error": "engine crashed" }),
        ENGINE_TOKEN,
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(matches!(
        stalled.recv().await,
        Err(tokio::sync::broadcast::error::RecvError::Lagged(_))
    ));

    let stored = JobRepo::find_by_id(&pool, &job).await.unwrap().unwrap();
    assert_eq!(stored.status, "FAILED");

    // 10 granted, 8 debited, nothing processed, all 8 refunded.
    let user = UserRepo::find_by_id(&pool, user_id).await.unwrap().unwrap();
    assert_eq!(user.credits, 10);
    let ledger = CreditRepo::list_transactions(&pool, user_id, None, None)
        .await
        .unwrap();
    assert_eq!(ledger[0].kind, "refund");
    assert_eq!(ledger[0].amount, 8);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn events_after_terminal_are_not_persisted(pool: PgPool) {
    let user_id = common::create_user_with_credits(&pool, "ada@example.com", 10).await;
    let job_id = create_job(&pool, user_id, 2).await;
    let job = JobId::from(job_id.as_str());

    let done = serde_json::from_value(counters(2, 2)).unwrap();
    JobPersistence::persist(&pool, &JobEvent::completed(job.clone(), done))
        .await
        .unwrap();
    let late = serde_json::from_value(counters(2, 1)).unwrap();
    JobPersistence::persist(&pool, &JobEvent::progress(job.clone(), late))
        .await
        .unwrap();

    let stored = JobRepo::find_by_id(&pool, &job).await.unwrap().unwrap();
    assert_eq!(stored.status, "COMPLETED");
    assert_eq!(stored.processed, 2);
    assert!(stored.completed_at.is_some());
}
