//! Scenario: daemon route surface without a live database.
//!
//! The pool is lazy, so routes that validate before touching Postgres can
//! be exercised in-process with `tower::ServiceExt::oneshot`. Routes whose
//! behavior depends on the DB are covered by the DB-gated scenarios in
//! ops-testkit.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use ops_config::EngineConfig;
use ops_daemon::{routes, state::AppState};
use ops_runtime::{Supervisor, SyncEngine};
use ops_testkit::FakeErp;

async fn test_state() -> Arc<AppState> {
    let loaded = ops_config::load_layered_with_env(&[], &[]).unwrap();
    let cfg = EngineConfig::from_loaded(&loaded);

    // Lazy pool: no connection is attempted until a query runs.
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy("postgres://localhost:1/never_connects")
        .unwrap();

    let engine = SyncEngine::new(pool, cfg);
    let supervisor = Arc::new(Supervisor::start(engine.clone(), FakeErp::new()).await);
    Arc::new(AppState::new(engine, supervisor))
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_service_and_version() {
    let app = routes::build_router(test_state().await);
    let resp = app
        .oneshot(Request::get("/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["ok"], true);
    assert_eq!(v["service"], "ops-daemon");
}

#[tokio::test]
async fn status_degrades_gracefully_without_db() {
    let app = routes::build_router(test_state().await);
    let resp = app
        .oneshot(Request::get("/v1/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    // Gate fails closed; health reports the DB as unreachable.
    assert_eq!(v["sync_enabled"], false);
    assert_eq!(v["health"]["db_ok"], false);
    assert_eq!(v["health"]["state"], "down");
}

#[tokio::test]
async fn pause_and_resume_flip_the_flag() {
    let st = test_state().await;

    let resp = routes::build_router(Arc::clone(&st))
        .oneshot(Request::post("/v1/sync/pause").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(st.supervisor.is_paused());

    let resp = routes::build_router(Arc::clone(&st))
        .oneshot(Request::post("/v1/sync/resume").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!st.supervisor.is_paused());
}

#[tokio::test]
async fn webhook_missing_identity_is_rejected_before_any_db_access() {
    let app = routes::build_router(test_state().await);
    let resp = app
        .oneshot(
            Request::post("/v1/webhook/pricing")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"baseprice": "129.99"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = body_json(resp).await;
    assert!(v["error"].as_str().unwrap().contains("itemid"));
}

#[tokio::test]
async fn webhook_protected_item_skips_without_touching_opms() {
    let app = routes::build_router(test_state().await);
    // The pool cannot connect, so a skipped=true response proves the guard
    // fired before any OPMS access.
    let resp = app
        .oneshot(
            Request::post("/v1/webhook/pricing")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"itemid": "1354-6543", "internalid": "991",
                        "custitem_opms_protected": "T", "baseprice": "129.99"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["success"], true);
    assert_eq!(v["skipped"], true);
}

#[tokio::test]
async fn webhook_out_of_range_price_is_rejected() {
    let app = routes::build_router(test_state().await);
    let resp = app
        .oneshot(
            Request::post("/v1/webhook/pricing")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"itemid": "1354-6543", "internalid": "991", "baseprice": 1000000.0}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = body_json(resp).await;
    assert!(v["error"].as_str().unwrap().contains("range"));
}
