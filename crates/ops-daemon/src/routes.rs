//! Axum router and all HTTP handlers for ops-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and
//! attaches middleware layers. Handlers are `pub(crate)` so the scenario
//! tests in `tests/` can compose the router directly.

use std::{convert::Infallible, sync::Arc, time::Instant};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use ops_detect::{trigger_item, trigger_product, ManualTriggerOutcome};
use ops_runtime::{dry_run, DryRunResult};
use ops_schemas::{ManualOpts, PricingWebhook, Priority};
use ops_webhook::{apply, WebhookError};

use crate::{
    api_types::{
        DryRunRequest, DryRunResponse, ErrorResponse, HealthResponse, StatusResponse,
        TriggerItemRequest, TriggerItemResponse, TriggerProductItem, TriggerProductRequest,
        TriggerProductResponse, WebhookResponse,
    },
    state::{uptime_secs, AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/sync/pause", post(sync_pause))
        .route("/v1/sync/resume", post(sync_resume))
        .route("/v1/sync/trigger/item", post(sync_trigger_item))
        .route("/v1/sync/trigger/product", post(sync_trigger_product))
        .route("/v1/sync/dry-run", post(sync_dry_run))
        .route("/v1/sync/dry-run/:item_id", get(dry_run_latest))
        .route("/v1/changes", get(changes))
        .route("/v1/webhook/pricing", post(webhook_pricing))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let health = st.supervisor.health().await;
    let sync_enabled = st.engine.gate.is_enabled(&st.pool).await;
    // Both stats degrade to zeros on DB trouble rather than failing status.
    let queue_activity = ops_db::queue_stats(&st.pool, 60).await.unwrap_or_default();
    let vendor_mapping = st.engine.mapper.stats(&st.pool).await.unwrap_or_default();

    (
        StatusCode::OK,
        Json(StatusResponse {
            daemon_uptime_secs: uptime_secs(),
            config_hash: st.cfg.config_hash.clone(),
            sync_enabled,
            paused: st.supervisor.is_paused(),
            health,
            queue_activity,
            vendor_mapping,
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/sync/pause | resume
// ---------------------------------------------------------------------------

pub(crate) async fn sync_pause(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    st.supervisor.pause();
    info!("sync/pause");
    let _ = st.bus.send(BusMsg::LogLine {
        level: "WARN".to_string(),
        msg: "sync PAUSED by operator".to_string(),
    });
    (StatusCode::OK, Json(serde_json::json!({"paused": true})))
}

pub(crate) async fn sync_resume(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    st.supervisor.resume();
    info!("sync/resume");
    let _ = st.bus.send(BusMsg::LogLine {
        level: "INFO".to_string(),
        msg: "sync resumed by operator".to_string(),
    });
    (StatusCode::OK, Json(serde_json::json!({"paused": false})))
}

// ---------------------------------------------------------------------------
// POST /v1/sync/trigger/item
// ---------------------------------------------------------------------------

fn outcome_label(outcome: &ManualTriggerOutcome) -> (String, Option<i64>) {
    match outcome {
        ManualTriggerOutcome::Enqueued { job_id } => ("enqueued".to_string(), Some(*job_id)),
        ManualTriggerOutcome::AlreadyQueued => ("already_queued".to_string(), None),
        ManualTriggerOutcome::Rejected(r) => (format!("rejected: {}", r.message()), None),
    }
}

pub(crate) async fn sync_trigger_item(
    State(st): State<Arc<AppState>>,
    Json(body): Json<TriggerItemRequest>,
) -> Response {
    let opts = ManualOpts {
        triggered_by: body.triggered_by,
        reason: body.reason,
        env_override: body.env_override,
        live_sync: body.live_sync,
        config_override: body.config_override,
    };

    match trigger_item(
        &st.pool,
        &st.engine.gate,
        body.item_id,
        opts,
        st.cfg.sync.max_retries as i32,
    )
    .await
    {
        Ok(outcome) => {
            let (label, job_id) = outcome_label(&outcome);
            let _ = st.bus.send(BusMsg::JobEvent {
                item_id: body.item_id,
                status: label.clone(),
            });
            (
                StatusCode::OK,
                Json(TriggerItemResponse {
                    outcome: label,
                    job_id,
                }),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/sync/trigger/product
// ---------------------------------------------------------------------------

pub(crate) async fn sync_trigger_product(
    State(st): State<Arc<AppState>>,
    Json(body): Json<TriggerProductRequest>,
) -> Response {
    let opts = ManualOpts {
        triggered_by: body.triggered_by,
        reason: body.reason,
        env_override: body.env_override,
        live_sync: body.live_sync,
        config_override: body.config_override,
    };

    match trigger_product(
        &st.pool,
        &st.engine.gate,
        body.product_id,
        body.priority.unwrap_or(Priority::Normal),
        opts,
        st.cfg.sync.max_retries as i32,
    )
    .await
    {
        Ok(outcomes) => {
            let items: Vec<TriggerProductItem> = outcomes
                .iter()
                .map(|(item_id, o)| {
                    let (label, job_id) = outcome_label(o);
                    TriggerProductItem {
                        item_id: *item_id,
                        outcome: label,
                        job_id,
                    }
                })
                .collect();
            let enqueued = items.iter().filter(|i| i.job_id.is_some()).count();
            (
                StatusCode::OK,
                Json(TriggerProductResponse { items, enqueued }),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/sync/dry-run
// ---------------------------------------------------------------------------

pub(crate) async fn sync_dry_run(
    State(st): State<Arc<AppState>>,
    Json(body): Json<DryRunRequest>,
) -> Response {
    let environment = body.environment.unwrap_or(st.cfg.erp.environment);
    match dry_run(
        &st.pool,
        &st.engine.mapper,
        body.item_id,
        environment,
        &st.cfg.erp.tax_schedule_id,
    )
    .await
    {
        Ok(DryRunResult::Simulated(rec)) => (
            StatusCode::OK,
            Json(DryRunResponse {
                simulated: true,
                skip_reason: None,
                payload: Some(rec.payload),
            }),
        )
            .into_response(),
        Ok(DryRunResult::NotSyncable { reason }) => (
            StatusCode::OK,
            Json(DryRunResponse {
                simulated: false,
                skip_reason: Some(reason),
                payload: None,
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/sync/dry-run/:item_id — latest stored record
// ---------------------------------------------------------------------------

pub(crate) async fn dry_run_latest(
    State(st): State<Arc<AppState>>,
    Path(item_id): Path<i64>,
) -> Response {
    match ops_db::latest_dry_run_for_item(&st.pool, item_id).await {
        Ok(Some(rec)) => (StatusCode::OK, Json(rec)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("no dry run recorded for item {item_id}"),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/changes — recent change-log entries
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
pub(crate) struct ChangesQuery {
    limit: Option<i64>,
}

pub(crate) async fn changes(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ChangesQuery>,
) -> Response {
    let limit = q.limit.unwrap_or(50).clamp(1, 500);
    match ops_db::recent_changes(&st.pool, limit).await {
        Ok(rows) => {
            let entries: Vec<serde_json::Value> = rows
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "id": r.id,
                        "item_id": r.item_id,
                        "product_id": r.product_id,
                        "provenance": r.provenance,
                        "change_fields": r.change_fields,
                        "detected_at": r.detected_at,
                    })
                })
                .collect();
            (StatusCode::OK, Json(serde_json::json!({"changes": entries}))).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/webhook/pricing
// ---------------------------------------------------------------------------

pub(crate) async fn webhook_pricing(
    State(st): State<Arc<AppState>>,
    Json(body): Json<PricingWebhook>,
) -> Response {
    // ERP callback pacing: hold distinct webhooks at least a second apart.
    let wait = st.webhook_throttle.required_delay(Instant::now());
    if !wait.is_zero() {
        tokio::time::sleep(wait).await;
    }
    st.webhook_throttle.record(Instant::now());

    match apply(&st.pool, &body).await {
        Ok(outcome) => {
            if let Some(item_id) = outcome.item_id {
                let _ = st.bus.send(BusMsg::JobEvent {
                    item_id,
                    status: "pricing_applied".to_string(),
                });
            }
            (StatusCode::OK, Json(WebhookResponse { outcome })).into_response()
        }
        Err(WebhookError::Invalid(msg)) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse { error: msg }),
        )
            .into_response(),
        Err(WebhookError::UnknownItem(code)) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("item {code} not found or not active"),
            }),
        )
            .into_response(),
        Err(WebhookError::Db(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::JobEvent { .. } => "job",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
