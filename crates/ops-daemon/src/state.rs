//! Shared runtime state for ops-daemon.
//!
//! All types here are `Clone`-able (via `Arc` or copy). Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async itself.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::broadcast;

use ops_config::EngineConfig;
use ops_runtime::{Supervisor, SyncEngine};
use ops_webhook::WebhookThrottle;

// ---------------------------------------------------------------------------
// BusMsg — SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    JobEvent { item_id: i64, status: String },
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub pool: PgPool,
    pub cfg: EngineConfig,
    pub engine: SyncEngine,
    pub supervisor: Arc<Supervisor>,
    pub webhook_throttle: Arc<WebhookThrottle>,
}

impl AppState {
    pub fn new(engine: SyncEngine, supervisor: Arc<Supervisor>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        let throttle_ms = engine.cfg.sync.webhook_min_spacing_ms;

        Self {
            bus,
            build: BuildInfo {
                service: "ops-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            pool: engine.pool.clone(),
            cfg: engine.cfg.clone(),
            engine,
            supervisor,
            webhook_throttle: Arc::new(WebhookThrottle::new(Duration::from_millis(throttle_ms))),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
