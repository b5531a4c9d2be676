//! The supervisor: owns component lifecycle, pause/resume, health, and
//! graceful shutdown.
//!
//! Three cooperative tasks run under it — the dispatcher, the polling
//! backup detector, and the health timer. They communicate through the
//! queue and shared flags, never in-memory channels, so every durable
//! decision survives a restart. A component fault never crashes the
//! supervisor; the dispatcher gets a bounded error budget and after that
//! the engine reports itself down until an operator intervenes.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use sqlx::PgPool;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use ops_config::EngineConfig;
use ops_db::{status_breakdown, StatusBreakdown, SyncGate, VendorMapper};
use ops_detect::{poll_once, verify_triggers, TriggerHealth};
use ops_erp::ErpApi;

use crate::dispatch::Dispatcher;

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    /// Operating, but something is off (missing triggers, dispatcher
    /// errors short of the budget).
    Degraded,
    Down,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthReport {
    pub state: HealthState,
    pub db_ok: bool,
    pub item_trigger: bool,
    pub product_trigger: bool,
    pub queue_pending: i64,
    pub queue_processing: i64,
    pub queue_completed: i64,
    pub queue_failed: i64,
    pub dispatcher_errors: u32,
    pub dispatcher_down: bool,
    pub paused: bool,
    pub last_dispatch_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// SyncEngine
// ---------------------------------------------------------------------------

/// Explicit handle to the engine's shared collaborators. Passed around
/// rather than living in module globals; the supervisor is the only
/// process-wide owner and holds it for the process lifetime.
#[derive(Clone)]
pub struct SyncEngine {
    pub pool: PgPool,
    pub cfg: EngineConfig,
    pub gate: Arc<SyncGate>,
    pub mapper: Arc<VendorMapper>,
}

impl SyncEngine {
    pub fn new(pool: PgPool, cfg: EngineConfig) -> Self {
        Self {
            pool,
            cfg,
            gate: Arc::new(SyncGate::new()),
            mapper: Arc::new(VendorMapper::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

struct Shared {
    engine: SyncEngine,
    paused: AtomicBool,
    dispatcher_errors: AtomicU32,
    dispatcher_down: AtomicBool,
    /// Epoch millis of the last processed job; 0 = never.
    last_dispatch_ms: AtomicI64,
    poll_watermark: Mutex<DateTime<Utc>>,
    latest_health: RwLock<Option<HealthReport>>,
}

pub struct Supervisor {
    shared: Arc<Shared>,
    stop_tx: watch::Sender<bool>,
    /// Drained by `shutdown`; the supervisor is shareable behind an `Arc`.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Supervisor {
    /// Initialize components and spawn the three tasks. Trigger presence is
    /// verified once at startup (missing triggers log and degrade health).
    pub async fn start<E>(engine: SyncEngine, erp: E) -> Self
    where
        E: ErpApi + Send + Sync + 'static,
    {
        let (stop_tx, _) = watch::channel(false);

        // Startup verification; the result also flows into every health
        // report, this one is for the boot log.
        match verify_triggers(&engine.pool).await {
            Ok(h) if h.is_healthy() => info!("catalog sync triggers verified"),
            Ok(_) => warn!("starting degraded: catalog sync triggers incomplete"),
            Err(e) => warn!(error = %e, "trigger verification failed at startup"),
        }

        let poll_start = Utc::now() - chrono::Duration::seconds(engine.cfg.sync.poll_interval_secs as i64);
        let shared = Arc::new(Shared {
            engine: engine.clone(),
            paused: AtomicBool::new(false),
            dispatcher_errors: AtomicU32::new(0),
            dispatcher_down: AtomicBool::new(false),
            last_dispatch_ms: AtomicI64::new(0),
            poll_watermark: Mutex::new(poll_start),
            latest_health: RwLock::new(None),
        });

        let dispatcher = spawn_dispatcher(Arc::clone(&shared), erp, stop_tx.subscribe());
        let poller = spawn_poller(Arc::clone(&shared), stop_tx.subscribe());
        let health = spawn_health(Arc::clone(&shared), stop_tx.subscribe());

        Self {
            shared,
            stop_tx,
            tasks: Mutex::new(vec![dispatcher, poller, health]),
        }
    }

    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::SeqCst);
        info!("sync engine paused");
    }

    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::SeqCst);
        info!("sync engine resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    /// Most recent health report, or a freshly computed one before the
    /// first timer tick.
    pub async fn health(&self) -> HealthReport {
        if let Some(h) = self.shared.latest_health.read().await.clone() {
            return h;
        }
        compute_health(&self.shared).await
    }

    /// Graceful stop: signal, then wait up to the grace window for the
    /// dispatcher to finish its in-flight job. After the window the tasks
    /// are aborted; a job left in PROCESSING is reclaimed by the lease TTL
    /// on next startup. Idempotent — a second call finds no tasks.
    pub async fn shutdown(&self) {
        let grace = Duration::from_secs(self.shared.engine.cfg.sync.shutdown_grace_secs);
        let _ = self.stop_tx.send(true);

        let mut tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        let aborts: Vec<_> = tasks.iter().map(|t| t.abort_handle()).collect();

        let joined = tokio::time::timeout(grace, async {
            for t in &mut tasks {
                let _ = t.await;
            }
        })
        .await;

        if joined.is_err() {
            warn!("graceful shutdown window expired; aborting tasks");
            for a in aborts {
                a.abort();
            }
        }
        info!("sync engine stopped");
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

fn spawn_dispatcher<E>(
    shared: Arc<Shared>,
    erp: E,
    mut stop_rx: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    E: ErpApi + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let engine = &shared.engine;
        let mut dispatcher = Dispatcher::new(
            engine.pool.clone(),
            Arc::clone(&engine.gate),
            Arc::clone(&engine.mapper),
            erp,
            engine.cfg.clone(),
        );
        let interval = Duration::from_secs(engine.cfg.sync.dispatch_interval_secs);
        let error_budget = engine.cfg.sync.supervisor_max_restarts;

        loop {
            if *stop_rx.borrow() {
                break;
            }

            let mut processed = false;
            if !shared.paused.load(Ordering::SeqCst) {
                match dispatcher.run_once().await {
                    Ok(did) => {
                        processed = did;
                        if did {
                            shared
                                .last_dispatch_ms
                                .store(Utc::now().timestamp_millis(), Ordering::SeqCst);
                        }
                    }
                    Err(e) => {
                        let n = shared.dispatcher_errors.fetch_add(1, Ordering::SeqCst) + 1;
                        error!(error = %e, consecutive = n, "dispatcher iteration error");
                        if n > error_budget {
                            shared.dispatcher_down.store(true, Ordering::SeqCst);
                            error!("dispatcher error budget exhausted; staying down");
                            break;
                        }
                    }
                }
            }

            // Drain immediately while work is flowing; otherwise sleep one
            // interval, waking early on stop.
            if !processed {
                tokio::select! {
                    _ = stop_rx.changed() => {}
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }
        info!("dispatcher task exited");
    })
}

fn spawn_poller(shared: Arc<Shared>, mut stop_rx: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let engine = &shared.engine;
        let interval = Duration::from_secs(engine.cfg.sync.poll_interval_secs);

        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            if *stop_rx.borrow() {
                break;
            }
            if shared.paused.load(Ordering::SeqCst) {
                continue;
            }

            let watermark = *shared.poll_watermark.lock().await;
            match poll_once(
                &engine.pool,
                &engine.gate,
                watermark,
                engine.cfg.sync.poll_batch_limit as i64,
                engine.cfg.sync.max_retries as i32,
            )
            .await
            {
                Ok(outcome) => {
                    *shared.poll_watermark.lock().await = outcome.new_watermark;
                }
                Err(e) => {
                    warn!(error = %e, "poll tick failed");
                }
            }
        }
        info!("poller task exited");
    })
}

fn spawn_health(shared: Arc<Shared>, mut stop_rx: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = tokio::time::sleep(Duration::from_secs(30)) => {}
            }
            if *stop_rx.borrow() {
                break;
            }
            let report = compute_health(&shared).await;
            *shared.latest_health.write().await = Some(report);
        }
    })
}

async fn compute_health(shared: &Shared) -> HealthReport {
    let engine = &shared.engine;

    let db_ok = ops_db::status(&engine.pool).await.map(|s| s.ok).unwrap_or(false);
    let triggers = verify_triggers(&engine.pool)
        .await
        .unwrap_or(TriggerHealth {
            item_trigger: false,
            product_trigger: false,
        });
    let queue = if db_ok {
        status_breakdown(&engine.pool).await.unwrap_or_default()
    } else {
        StatusBreakdown::default()
    };

    let errors = shared.dispatcher_errors.load(Ordering::SeqCst);
    let down = shared.dispatcher_down.load(Ordering::SeqCst);
    let last_ms = shared.last_dispatch_ms.load(Ordering::SeqCst);

    let state = if !db_ok || down {
        HealthState::Down
    } else if !triggers.is_healthy() || errors > 0 {
        HealthState::Degraded
    } else {
        HealthState::Healthy
    };

    HealthReport {
        state,
        db_ok,
        item_trigger: triggers.item_trigger,
        product_trigger: triggers.product_trigger,
        queue_pending: queue.pending,
        queue_processing: queue.processing,
        queue_completed: queue.completed,
        queue_failed: queue.failed,
        dispatcher_errors: errors,
        dispatcher_down: down,
        paused: shared.paused.load(Ordering::SeqCst),
        last_dispatch_at: if last_ms > 0 {
            Utc.timestamp_millis_opt(last_ms).single()
        } else {
            None
        },
    }
}
