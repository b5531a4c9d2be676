// crates/ops-db/src/lib.rs
use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

pub const ENV_DB_URL: &str = "OPS_DATABASE_URL";

mod change_log;
mod dry_run;
mod gate;
mod item_sync;
mod queue;
mod vendor;

pub use change_log::{insert_change_log, recent_changes, ChangeLogRow, NewChange};
pub use dry_run::{insert_dry_run, latest_dry_run_for_item};
pub use gate::SyncGate;
pub use item_sync::{
    item_sync_fetch, item_sync_mark, item_sync_set_prices, ItemSyncRow, NewItemSyncMark,
};
pub use queue::{
    claim_next, enqueue, fetch_job, has_open_job_for_item, mark_completed, mark_failed,
    queue_stats, reclaim_stale, schedule_retry, status_breakdown, NewJob, QueueStats,
    StatusBreakdown, SyncJobRow,
};
pub use vendor::{MappingStats, VendorMapper};

/// Connect to Postgres using OPS_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Test helper used by integration tests:
/// - Connect using OPS_DATABASE_URL
/// - Ensure engine migrations are applied
pub async fn testkit_db_pool() -> Result<PgPool> {
    let pool = connect_from_env().await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Run embedded SQLx migrations (engine-owned tables only; the OPMS catalog
/// schema is owned elsewhere and never migrated from here).
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='opms_sync_queue'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok,
        has_queue_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_queue_table: bool,
}
