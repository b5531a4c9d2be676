//! The durable job queue (`opms_sync_queue`).
//!
//! Claim semantics mirror a transactional outbox: `FOR UPDATE SKIP LOCKED`
//! plus a conditional PENDING → PROCESSING update, so concurrent claimants
//! can never own the same row. A partial unique index on `item_id` over
//! open rows guarantees at most one PENDING/PROCESSING job per item, which
//! is what lets the single dispatcher promise at-most-one in-flight upsert
//! per item.
//!
//! Rows are never deleted here; terminal rows are pruned by an external
//! housekeeping job.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};

use ops_schemas::{EventData, EventType, JobStatus, Priority};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SyncJobRow {
    pub id: i64,
    pub item_id: i64,
    pub product_id: i64,
    pub event_type: EventType,
    pub event_data: EventData,
    pub priority: Priority,
    pub status: JobStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by: Option<String>,
    pub last_error: Option<String>,
    pub processing_results: Option<Value>,
}

impl SyncJobRow {
    pub fn retries_left(&self) -> bool {
        self.retry_count < self.max_retries
    }

    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self> {
        let event_type: String = row.try_get("event_type")?;
        let status: String = row.try_get("status")?;
        let priority: String = row.try_get("priority")?;
        let event_data: Value = row.try_get("event_data")?;
        Ok(Self {
            id: row.try_get("id")?,
            item_id: row.try_get("item_id")?,
            product_id: row.try_get("product_id")?,
            event_type: EventType::parse(&event_type)?,
            event_data: serde_json::from_value(event_data).context("decode event_data")?,
            priority: Priority::parse(&priority)?,
            status: JobStatus::parse(&status)?,
            retry_count: row.try_get("retry_count")?,
            max_retries: row.try_get("max_retries")?,
            scheduled_at: row.try_get("scheduled_at")?,
            created_at: row.try_get("created_at")?,
            claimed_at: row.try_get("claimed_at")?,
            claimed_by: row.try_get("claimed_by")?,
            last_error: row.try_get("last_error")?,
            processing_results: row.try_get("processing_results")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub item_id: i64,
    pub product_id: i64,
    pub event_type: EventType,
    pub event_data: EventData,
    pub priority: Priority,
    pub max_retries: i32,
}

const SELECT_COLS: &str = "id, item_id, product_id, event_type, event_data, priority, status, \
                           retry_count, max_retries, scheduled_at, created_at, claimed_at, \
                           claimed_by, last_error, processing_results";

// ---------------------------------------------------------------------------
// Enqueue
// ---------------------------------------------------------------------------

/// Enqueue a job in PENDING.
///
/// Idempotent per item: if the item already has an open (PENDING or
/// PROCESSING) row, returns `Ok(None)` and does not create a second one.
pub async fn enqueue(pool: &PgPool, job: &NewJob) -> Result<Option<i64>> {
    let event_data = serde_json::to_value(&job.event_data).context("encode event_data")?;

    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        insert into opms_sync_queue
            (item_id, product_id, event_type, event_data, priority, status,
             retry_count, max_retries, scheduled_at)
        values ($1, $2, $3, $4, $5, 'PENDING', 0, $6, now())
        on conflict (item_id) where status in ('PENDING','PROCESSING') do nothing
        returning id
        "#,
    )
    .bind(job.item_id)
    .bind(job.product_id)
    .bind(job.event_type.as_str())
    .bind(event_data)
    .bind(job.priority.as_str())
    .bind(job.max_retries)
    .fetch_optional(pool)
    .await
    .context("enqueue failed")?;

    Ok(row.map(|(id,)| id))
}

/// True when the item already has a PENDING or PROCESSING row.
pub async fn has_open_job_for_item(pool: &PgPool, item_id: i64) -> Result<bool> {
    let (exists,): (bool,) = sqlx::query_as(
        r#"
        select exists (
            select 1 from opms_sync_queue
            where item_id = $1 and status in ('PENDING','PROCESSING')
        )
        "#,
    )
    .bind(item_id)
    .fetch_one(pool)
    .await
    .context("has_open_job_for_item failed")?;
    Ok(exists)
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

/// Atomically claim up to `batch_size` due PENDING rows for exclusive
/// processing. The dispatcher always passes 1 to preserve serialization;
/// the parameter exists for the stats/recovery tooling.
///
/// Claim order: HIGH before NORMAL before LOW, then insertion order. Rows
/// whose `scheduled_at` lies in the future (retry backoff) are not due.
pub async fn claim_next(
    pool: &PgPool,
    batch_size: i64,
    dispatcher_id: &str,
) -> Result<Vec<SyncJobRow>> {
    let rows = sqlx::query(&format!(
        r#"
        with to_claim as (
            select id
            from opms_sync_queue
            where status = 'PENDING'
              and scheduled_at <= now()
            order by case priority when 'HIGH' then 0 when 'NORMAL' then 1 else 2 end,
                     id asc
            limit $1
            for update skip locked
        )
        update opms_sync_queue q
           set status     = 'PROCESSING',
               claimed_at = now(),
               claimed_by = $2
          from to_claim
         where q.id = to_claim.id
        returning {SELECT_COLS}
        "#
    ))
    .bind(batch_size)
    .bind(dispatcher_id)
    .fetch_all(pool)
    .await
    .context("claim_next failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        out.push(SyncJobRow::from_row(row)?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// PROCESSING → COMPLETED, recording the processing metadata.
/// Returns false if the row was not in PROCESSING (claim protocol bypassed).
pub async fn mark_completed(pool: &PgPool, id: i64, results: Value) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        update opms_sync_queue
           set status             = 'COMPLETED',
               processing_results = $2,
               last_error         = null
         where id = $1
           and status = 'PROCESSING'
        returning id
        "#,
    )
    .bind(id)
    .bind(results)
    .fetch_optional(pool)
    .await
    .context("mark_completed failed")?;
    Ok(row.is_some())
}

/// PROCESSING → FAILED (terminal).
pub async fn mark_failed(pool: &PgPool, id: i64, last_error: &str) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        update opms_sync_queue
           set status     = 'FAILED',
               last_error = $2
         where id = $1
           and status = 'PROCESSING'
        returning id
        "#,
    )
    .bind(id)
    .bind(last_error)
    .fetch_optional(pool)
    .await
    .context("mark_failed failed")?;
    Ok(row.is_some())
}

/// PROCESSING → PENDING with a future `scheduled_at` and an incremented
/// retry counter. The claim fields are cleared so the next wake can claim it.
pub async fn schedule_retry(pool: &PgPool, id: i64, delay_ms: u64, last_error: &str) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        update opms_sync_queue
           set status       = 'PENDING',
               retry_count  = retry_count + 1,
               scheduled_at = now() + $2 * interval '1 millisecond',
               last_error   = $3,
               claimed_at   = null,
               claimed_by   = null
         where id = $1
           and status = 'PROCESSING'
        returning id
        "#,
    )
    .bind(id)
    .bind(delay_ms as i64)
    .bind(last_error)
    .fetch_optional(pool)
    .await
    .context("schedule_retry failed")?;
    Ok(row.is_some())
}

/// Reclaim PROCESSING rows whose claim is older than the lease TTL
/// (dispatcher died mid-job). Returns the number of rows returned to
/// PENDING. Runs at startup and on every dispatcher wake.
pub async fn reclaim_stale(pool: &PgPool, lease_ttl_secs: u64) -> Result<u64> {
    let res = sqlx::query(
        r#"
        update opms_sync_queue
           set status     = 'PENDING',
               claimed_at = null,
               claimed_by = null
         where status = 'PROCESSING'
           and claimed_at < now() - $1 * interval '1 second'
        "#,
    )
    .bind(lease_ttl_secs as i64)
    .execute(pool)
    .await
    .context("reclaim_stale failed")?;
    Ok(res.rows_affected())
}

pub async fn fetch_job(pool: &PgPool, id: i64) -> Result<Option<SyncJobRow>> {
    let row = sqlx::query(&format!(
        "select {SELECT_COLS} from opms_sync_queue where id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("fetch_job failed")?;

    match row {
        Some(row) => Ok(Some(SyncJobRow::from_row(&row)?)),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct QueueStats {
    pub window_minutes: i64,
    pub enqueued: i64,
    pub completed: i64,
    pub failed: i64,
    pub avg_retries: f64,
}

/// Aggregate activity over a trailing window.
pub async fn queue_stats(pool: &PgPool, window_minutes: i64) -> Result<QueueStats> {
    let row = sqlx::query(
        r#"
        select
          count(*) filter (where created_at > now() - $1 * interval '1 minute')        as enqueued,
          count(*) filter (where status = 'COMPLETED'
                             and claimed_at > now() - $1 * interval '1 minute')        as completed,
          count(*) filter (where status = 'FAILED'
                             and claimed_at > now() - $1 * interval '1 minute')        as failed,
          coalesce(avg(retry_count) filter (where status in ('COMPLETED','FAILED')
                             and claimed_at > now() - $1 * interval '1 minute'),
                   0.0)::double precision                                              as avg_retries
        from opms_sync_queue
        "#,
    )
    .bind(window_minutes)
    .fetch_one(pool)
    .await
    .context("queue_stats failed")?;

    Ok(QueueStats {
        window_minutes,
        enqueued: row.try_get("enqueued")?,
        completed: row.try_get("completed")?,
        failed: row.try_get("failed")?,
        avg_retries: row.try_get("avg_retries")?,
    })
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StatusBreakdown {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

/// Current row counts per status.
pub async fn status_breakdown(pool: &PgPool) -> Result<StatusBreakdown> {
    let rows = sqlx::query(
        r#"
        select status, count(*)::bigint as n
        from opms_sync_queue
        group by status
        "#,
    )
    .fetch_all(pool)
    .await
    .context("status_breakdown failed")?;

    let mut out = StatusBreakdown::default();
    for row in rows {
        let status: String = row.try_get("status")?;
        let n: i64 = row.try_get("n")?;
        match status.as_str() {
            "PENDING" => out.pending = n,
            "PROCESSING" => out.processing = n,
            "COMPLETED" => out.completed = n,
            "FAILED" => out.failed = n,
            _ => {}
        }
    }
    Ok(out)
}
