//! Scenario: queue claim protocol.
//!
//! Invariants under test (against a real Postgres):
//! 1. Per-item dedupe: a second enqueue while a row is open returns None.
//! 2. A claim moves a due row to PROCESSING exactly once; a second
//!    claimant never sees it.
//! 3. Transitions are conditional on PROCESSING — a terminal row cannot be
//!    completed twice.
//! 4. `schedule_retry` parks the row in the future; it is not claimable
//!    until the delay elapses.
//!
//! Single test fn: claims are global, so the steps must run sequentially.

use ops_db::{claim_next, enqueue, fetch_job, mark_completed, schedule_retry, NewJob};
use ops_schemas::{EventData, EventType, JobStatus, Priority};
use serde_json::json;

const ITEM_A: i64 = 910_001;
const ITEM_B: i64 = 910_002;

fn job(item_id: i64) -> NewJob {
    NewJob {
        item_id,
        product_id: 910_000,
        event_type: EventType::Update,
        event_data: EventData::Trigger {
            table: "item".to_string(),
            change_fields: vec!["code".to_string()],
        },
        priority: Priority::Normal,
        max_retries: 3,
    }
}

#[tokio::test]
async fn claim_protocol_end_to_end() -> anyhow::Result<()> {
    let Some(pool) = ops_testkit::scenario_pool().await? else {
        return Ok(());
    };

    // Fresh slate for this scenario's items.
    sqlx::query("delete from opms_sync_queue where item_id in ($1, $2)")
        .bind(ITEM_A)
        .bind(ITEM_B)
        .execute(&pool)
        .await?;

    // --- dedupe -----------------------------------------------------------
    let first = enqueue(&pool, &job(ITEM_A)).await?.expect("first enqueue");
    assert!(
        enqueue(&pool, &job(ITEM_A)).await?.is_none(),
        "open item must dedupe"
    );

    // --- exclusive claim --------------------------------------------------
    let claimed = claim_next(&pool, 50, "dispatcher-a").await?;
    let ours: Vec<_> = claimed.iter().filter(|j| j.item_id == ITEM_A).collect();
    assert_eq!(ours.len(), 1, "exactly one claim for the item");
    assert_eq!(ours[0].id, first);
    assert_eq!(ours[0].status, JobStatus::Processing);
    assert_eq!(ours[0].claimed_by.as_deref(), Some("dispatcher-a"));

    let again = claim_next(&pool, 50, "dispatcher-b").await?;
    assert!(
        again.iter().all(|j| j.item_id != ITEM_A),
        "row claimed twice"
    );

    // Dedupe still holds while PROCESSING.
    assert!(enqueue(&pool, &job(ITEM_A)).await?.is_none());

    // --- terminal transition, exactly once --------------------------------
    assert!(mark_completed(&pool, first, json!({"ok": true})).await?);
    assert!(!mark_completed(&pool, first, json!({"ok": true})).await?);
    let row = fetch_job(&pool, first).await?.expect("row exists");
    assert_eq!(row.status, JobStatus::Completed);

    // A completed item may be enqueued again.
    assert!(enqueue(&pool, &job(ITEM_A)).await?.is_some());

    // --- retry scheduling -------------------------------------------------
    let id_b = enqueue(&pool, &job(ITEM_B)).await?.expect("enqueued");
    let claimed = claim_next(&pool, 50, "dispatcher-a").await?;
    assert!(claimed.iter().any(|j| j.id == id_b));

    assert!(schedule_retry(&pool, id_b, 30_000, "scripted failure").await?);
    let row = fetch_job(&pool, id_b).await?.expect("row exists");
    assert_eq!(row.status, JobStatus::Pending);
    assert_eq!(row.retry_count, 1);
    assert_eq!(row.last_error.as_deref(), Some("scripted failure"));

    // Not due yet.
    let claimed = claim_next(&pool, 50, "dispatcher-a").await?;
    assert!(claimed.iter().all(|j| j.id != id_b), "future row claimed");

    // Force due; the row comes back.
    sqlx::query("update opms_sync_queue set scheduled_at = now() where id = $1")
        .bind(id_b)
        .execute(&pool)
        .await?;
    let claimed = claim_next(&pool, 50, "dispatcher-a").await?;
    assert!(claimed.iter().any(|j| j.id == id_b));

    Ok(())
}
