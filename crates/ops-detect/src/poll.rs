//! Polling backup detection.
//!
//! Sweeps items whose modification timestamp (item or parent product)
//! passed the last watermark, skipping items that already have an open
//! queue row. Bounded per tick so catch-up after downtime cannot balloon
//! memory or flood the queue.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::info;

use ops_db::{enqueue, insert_change_log, NewChange, NewJob, SyncGate};
use ops_schemas::{EventData, EventType, Priority, Provenance};

use crate::filters::{admit, EnqueueDecision};
use crate::ItemRef;

#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub scanned: usize,
    pub enqueued: usize,
    pub rejected: usize,
    pub new_watermark: DateTime<Utc>,
}

/// One polling tick.
///
/// Items come back oldest-modification first so the watermark can only
/// advance past rows that were actually considered; a tick that hits the
/// batch limit leaves the remainder for the next tick.
pub async fn poll_once(
    pool: &PgPool,
    gate: &SyncGate,
    watermark: DateTime<Utc>,
    limit: i64,
    max_retries: i32,
) -> Result<PollOutcome> {
    let rows = sqlx::query(
        r#"
        select i.id            as item_id,
               i.product_id    as product_id,
               i.code          as code,
               i.product_type  as product_type,
               greatest(i.modified, p.modified) as modified
        from opms_item i
        join opms_product p on p.id = i.product_id
        where greatest(i.modified, p.modified) > $1
          and i.archived = 'N'
          and p.archived = 'N'
          and not exists (
                select 1 from opms_sync_queue q
                where q.item_id = i.id
                  and q.status in ('PENDING','PROCESSING'))
        order by greatest(i.modified, p.modified) asc, i.id asc
        limit $2
        "#,
    )
    .bind(watermark)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("poll sweep failed")?;

    let sync_enabled = gate.is_enabled(pool).await;

    let mut outcome = PollOutcome {
        scanned: rows.len(),
        enqueued: 0,
        rejected: 0,
        new_watermark: watermark,
    };

    for row in rows {
        let item = ItemRef {
            item_id: row.try_get("item_id")?,
            product_id: row.try_get("product_id")?,
            code: row.try_get("code")?,
            product_type: row.try_get("product_type")?,
        };
        let modified: DateTime<Utc> = row.try_get("modified")?;
        if modified > outcome.new_watermark {
            outcome.new_watermark = modified;
        }

        match admit(&item.product_type, &item.code, false, false, sync_enabled) {
            EnqueueDecision::Reject(_) => {
                outcome.rejected += 1;
                continue;
            }
            EnqueueDecision::Admit => {}
        }

        let job = NewJob {
            item_id: item.item_id,
            product_id: item.product_id,
            event_type: EventType::Update,
            event_data: EventData::Polling { watermark },
            priority: Priority::Normal,
            max_retries,
        };
        if enqueue(pool, &job).await?.is_some() {
            insert_change_log(
                pool,
                &NewChange {
                    item_id: item.item_id,
                    product_id: item.product_id,
                    provenance: Provenance::Polling,
                    change_fields: json!({"modified": modified}),
                },
            )
            .await?;
            outcome.enqueued += 1;
        }
    }

    if outcome.enqueued > 0 || outcome.rejected > 0 {
        info!(
            scanned = outcome.scanned,
            enqueued = outcome.enqueued,
            rejected = outcome.rejected,
            "poll tick"
        );
    }
    Ok(outcome)
}
