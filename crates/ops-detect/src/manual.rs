//! Manual trigger paths: per-item (HIGH priority) and per-product.

use anyhow::{anyhow, Context, Result};
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::info;

use ops_db::{enqueue, insert_change_log, NewChange, NewJob, SyncGate};
use ops_schemas::{EventData, EventType, ManualOpts, Priority, Provenance};

use crate::filters::{admit, EnqueueDecision, EnqueueRejection};
use crate::ItemRef;

/// Per-item outcome of a manual trigger request.
#[derive(Debug, Clone)]
pub enum ManualTriggerOutcome {
    Enqueued { job_id: i64 },
    /// Item already has an open queue row.
    AlreadyQueued,
    Rejected(EnqueueRejection),
}

async fn load_item(pool: &PgPool, item_id: i64) -> Result<Option<ItemRef>> {
    let row = sqlx::query(
        r#"
        select id, product_id, coalesce(code, '') as code, product_type
        from opms_item
        where id = $1
        "#,
    )
    .bind(item_id)
    .fetch_optional(pool)
    .await
    .context("manual trigger item lookup failed")?;

    let Some(row) = row else { return Ok(None) };
    Ok(Some(ItemRef {
        item_id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        code: row.try_get("code")?,
        product_type: row.try_get("product_type")?,
    }))
}

async fn enqueue_manual(
    pool: &PgPool,
    item: &ItemRef,
    event_data: EventData,
    priority: Priority,
    sync_enabled: bool,
    max_retries: i32,
) -> Result<ManualTriggerOutcome> {
    let opts = event_data
        .manual_opts()
        .ok_or_else(|| anyhow!("enqueue_manual requires manual event data"))?;

    match admit(
        &item.product_type,
        &item.code,
        true,
        opts.config_override,
        sync_enabled,
    ) {
        EnqueueDecision::Reject(r) => return Ok(ManualTriggerOutcome::Rejected(r)),
        EnqueueDecision::Admit => {}
    }

    let job = NewJob {
        item_id: item.item_id,
        product_id: item.product_id,
        event_type: EventType::Update,
        event_data,
        priority,
        max_retries,
    };
    match enqueue(pool, &job).await? {
        Some(job_id) => {
            insert_change_log(
                pool,
                &NewChange {
                    item_id: item.item_id,
                    product_id: item.product_id,
                    provenance: Provenance::Manual,
                    change_fields: json!({
                        "triggered_by": job.event_data.manual_opts().map(|o| o.triggered_by.clone()),
                        "reason": job.event_data.manual_opts().map(|o| o.reason.clone()),
                    }),
                },
            )
            .await?;
            Ok(ManualTriggerOutcome::Enqueued { job_id })
        }
        None => Ok(ManualTriggerOutcome::AlreadyQueued),
    }
}

/// Manually enqueue one item at HIGH priority.
///
/// Returns an error only for infrastructure faults; "item not found" is an
/// error too because the operator named it explicitly.
pub async fn trigger_item(
    pool: &PgPool,
    gate: &SyncGate,
    item_id: i64,
    opts: ManualOpts,
    max_retries: i32,
) -> Result<ManualTriggerOutcome> {
    let item = load_item(pool, item_id)
        .await?
        .ok_or_else(|| anyhow!("item {item_id} not found"))?;

    let sync_enabled = gate.is_enabled(pool).await;
    let outcome = enqueue_manual(
        pool,
        &item,
        EventData::ManualItem { opts },
        Priority::High,
        sync_enabled,
        max_retries,
    )
    .await?;

    info!(item_id, outcome = ?outcome, "manual item trigger");
    Ok(outcome)
}

/// Manually enqueue every item of a product, in extractor order (by code),
/// at the given priority.
pub async fn trigger_product(
    pool: &PgPool,
    gate: &SyncGate,
    product_id: i64,
    priority: Priority,
    opts: ManualOpts,
    max_retries: i32,
) -> Result<Vec<(i64, ManualTriggerOutcome)>> {
    let rows = sqlx::query(
        r#"
        select id, product_id, coalesce(code, '') as code, product_type
        from opms_item
        where product_id = $1
          and archived = 'N'
        order by code asc, id asc
        "#,
    )
    .bind(product_id)
    .fetch_all(pool)
    .await
    .context("manual trigger product lookup failed")?;

    let sync_enabled = gate.is_enabled(pool).await;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let item = ItemRef {
            item_id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            code: row.try_get("code")?,
            product_type: row.try_get("product_type")?,
        };
        let outcome = enqueue_manual(
            pool,
            &item,
            EventData::ManualProduct {
                product_id,
                opts: opts.clone(),
            },
            priority,
            sync_enabled,
            max_retries,
        )
        .await?;
        out.push((item.item_id, outcome));
    }

    info!(product_id, items = out.len(), "manual product trigger");
    Ok(out)
}
