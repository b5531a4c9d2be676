//! Per-item latest sync state (`opms_item_sync`).
//!
//! Two writers touch disjoint columns: the dispatcher owns the sync outcome
//! fields, the webhook applier owns the price-received fields. Both use
//! upsert-singleton semantics keyed on item_id.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};

use ops_schemas::ItemSyncState;

#[derive(Debug, Clone)]
pub struct ItemSyncRow {
    pub item_id: i64,
    pub sync_status: ItemSyncState,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub erp_item_id: Option<String>,
    pub last_error: Option<String>,
    pub field_validation_summary: Option<Value>,
    pub prices_received_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewItemSyncMark {
    pub item_id: i64,
    pub sync_status: ItemSyncState,
    pub erp_item_id: Option<String>,
    pub last_error: Option<String>,
    pub field_validation_summary: Option<Value>,
}

/// Dispatcher-owned upsert: records the latest sync outcome for an item.
pub async fn item_sync_mark(pool: &PgPool, mark: &NewItemSyncMark) -> Result<()> {
    sqlx::query(
        r#"
        insert into opms_item_sync
            (item_id, sync_status, last_sync_at, erp_item_id, last_error,
             field_validation_summary, updated_at)
        values ($1, $2, now(), $3, $4, $5, now())
        on conflict (item_id) do update
            set sync_status              = excluded.sync_status,
                last_sync_at             = excluded.last_sync_at,
                erp_item_id              = coalesce(excluded.erp_item_id, opms_item_sync.erp_item_id),
                last_error               = excluded.last_error,
                field_validation_summary = excluded.field_validation_summary,
                updated_at               = now()
        "#,
    )
    .bind(mark.item_id)
    .bind(mark.sync_status.as_str())
    .bind(&mark.erp_item_id)
    .bind(&mark.last_error)
    .bind(&mark.field_validation_summary)
    .execute(pool)
    .await
    .context("item_sync_mark failed")?;
    Ok(())
}

/// Webhook-applier-owned update: stamp that pricing was received. Runs
/// inside the applier's transaction via the executor parameter.
pub async fn item_sync_set_prices<'e, E>(executor: E, item_id: i64) -> Result<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        insert into opms_item_sync (item_id, sync_status, prices_received_at, updated_at)
        values ($1, 'SUCCESS', now(), now())
        on conflict (item_id) do update
            set prices_received_at = excluded.prices_received_at,
                updated_at         = now()
        "#,
    )
    .bind(item_id)
    .execute(executor)
    .await
    .context("item_sync_set_prices failed")?;
    Ok(())
}

pub async fn item_sync_fetch(pool: &PgPool, item_id: i64) -> Result<Option<ItemSyncRow>> {
    let row = sqlx::query(
        r#"
        select item_id, sync_status, last_sync_at, erp_item_id, last_error,
               field_validation_summary, prices_received_at, updated_at
        from opms_item_sync
        where item_id = $1
        "#,
    )
    .bind(item_id)
    .fetch_optional(pool)
    .await
    .context("item_sync_fetch failed")?;

    let Some(row) = row else { return Ok(None) };

    let status: String = row.try_get("sync_status")?;
    Ok(Some(ItemSyncRow {
        item_id: row.try_get("item_id")?,
        sync_status: ItemSyncState::parse(&status)?,
        last_sync_at: row.try_get("last_sync_at")?,
        erp_item_id: row.try_get("erp_item_id")?,
        last_error: row.try_get("last_error")?,
        field_validation_summary: row.try_get("field_validation_summary")?,
        prices_received_at: row.try_get("prices_received_at")?,
        updated_at: row.try_get("updated_at")?,
    }))
}
