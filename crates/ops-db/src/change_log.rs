//! Append-only audit of detected changes (`opms_change_log`).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};

use ops_schemas::Provenance;

#[derive(Debug, Clone)]
pub struct NewChange {
    pub item_id: i64,
    pub product_id: i64,
    pub provenance: Provenance,
    pub change_fields: Value,
}

#[derive(Debug, Clone)]
pub struct ChangeLogRow {
    pub id: i64,
    pub item_id: i64,
    pub product_id: i64,
    pub provenance: String,
    pub change_fields: Value,
    pub detected_at: DateTime<Utc>,
}

/// Append one change record (append-only semantics enforced at app layer).
pub async fn insert_change_log(pool: &PgPool, change: &NewChange) -> Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        insert into opms_change_log (item_id, product_id, provenance, change_fields)
        values ($1, $2, $3, $4)
        returning id
        "#,
    )
    .bind(change.item_id)
    .bind(change.product_id)
    .bind(change.provenance.as_str())
    .bind(&change.change_fields)
    .fetch_one(pool)
    .await
    .context("insert_change_log failed")?;
    Ok(id)
}

/// Most recent change records, newest first.
pub async fn recent_changes(pool: &PgPool, limit: i64) -> Result<Vec<ChangeLogRow>> {
    let rows = sqlx::query(
        r#"
        select id, item_id, product_id, provenance, change_fields, detected_at
        from opms_change_log
        order by id desc
        limit $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("recent_changes failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(ChangeLogRow {
            id: row.try_get("id")?,
            item_id: row.try_get("item_id")?,
            product_id: row.try_get("product_id")?,
            provenance: row.try_get("provenance")?,
            change_fields: row.try_get("change_fields")?,
            detected_at: row.try_get("detected_at")?,
        });
    }
    Ok(out)
}
