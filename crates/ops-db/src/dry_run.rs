//! Dry-run capture (`opms_dry_run`): payload + validation + simulated
//! response, stored for later inspection.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};

use ops_schemas::DryRunRecord;

pub async fn insert_dry_run(pool: &PgPool, rec: &DryRunRecord) -> Result<i64> {
    let summary = serde_json::to_value(rec.validation_summary).context("encode summary")?;
    let (id,): (i64,) = sqlx::query_as(
        r#"
        insert into opms_dry_run
            (item_id, environment, payload, validation_summary, simulated_response, created_at)
        values ($1, $2, $3, $4, $5, $6)
        returning id
        "#,
    )
    .bind(rec.item_id)
    .bind(rec.environment.as_str())
    .bind(&rec.payload)
    .bind(summary)
    .bind(&rec.simulated_response)
    .bind(rec.created_at)
    .fetch_one(pool)
    .await
    .context("insert_dry_run failed")?;
    Ok(id)
}

pub async fn latest_dry_run_for_item(pool: &PgPool, item_id: i64) -> Result<Option<DryRunRecord>> {
    let row = sqlx::query(
        r#"
        select item_id, environment, payload, validation_summary, simulated_response, created_at
        from opms_dry_run
        where item_id = $1
        order by id desc
        limit 1
        "#,
    )
    .bind(item_id)
    .fetch_optional(pool)
    .await
    .context("latest_dry_run_for_item failed")?;

    let Some(row) = row else { return Ok(None) };

    let environment: String = row.try_get("environment")?;
    Ok(Some(DryRunRecord {
        item_id: row.try_get("item_id")?,
        environment: ops_schemas::ErpEnvironment::parse(&environment)?,
        payload: row.try_get("payload")?,
        validation_summary: serde_json::from_value(row.try_get("validation_summary")?)
            .context("decode validation_summary")?,
        simulated_response: row.try_get("simulated_response")?,
        created_at: row.try_get("created_at")?,
    }))
}
