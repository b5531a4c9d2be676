//! Dry-run simulation: extractor + validator + builder with no network.

use anyhow::{Context, Result};
use serde_json::json;
use sqlx::PgPool;
use tracing::info;

use ops_db::{insert_dry_run, VendorMapper};
use ops_extract::{extract, validate, ExtractError, ExtractOptions};
use ops_payload::build;
use ops_schemas::{DryRunRecord, ErpEnvironment};

/// Outcome of a dry run; extraction skips are captured rather than erased
/// so the inspection surface shows why an item would not sync.
#[derive(Debug, Clone)]
pub enum DryRunResult {
    Simulated(DryRunRecord),
    NotSyncable { reason: String },
}

/// Run the outbound pipeline for one item without touching the ERP, store
/// the record, and return it.
pub async fn dry_run(
    pool: &PgPool,
    mapper: &VendorMapper,
    item_id: i64,
    environment: ErpEnvironment,
    tax_schedule_id: &str,
) -> Result<DryRunResult> {
    let extracted = match extract(pool, mapper, item_id, ExtractOptions::default()).await {
        Ok(x) => x,
        Err(ExtractError::NotSyncable(reason)) => {
            return Ok(DryRunResult::NotSyncable {
                reason: reason.message().to_string(),
            });
        }
        Err(e) => return Err(anyhow::Error::new(e).context("dry run extraction failed")),
    };

    let validated = validate(&extracted);
    let summary = validated.summary;
    let payload = build(&validated, tax_schedule_id);

    let record = DryRunRecord {
        item_id,
        environment,
        payload: serde_json::to_value(&payload).context("serialize dry-run payload")?,
        validation_summary: summary,
        simulated_response: json!({
            "success": true,
            "simulated": true,
            "itemId": payload.item_id,
            "operation": "simulated",
        }),
        created_at: chrono::Utc::now(),
    };

    insert_dry_run(pool, &record).await?;
    info!(item_id, env = environment.as_str(), "dry run stored");
    Ok(DryRunResult::Simulated(record))
}
