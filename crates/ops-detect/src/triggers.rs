//! Startup verification of the catalog-side triggers.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::warn;

pub const ITEM_TRIGGER: &str = "opms_item_sync_trigger";
pub const PRODUCT_TRIGGER: &str = "opms_product_sync_trigger";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerHealth {
    pub item_trigger: bool,
    pub product_trigger: bool,
}

impl TriggerHealth {
    /// Both triggers present. False downgrades overall health to degraded
    /// but never stops the engine — polling covers the gap.
    pub fn is_healthy(&self) -> bool {
        self.item_trigger && self.product_trigger
    }
}

/// Check that the expected catalog triggers exist.
pub async fn verify_triggers(pool: &PgPool) -> Result<TriggerHealth> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        select distinct trigger_name
        from information_schema.triggers
        where trigger_name in ($1, $2)
        "#,
    )
    .bind(ITEM_TRIGGER)
    .bind(PRODUCT_TRIGGER)
    .fetch_all(pool)
    .await
    .context("trigger verification query failed")?;

    let health = TriggerHealth {
        item_trigger: rows.iter().any(|(n,)| n == ITEM_TRIGGER),
        product_trigger: rows.iter().any(|(n,)| n == PRODUCT_TRIGGER),
    };

    if !health.is_healthy() {
        warn!(
            item_trigger = health.item_trigger,
            product_trigger = health.product_trigger,
            "catalog sync triggers missing; running degraded on polling backup"
        );
    }
    Ok(health)
}
