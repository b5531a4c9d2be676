//! The transactional applier.
//!
//! Both pricing tables are written inside one transaction together with
//! the item-sync price stamp; any failure rolls the whole thing back. The
//! before/after snapshots in the outcome are what the audit trail records.

use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{info, warn};

use ops_db::item_sync_set_prices;
use ops_schemas::{PriceSnapshot, PricingWebhook, WebhookOutcome};

use crate::money::{cents_to_price, price_to_cents};
use crate::validate::validate_webhook;
use crate::WebhookError;

struct ResolvedItem {
    item_id: i64,
    product_id: i64,
    product_type: String,
}

/// Map the ERP item code onto an active OPMS item (item and parent product
/// both non-archived).
async fn resolve_item(pool: &PgPool, code: &str) -> Result<Option<ResolvedItem>> {
    let row = sqlx::query(
        r#"
        select i.id as item_id, i.product_id as product_id, i.product_type as product_type
        from opms_item i
        join opms_product p on p.id = i.product_id
        where i.code = $1
          and i.archived = 'N'
          and p.archived = 'N'
        "#,
    )
    .bind(code)
    .fetch_optional(pool)
    .await
    .context("webhook item resolution failed")?;

    let Some(row) = row else { return Ok(None) };
    Ok(Some(ResolvedItem {
        item_id: row.try_get("item_id")?,
        product_id: row.try_get("product_id")?,
        product_type: row.try_get("product_type")?,
    }))
}

async fn snapshot(pool: &PgPool, product_id: i64, product_type: &str) -> Result<PriceSnapshot> {
    let mut snap = PriceSnapshot::default();

    let price = sqlx::query(
        r#"
        select cut_price, roll_price
        from opms_price
        where product_id = $1 and product_type = $2
        "#,
    )
    .bind(product_id)
    .bind(product_type)
    .fetch_optional(pool)
    .await
    .context("price snapshot failed")?;
    if let Some(row) = price {
        snap.customer_cut_cents = row
            .try_get::<Option<f64>, _>("cut_price")?
            .and_then(price_to_cents);
        snap.customer_roll_cents = row
            .try_get::<Option<f64>, _>("roll_price")?
            .and_then(price_to_cents);
    }

    let cost = sqlx::query(
        r#"
        select cut_cost, roll_cost
        from opms_cost
        where product_id = $1
        "#,
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await
    .context("cost snapshot failed")?;
    if let Some(row) = cost {
        snap.vendor_cut_cents = row
            .try_get::<Option<f64>, _>("cut_cost")?
            .and_then(price_to_cents);
        snap.vendor_roll_cents = row
            .try_get::<Option<f64>, _>("roll_cost")?
            .and_then(price_to_cents);
    }

    Ok(snap)
}

async fn write_prices(
    tx: &mut Transaction<'_, Postgres>,
    item: &ResolvedItem,
    customer_cut_cents: i64,
    customer_roll_cents: i64,
    vendor_cut_cents: i64,
    vendor_roll_cents: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        insert into opms_price (product_id, product_type, cut_price, roll_price, updated_at)
        values ($1, $2, $3, $4, now())
        on conflict (product_id, product_type) do update
            set cut_price  = excluded.cut_price,
                roll_price = excluded.roll_price,
                updated_at = now()
        "#,
    )
    .bind(item.product_id)
    .bind(&item.product_type)
    .bind(cents_to_price(customer_cut_cents))
    .bind(cents_to_price(customer_roll_cents))
    .execute(&mut **tx)
    .await
    .context("opms_price upsert failed")?;

    sqlx::query(
        r#"
        insert into opms_cost (product_id, cut_cost, roll_cost, updated_at)
        values ($1, $2, $3, now())
        on conflict (product_id) do update
            set cut_cost   = excluded.cut_cost,
                roll_cost  = excluded.roll_cost,
                updated_at = now()
        "#,
    )
    .bind(item.product_id)
    .bind(cents_to_price(vendor_cut_cents))
    .bind(cents_to_price(vendor_roll_cents))
    .execute(&mut **tx)
    .await
    .context("opms_cost upsert failed")?;

    item_sync_set_prices(&mut **tx, item.item_id).await?;
    Ok(())
}

/// Apply one pricing webhook.
///
/// Order of checks: structural validation, guard flag, item resolution,
/// then the transactional write. A protected item returns a successful
/// skipped outcome with no OPMS writes of any kind.
pub async fn apply(pool: &PgPool, webhook: &PricingWebhook) -> Result<WebhookOutcome, WebhookError> {
    let pricing = validate_webhook(webhook)?;

    if webhook.is_protected() {
        info!(item_code = %pricing.erp_item_code, "webhook skipped: item protected");
        return Ok(WebhookOutcome::skipped_with("item is protected in ERP"));
    }

    let item = resolve_item(pool, &pricing.erp_item_code)
        .await?
        .ok_or_else(|| WebhookError::UnknownItem(pricing.erp_item_code.clone()))?;

    let before = snapshot(pool, item.product_id, &item.product_type).await?;

    let mut tx = pool.begin().await.context("webhook begin failed")?;
    let write = write_prices(
        &mut tx,
        &item,
        pricing.customer_cut_cents,
        pricing.customer_roll_cents,
        pricing.vendor_cut_cents,
        pricing.vendor_roll_cents,
    )
    .await;

    match write {
        Ok(()) => {
            tx.commit().await.context("webhook commit failed")?;
        }
        Err(e) => {
            // Dropping the transaction rolls back; make it explicit.
            if let Err(rb) = tx.rollback().await {
                warn!(error = %rb, "webhook rollback also failed");
            }
            return Err(WebhookError::Db(e));
        }
    }

    let after = snapshot(pool, item.product_id, &item.product_type).await?;

    for w in &pricing.warnings {
        warn!(item_id = item.item_id, warning = %w, "webhook pricing warning");
    }
    info!(
        item_id = item.item_id,
        erp_internal_id = %pricing.erp_internal_id,
        "webhook pricing applied"
    );

    Ok(WebhookOutcome {
        success: true,
        skipped: false,
        skip_reason: None,
        item_id: Some(item.item_id),
        before,
        after,
        warnings: pricing.warnings,
    })
}
