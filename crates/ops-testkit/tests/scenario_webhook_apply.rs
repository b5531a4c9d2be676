//! Scenario: the inbound pricing leg.
//!
//! Covers the transactional apply (both tables or neither), idempotent
//! re-delivery, the protected guard, and the unknown-item rejection —
//! all against a real Postgres.

use ops_db::item_sync_fetch;
use ops_schemas::PricingWebhook;
use ops_testkit::{seed_color, seed_item, seed_product, SeedItem, SeedProduct};
use ops_webhook::{apply, WebhookError};
use serde_json::json;

const PRODUCT: i64 = 960_000;
const ITEM: i64 = 960_001;
const CODE: &str = "7100-0001";

fn webhook(extra: serde_json::Value) -> PricingWebhook {
    let mut base = json!({
        "itemid": CODE,
        "internalid": "7741",
        "baseprice": "129.99",
        "custitem_customer_roll_price": 119.99,
        "cost": "54.25",
        "custitem_vendor_roll_cost": 49.00
    });
    base.as_object_mut()
        .unwrap()
        .extend(extra.as_object().cloned().unwrap_or_default());
    serde_json::from_value(base).unwrap()
}

async fn price_row(pool: &sqlx::PgPool) -> Option<(f64, f64)> {
    sqlx::query_as::<_, (Option<f64>, Option<f64>)>(
        "select cut_price, roll_price from opms_price where product_id = $1 and product_type = 'R'",
    )
    .bind(PRODUCT)
    .fetch_optional(pool)
    .await
    .unwrap()
    .map(|(c, r)| (c.unwrap_or(0.0), r.unwrap_or(0.0)))
}

async fn cost_row(pool: &sqlx::PgPool) -> Option<(f64, f64)> {
    sqlx::query_as::<_, (Option<f64>, Option<f64>)>(
        "select cut_cost, roll_cost from opms_cost where product_id = $1",
    )
    .bind(PRODUCT)
    .fetch_optional(pool)
    .await
    .unwrap()
    .map(|(c, r)| (c.unwrap_or(0.0), r.unwrap_or(0.0)))
}

#[tokio::test]
async fn webhook_apply_end_to_end() -> anyhow::Result<()> {
    let Some(pool) = ops_testkit::scenario_pool().await? else {
        return Ok(());
    };

    // Fresh slate.
    sqlx::query("delete from opms_price where product_id = $1")
        .bind(PRODUCT)
        .execute(&pool)
        .await?;
    sqlx::query("delete from opms_cost where product_id = $1")
        .bind(PRODUCT)
        .execute(&pool)
        .await?;

    seed_product(
        &pool,
        &SeedProduct {
            id: PRODUCT,
            name: "Ledger".to_string(),
            width: Some(54.0),
            vertical_repeat: None,
            horizontal_repeat: None,
            prop_65: None,
            ab_2998: None,
        },
    )
    .await?;
    seed_item(
        &pool,
        &SeedItem {
            id: ITEM,
            product_id: PRODUCT,
            code: CODE.to_string(),
            product_type: "R".to_string(),
        },
    )
    .await?;
    seed_color(&pool, ITEM, 960_010, "Clay").await?;

    // --- protected guard: no writes at all -------------------------------
    let outcome = apply(&pool, &webhook(json!({"custitem_opms_protected": "T"}))).await?;
    assert!(outcome.success);
    assert!(outcome.skipped);
    assert!(price_row(&pool).await.is_none(), "guarded write leaked");
    assert!(cost_row(&pool).await.is_none(), "guarded write leaked");

    // --- valid apply: both tables inside one transaction ------------------
    let outcome = apply(&pool, &webhook(json!({}))).await?;
    assert!(outcome.success && !outcome.skipped);
    assert_eq!(outcome.item_id, Some(ITEM));
    assert_eq!(outcome.before.customer_cut_cents, None);
    assert_eq!(outcome.after.customer_cut_cents, Some(12_999));
    assert_eq!(outcome.after.vendor_roll_cents, Some(4_900));

    assert_eq!(price_row(&pool).await, Some((129.99, 119.99)));
    assert_eq!(cost_row(&pool).await, Some((54.25, 49.00)));

    let sync = item_sync_fetch(&pool, ITEM).await?.expect("item sync row");
    assert!(sync.prices_received_at.is_some());

    // --- idempotent re-delivery ------------------------------------------
    let outcome = apply(&pool, &webhook(json!({}))).await?;
    assert_eq!(outcome.before, outcome.after, "unchanged pricing must be a no-op");
    assert_eq!(price_row(&pool).await, Some((129.99, 119.99)));

    // --- transactional rollback ------------------------------------------
    // Force the second table write (opms_cost) to fail for this product
    // only; the first write (opms_price) must roll back with it.
    // NOT VALID: enforce for new writes only (the existing row would fail
    // validation at ADD time otherwise).
    sqlx::query(&format!(
        "alter table opms_cost add constraint tx_probe_{PRODUCT} \
         check (product_id <> {PRODUCT} or cut_cost < 1.0) not valid"
    ))
    .execute(&pool)
    .await?;

    let before_price = price_row(&pool).await;
    let failing = webhook(json!({"baseprice": "222.22"}));
    let err = apply(&pool, &failing).await;
    assert!(matches!(err, Err(WebhookError::Db(_))), "expected apply failure");

    assert_eq!(
        price_row(&pool).await,
        before_price,
        "partial update observed after rollback"
    );

    sqlx::query(&format!(
        "alter table opms_cost drop constraint tx_probe_{PRODUCT}"
    ))
    .execute(&pool)
    .await?;

    // --- unknown item ------------------------------------------------------
    let unknown = webhook(json!({"itemid": "0000-0000"}));
    assert!(matches!(
        apply(&pool, &unknown).await,
        Err(WebhookError::UnknownItem(_))
    ));

    Ok(())
}
