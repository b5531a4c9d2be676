//! Scenario: the three skip paths through the dispatcher.
//!
//! 1. An item with no color relation: extraction diagnoses "No colors
//!    assigned", the job COMPLETES as a skip, the item reads SKIPPED, and
//!    no upsert is attempted.
//! 2. A digital item (inserted directly — the detector would already have
//!    refused it) never reaches the ERP either.
//! 3. A manual job with live_sync=false runs the whole build but ends
//!    SKIPPED without a network call.
//!
//! One test fn: dispatcher claims are global.

use std::sync::Arc;
use std::time::Duration;

use ops_config::EngineConfig;
use ops_db::{enqueue, fetch_job, item_sync_fetch, NewJob, SyncGate, VendorMapper};
use ops_runtime::Dispatcher;
use ops_schemas::{EventData, EventType, ItemSyncState, JobStatus, ManualOpts, Priority};
use ops_testkit::{seed_color, seed_item, seed_product, FakeErp, SeedItem, SeedProduct};

const PRODUCT: i64 = 930_000;
const NO_COLOR_ITEM: i64 = 930_001;
const DIGITAL_ITEM: i64 = 930_002;
const NO_LIVE_ITEM: i64 = 930_003;

async fn drain(dispatcher: &mut Dispatcher<Arc<FakeErp>>) -> anyhow::Result<()> {
    for _ in 0..20 {
        if !dispatcher.run_once().await? {
            break;
        }
    }
    Ok(())
}

fn manual_job(item_id: i64, live_sync: bool) -> NewJob {
    let mut opts = ManualOpts::new("tests", "skip path scenario");
    opts.live_sync = live_sync;
    NewJob {
        item_id,
        product_id: PRODUCT,
        event_type: EventType::Update,
        event_data: EventData::ManualItem { opts },
        priority: Priority::High,
        max_retries: 3,
    }
}

#[tokio::test]
async fn skip_paths_complete_without_upserts() -> anyhow::Result<()> {
    let Some(pool) = ops_testkit::scenario_pool().await? else {
        return Ok(());
    };

    sqlx::query("delete from opms_sync_queue where item_id in ($1, $2, $3)")
        .bind(NO_COLOR_ITEM)
        .bind(DIGITAL_ITEM)
        .bind(NO_LIVE_ITEM)
        .execute(&pool)
        .await?;

    seed_product(
        &pool,
        &SeedProduct {
            id: PRODUCT,
            name: "Driftwood".to_string(),
            width: Some(54.0),
            vertical_repeat: None,
            horizontal_repeat: None,
            prop_65: None,
            ab_2998: None,
        },
    )
    .await?;
    // Item with no color relation at all.
    seed_item(
        &pool,
        &SeedItem {
            id: NO_COLOR_ITEM,
            product_id: PRODUCT,
            code: "4399-0002".to_string(),
            product_type: "R".to_string(),
        },
    )
    .await?;
    // Digital item, fully populated otherwise.
    seed_item(
        &pool,
        &SeedItem {
            id: DIGITAL_ITEM,
            product_id: PRODUCT,
            code: "4399-0003".to_string(),
            product_type: "D".to_string(),
        },
    )
    .await?;
    seed_color(&pool, DIGITAL_ITEM, 930_010, "Slate").await?;
    // Healthy item for the no-live path.
    seed_item(
        &pool,
        &SeedItem {
            id: NO_LIVE_ITEM,
            product_id: PRODUCT,
            code: "4399-0004".to_string(),
            product_type: "R".to_string(),
        },
    )
    .await?;
    seed_color(&pool, NO_LIVE_ITEM, 930_011, "Moss").await?;

    let gate = Arc::new(SyncGate::with_ttl(Duration::ZERO));
    gate.set_enabled(&pool, true).await?;

    let no_color_job = enqueue(&pool, &manual_job(NO_COLOR_ITEM, true)).await?.unwrap();
    let digital_job = enqueue(&pool, &manual_job(DIGITAL_ITEM, true)).await?.unwrap();
    let no_live_job = enqueue(&pool, &manual_job(NO_LIVE_ITEM, false)).await?.unwrap();

    let loaded = ops_config::load_layered_with_env(&[], &[])?;
    let cfg = EngineConfig::from_loaded(&loaded);
    let erp = Arc::new(FakeErp::new());
    let mut dispatcher = Dispatcher::new(
        pool.clone(),
        Arc::clone(&gate),
        Arc::new(VendorMapper::new()),
        Arc::clone(&erp),
        cfg,
    );
    drain(&mut dispatcher).await?;

    // All three jobs COMPLETED as skips; zero upsert attempts.
    for (job_id, item_id, expect_reason) in [
        (no_color_job, NO_COLOR_ITEM, "No colors assigned"),
        (digital_job, DIGITAL_ITEM, "Digital item"),
        (no_live_job, NO_LIVE_ITEM, "live_sync=false"),
    ] {
        let job = fetch_job(&pool, job_id).await?.expect("job exists");
        assert_eq!(job.status, JobStatus::Completed, "item {item_id}");
        let results = job.processing_results.expect("skip metadata recorded");
        assert_eq!(results["skipped"], true, "item {item_id}");
        assert!(
            results["reason"].as_str().unwrap().contains(expect_reason),
            "item {item_id}: unexpected reason {results}"
        );

        let sync = item_sync_fetch(&pool, item_id).await?.expect("item sync row");
        assert_eq!(sync.sync_status, ItemSyncState::Skipped, "item {item_id}");
    }

    assert_eq!(
        erp.attempt_count(),
        0,
        "no skip path may reach the upsert client"
    );
    Ok(())
}
