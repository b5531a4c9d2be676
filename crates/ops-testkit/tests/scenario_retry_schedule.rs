//! Scenario: transport failures follow the 2s/4s/8s backoff and the fourth
//! attempt succeeds.
//!
//! The schedule is asserted from `scheduled_at` on the parked row (no
//! wall-clock sleeping); each retry is then forced due so the test runs in
//! milliseconds.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ops_config::EngineConfig;
use ops_db::{enqueue, fetch_job, item_sync_fetch, NewJob, SyncGate, VendorMapper};
use ops_runtime::Dispatcher;
use ops_schemas::{EventData, EventType, ItemSyncState, JobStatus, ManualOpts, Priority};
use ops_testkit::{seed_color, seed_item, seed_product, FakeErp, ScriptedOutcome, SeedItem, SeedProduct};

const PRODUCT: i64 = 940_000;
const ITEM: i64 = 940_001;

#[tokio::test]
async fn three_transport_failures_then_success() -> anyhow::Result<()> {
    let Some(pool) = ops_testkit::scenario_pool().await? else {
        return Ok(());
    };

    sqlx::query("delete from opms_sync_queue where item_id = $1")
        .bind(ITEM)
        .execute(&pool)
        .await?;

    seed_product(
        &pool,
        &SeedProduct {
            id: PRODUCT,
            name: "Harbor".to_string(),
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
            code: "5501-0001".to_string(),
            product_type: "R".to_string(),
        },
    )
    .await?;
    seed_color(&pool, ITEM, 940_010, "Navy").await?;

    let gate = Arc::new(SyncGate::with_ttl(Duration::ZERO));
    gate.set_enabled(&pool, true).await?;

    let job_id = enqueue(
        &pool,
        &NewJob {
            item_id: ITEM,
            product_id: PRODUCT,
            event_type: EventType::Update,
            event_data: EventData::ManualItem {
                opts: ManualOpts::new("tests", "retry schedule"),
            },
            priority: Priority::High,
            max_retries: 3,
        },
    )
    .await?
    .expect("enqueued");

    let erp = Arc::new(FakeErp::new());
    erp.script([
        ScriptedOutcome::TransportFail,
        ScriptedOutcome::TransportFail,
        ScriptedOutcome::TransportFail,
        ScriptedOutcome::Succeed,
    ]);

    let loaded = ops_config::load_layered_with_env(&[], &[])?;
    let cfg = EngineConfig::from_loaded(&loaded);
    let mut dispatcher = Dispatcher::new(
        pool.clone(),
        Arc::clone(&gate),
        Arc::new(VendorMapper::new()),
        Arc::clone(&erp),
        cfg,
    );

    // Three failing passes, asserting the parked delay after each.
    for (expected_retry, expected_delay_ms) in [(1i32, 2_000i64), (2, 4_000), (3, 8_000)] {
        let mut passes = 0;
        loop {
            passes += 1;
            assert!(passes <= 50, "dispatcher never parked retry {expected_retry}");
            dispatcher.run_once().await?;
            let job = fetch_job(&pool, job_id).await?.expect("job exists");
            if job.retry_count == expected_retry {
                assert_eq!(job.status, JobStatus::Pending);
                let delay_ms = (job.scheduled_at - Utc::now()).num_milliseconds();
                assert!(
                    (expected_delay_ms - 1_500..=expected_delay_ms).contains(&delay_ms),
                    "retry {expected_retry}: scheduled {delay_ms}ms out, expected ≈{expected_delay_ms}ms"
                );
                break;
            }
        }
        // Force due so the next pass claims it immediately.
        sqlx::query("update opms_sync_queue set scheduled_at = now() where id = $1")
            .bind(job_id)
            .execute(&pool)
            .await?;
    }

    // Fourth attempt succeeds.
    let mut passes = 0;
    loop {
        passes += 1;
        assert!(passes <= 50, "job never completed");
        dispatcher.run_once().await?;
        let job = fetch_job(&pool, job_id).await?.expect("job exists");
        if job.status == JobStatus::Completed {
            assert_eq!(job.retry_count, 3);
            break;
        }
    }

    let our_attempts = erp
        .attempts()
        .iter()
        .filter(|a| a.item_code == "5501-0001")
        .count();
    assert_eq!(our_attempts, 4, "three failures plus the success");

    let sync = item_sync_fetch(&pool, ITEM).await?.expect("item sync row");
    assert_eq!(sync.sync_status, ItemSyncState::Success);
    Ok(())
}
