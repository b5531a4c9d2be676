//! Scenario: 25 jobs against the outbound rate window.
//!
//! The dispatcher drains 25 ready jobs through the scripted ERP; the
//! recorded attempt instants must never exceed 10 inside any sliding
//! 1-second window, consecutive attempts must sit ≥100 ms apart, and the
//! whole batch cannot finish in under 2.4 s.

use std::sync::Arc;
use std::time::Duration;

use ops_config::EngineConfig;
use ops_db::{enqueue, NewJob, SyncGate, VendorMapper};
use ops_runtime::Dispatcher;
use ops_schemas::{EventData, EventType, ManualOpts, Priority};
use ops_testkit::{seed_color, seed_item, seed_product, FakeErp, SeedItem, SeedProduct};

const PRODUCT: i64 = 950_000;
const ITEM_BASE: i64 = 950_100;
const JOBS: i64 = 25;

#[tokio::test]
async fn twenty_five_jobs_respect_the_window() -> anyhow::Result<()> {
    let Some(pool) = ops_testkit::scenario_pool().await? else {
        return Ok(());
    };

    sqlx::query("delete from opms_sync_queue where item_id between $1 and $2")
        .bind(ITEM_BASE)
        .bind(ITEM_BASE + JOBS)
        .execute(&pool)
        .await?;

    seed_product(
        &pool,
        &SeedProduct {
            id: PRODUCT,
            name: "Cadence".to_string(),
            width: Some(54.0),
            vertical_repeat: None,
            horizontal_repeat: None,
            prop_65: None,
            ab_2998: None,
        },
    )
    .await?;

    let gate = Arc::new(SyncGate::with_ttl(Duration::ZERO));
    gate.set_enabled(&pool, true).await?;

    for k in 0..JOBS {
        let item_id = ITEM_BASE + k;
        seed_item(
            &pool,
            &SeedItem {
                id: item_id,
                product_id: PRODUCT,
                code: format!("6{:03}-0001", k),
                product_type: "R".to_string(),
            },
        )
        .await?;
        seed_color(&pool, item_id, 950_500 + k, "Fog").await?;
        enqueue(
            &pool,
            &NewJob {
                item_id,
                product_id: PRODUCT,
                event_type: EventType::Update,
                event_data: EventData::ManualItem {
                    opts: ManualOpts::new("tests", "rate limit scenario"),
                },
                priority: Priority::High,
                max_retries: 3,
            },
        )
        .await?
        .expect("job enqueued");
    }

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

    let mut passes = 0;
    while erp.attempt_count() < JOBS as usize {
        passes += 1;
        assert!(passes <= 200, "dispatcher failed to drain the batch");
        dispatcher.run_once().await?;
    }

    let stamps: Vec<_> = erp.attempts().iter().map(|a| a.at).collect();
    assert_eq!(stamps.len() as i64, JOBS);

    // ≤10 in any sliding 1-second window.
    for (i, &t) in stamps.iter().enumerate() {
        let in_window = stamps[..=i]
            .iter()
            .filter(|&&s| t.duration_since(s) < Duration::from_secs(1))
            .count();
        assert!(in_window <= 10, "rate window exceeded at attempt {i}");
    }

    // ≥100 ms between consecutive attempts.
    for pair in stamps.windows(2) {
        let gap = pair[1].duration_since(pair[0]);
        assert!(
            gap >= Duration::from_millis(95),
            "spacing violated: {gap:?}"
        );
    }

    // 25 attempts cannot complete faster than 2.4 s.
    let elapsed = stamps.last().unwrap().duration_since(stamps[0]);
    assert!(
        elapsed >= Duration::from_millis(2_400),
        "batch finished too fast: {elapsed:?}"
    );
    Ok(())
}
