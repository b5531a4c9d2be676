//! ops-testkit
//!
//! Test doubles and fixtures for scenario tests: a scripted ERP adapter
//! implementing the production `ErpApi` seam, and catalog fixture helpers
//! for tests that run against a real Postgres (gated on
//! `OPS_DATABASE_URL`; see the scenario files under `tests/`).

mod fake_erp;
mod fixtures;

pub use fake_erp::{Attempt, FakeErp, ScriptedOutcome};
pub use fixtures::{ensure_catalog_fixtures, seed_color, seed_item, seed_product, SeedItem, SeedProduct};

/// Pool for a DB-gated scenario: `None` (with a SKIP note) when
/// `OPS_DATABASE_URL` is unset, otherwise a migrated pool with catalog
/// fixtures in place.
pub async fn scenario_pool() -> anyhow::Result<Option<sqlx::PgPool>> {
    if std::env::var(ops_db::ENV_DB_URL).is_err() {
        eprintln!("SKIP: {} not set", ops_db::ENV_DB_URL);
        return Ok(None);
    }
    let pool = ops_db::testkit_db_pool().await?;
    ensure_catalog_fixtures(&pool).await?;
    Ok(Some(pool))
}
