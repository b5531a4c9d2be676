//! The global sync gate (`opms_sync_config`, key `sync_enabled`).
//!
//! Read-through with a short cache; a stale read of up to five seconds is
//! acceptable to the dispatcher. Fails closed: any database error reports
//! disabled. The gate only answers — enforcement of manual overrides is the
//! dispatcher's job.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::warn;

const CACHE_TTL: Duration = Duration::from_secs(5);

pub struct SyncGate {
    cache: Mutex<Option<(Instant, bool)>>,
    ttl: Duration,
}

impl Default for SyncGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncGate {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(None),
            ttl: CACHE_TTL,
        }
    }

    #[doc(hidden)]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(None),
            ttl,
        }
    }

    /// Whether sync is globally enabled. Errors report disabled.
    pub async fn is_enabled(&self, pool: &PgPool) -> bool {
        {
            let cache = self.cache.lock().expect("gate cache poisoned");
            if let Some((at, v)) = *cache {
                if at.elapsed() < self.ttl {
                    return v;
                }
            }
        }

        let enabled = match self.read(pool).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "sync gate read failed; reporting disabled");
                false
            }
        };

        let mut cache = self.cache.lock().expect("gate cache poisoned");
        *cache = Some((Instant::now(), enabled));
        enabled
    }

    async fn read(&self, pool: &PgPool) -> Result<bool> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            select value from opms_sync_config where key = 'sync_enabled'
            "#,
        )
        .fetch_optional(pool)
        .await
        .context("sync gate query failed")?;

        // Missing key counts as disabled.
        Ok(matches!(row, Some((v,)) if v == "true"))
    }

    /// Operator toggle; also drops the cache so the next read is fresh.
    pub async fn set_enabled(&self, pool: &PgPool, enabled: bool) -> Result<()> {
        sqlx::query(
            r#"
            insert into opms_sync_config (key, value, updated_at)
            values ('sync_enabled', $1, now())
            on conflict (key) do update
                set value = excluded.value, updated_at = now()
            "#,
        )
        .bind(if enabled { "true" } else { "false" })
        .execute(pool)
        .await
        .context("sync gate write failed")?;

        let mut cache = self.cache.lock().expect("gate cache poisoned");
        *cache = None;
        Ok(())
    }
}
