//! Vendor identifier mapping (`opms_netsuite_vendor_mapping`).
//!
//! A mapping is trustworthy only while the stored OPMS and ERP vendor names
//! agree; rows failing that equality are invisible to lookups and count as
//! unmapped in the stats. Lookups are cached per vendor id for five
//! minutes. The mapper never propagates database errors — a failed lookup
//! logs and reports `None`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::warn;

const CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MappingStats {
    pub total: i64,
    pub mapped: i64,
    pub coverage_pct: f64,
}

pub struct VendorMapper {
    cache: Mutex<HashMap<i64, (Instant, Option<i64>)>>,
    ttl: Duration,
}

impl Default for VendorMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl VendorMapper {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            ttl: CACHE_TTL,
        }
    }

    #[doc(hidden)]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// ERP vendor id for an OPMS vendor, or `None` when unmapped, name
    /// equality fails, or the lookup errors.
    pub async fn erp_id_for(&self, pool: &PgPool, opms_vendor_id: i64) -> Option<i64> {
        if let Some(hit) = self.cached(opms_vendor_id) {
            return hit;
        }

        let looked_up = match self.lookup(pool, opms_vendor_id).await {
            Ok(v) => v,
            Err(e) => {
                warn!(opms_vendor_id, error = %e, "vendor mapping lookup failed");
                return None;
            }
        };

        let mut cache = self.cache.lock().expect("vendor cache poisoned");
        cache.insert(opms_vendor_id, (Instant::now(), looked_up));
        looked_up
    }

    fn cached(&self, opms_vendor_id: i64) -> Option<Option<i64>> {
        let cache = self.cache.lock().expect("vendor cache poisoned");
        match cache.get(&opms_vendor_id) {
            Some((at, v)) if at.elapsed() < self.ttl => Some(*v),
            _ => None,
        }
    }

    async fn lookup(&self, pool: &PgPool, opms_vendor_id: i64) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            select erp_vendor_id
            from opms_netsuite_vendor_mapping
            where opms_vendor_id = $1
              and opms_name = erp_name
            "#,
        )
        .bind(opms_vendor_id)
        .fetch_optional(pool)
        .await
        .context("vendor mapping query failed")?;
        Ok(row.map(|(id,)| id))
    }

    /// Mapping coverage: total rows, name-equal rows, percentage.
    pub async fn stats(&self, pool: &PgPool) -> Result<MappingStats> {
        let row = sqlx::query(
            r#"
            select
              count(*)::bigint                                   as total,
              count(*) filter (where opms_name = erp_name)::bigint as mapped
            from opms_netsuite_vendor_mapping
            "#,
        )
        .fetch_one(pool)
        .await
        .context("vendor mapping stats failed")?;

        let total: i64 = row.try_get("total")?;
        let mapped: i64 = row.try_get("mapped")?;
        let coverage_pct = if total > 0 {
            (mapped as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        Ok(MappingStats {
            total,
            mapped,
            coverage_pct,
        })
    }
}
