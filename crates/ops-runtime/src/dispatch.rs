//! The dispatcher: a single cooperative worker that owns all outbound ERP
//! traffic.
//!
//! One job is processed end-to-end before the next claim, so per-item and
//! global serialization both fall out of the claim protocol plus this
//! loop's shape. Every error is caught here; an iteration never throws
//! past itself.

use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::{error, info, warn};

use ops_config::EngineConfig;
use ops_db::{
    claim_next, item_sync_mark, mark_completed, mark_failed, reclaim_stale, schedule_retry,
    NewItemSyncMark, SyncGate, SyncJobRow, VendorMapper,
};
use ops_detect::is_digital;
use ops_erp::{ErpApi, FailureClass, UpsertError};
use ops_extract::{extract, validate, ExtractError, ExtractOptions};
use ops_payload::build;
use ops_schemas::ItemSyncState;

use crate::backoff::retry_delay_ms;
use crate::limiter::RateLimiter;

pub const DISPATCHER_ID: &str = "ops-dispatcher";

/// Message recorded when sync is globally off and the job carries no
/// override.
pub const DISABLED_MESSAGE: &str = "Sync disabled by configuration";

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// What a processed job should do to its queue row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// COMPLETED after a confirmed upsert.
    Complete {
        erp_id: Option<String>,
        operation: Option<String>,
        validation_summary: Option<serde_json::Value>,
    },
    /// COMPLETED with skip metadata; no upsert happened.
    Skip { reason: String },
    Retry { delay_ms: u64, error: String },
    /// Terminal FAILED.
    Fail { error: String },
}

/// Decide what a failed upsert does next. Pure: the retry engine is a
/// function of the error class and counters, never of a call stack.
pub fn failure_transition(
    err: &UpsertError,
    failures_so_far: u32,
    max_retries: u32,
    retry_semantic: bool,
    base_ms: u64,
    max_ms: u64,
) -> Transition {
    let retryable = match err.class() {
        FailureClass::Transient => true,
        FailureClass::Semantic => retry_semantic,
        FailureClass::Permanent => false,
    };

    if retryable && failures_so_far <= max_retries {
        Transition::Retry {
            delay_ms: retry_delay_ms(failures_so_far, base_ms, max_ms),
            error: err.to_string(),
        }
    } else if retryable {
        Transition::Fail {
            error: format!("PERMANENT FAILURE: retries exhausted: {err}"),
        }
    } else {
        Transition::Fail {
            error: format!("PERMANENT FAILURE: {err}"),
        }
    }
}

/// Same decision for transient extraction failures.
pub fn extraction_failure_transition(
    err: &ExtractError,
    failures_so_far: u32,
    max_retries: u32,
    base_ms: u64,
    max_ms: u64,
) -> Transition {
    if failures_so_far <= max_retries {
        Transition::Retry {
            delay_ms: retry_delay_ms(failures_so_far, base_ms, max_ms),
            error: err.to_string(),
        }
    } else {
        Transition::Fail {
            error: format!("PERMANENT FAILURE: retries exhausted: {err}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher<E: ErpApi> {
    pool: PgPool,
    gate: std::sync::Arc<SyncGate>,
    mapper: std::sync::Arc<VendorMapper>,
    erp: E,
    cfg: EngineConfig,
    limiter: RateLimiter,
    /// Set after every processed job; surfaced by health checks.
    pub last_dispatch_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl<E: ErpApi> Dispatcher<E> {
    pub fn new(
        pool: PgPool,
        gate: std::sync::Arc<SyncGate>,
        mapper: std::sync::Arc<VendorMapper>,
        erp: E,
        cfg: EngineConfig,
    ) -> Self {
        let limiter = RateLimiter::new(
            cfg.sync.rate_max_per_window as usize,
            std::time::Duration::from_millis(cfg.sync.rate_window_ms),
            std::time::Duration::from_millis(cfg.sync.min_spacing_ms),
        );
        Self {
            pool,
            gate,
            mapper,
            erp,
            cfg,
            limiter,
            last_dispatch_at: None,
        }
    }

    /// One wake: reclaim stale leases, claim at most one job, process it.
    /// Returns true when a job was processed (the caller loops immediately
    /// to drain instead of sleeping the full interval).
    pub async fn run_once(&mut self) -> Result<bool> {
        reclaim_stale(&self.pool, self.cfg.sync.lease_ttl_secs).await?;

        let mut claimed = claim_next(&self.pool, 1, DISPATCHER_ID).await?;
        let Some(job) = claimed.pop() else {
            return Ok(false);
        };

        let job_id = job.id;
        let item_id = job.item_id;

        // The item is now exclusively ours; reflect that on its sync row.
        item_sync_mark(
            &self.pool,
            &NewItemSyncMark {
                item_id,
                sync_status: ItemSyncState::InProgress,
                erp_item_id: None,
                last_error: None,
                field_validation_summary: None,
            },
        )
        .await?;

        let transition = match self.process(&job).await {
            Ok(t) => t,
            Err(e) => {
                // Infrastructure fault mid-processing: park the job for a
                // retry rather than losing it in PROCESSING.
                error!(job_id, item_id, error = %e, "dispatch iteration failed");
                extraction_failure_transition(
                    &ExtractError::Db(e),
                    job.retry_count as u32 + 1,
                    job.max_retries as u32,
                    self.cfg.sync.retry_base_ms,
                    self.cfg.sync.retry_max_ms,
                )
            }
        };

        self.record_transition(&job, transition).await?;
        self.last_dispatch_at = Some(chrono::Utc::now());
        Ok(true)
    }

    /// Process one claimed job through gate, guards, extraction, build and
    /// the rate-limited upsert.
    async fn process(&mut self, job: &SyncJobRow) -> Result<Transition> {
        // Re-check the gate at dispatch time; enqueue-time checks can be
        // minutes stale by now.
        if !self.gate.is_enabled(&self.pool).await && !job.event_data.config_override() {
            return Ok(Transition::Fail {
                error: DISABLED_MESSAGE.to_string(),
            });
        }

        // Digital guard ahead of extraction, on whatever identity the
        // catalog currently holds.
        if let Some((product_type, code)) = self.item_identity(job.item_id).await? {
            if is_digital(&product_type, &code) {
                return Ok(Transition::Skip {
                    reason: "Digital item is excluded from sync".to_string(),
                });
            }
        }

        let extracted = match extract(
            &self.pool,
            &self.mapper,
            job.item_id,
            ExtractOptions::default(),
        )
        .await
        {
            Ok(x) => x,
            Err(ExtractError::NotSyncable(reason)) => {
                return Ok(Transition::Skip {
                    reason: reason.message().to_string(),
                });
            }
            Err(e) => {
                warn!(job_id = job.id, item_id = job.item_id, error = %e, "extraction failed; transient");
                return Ok(extraction_failure_transition(
                    &e,
                    job.retry_count as u32 + 1,
                    job.max_retries as u32,
                    self.cfg.sync.retry_base_ms,
                    self.cfg.sync.retry_max_ms,
                ));
            }
        };

        let validated = validate(&extracted);
        let payload = build(&validated, &self.cfg.erp.tax_schedule_id);

        if !job.event_data.live_sync() {
            return Ok(Transition::Skip {
                reason: "Manual trigger with live_sync=false; no network call".to_string(),
            });
        }

        // Global throughput cap; the limiter owns the schedule.
        let wait = self.limiter.required_delay(Instant::now());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        self.limiter.record(Instant::now());

        let summary = serde_json::to_value(validated.summary).ok();
        match self.erp.upsert(&payload, job.event_data.env_override()).await {
            Ok(resp) => Ok(Transition::Complete {
                erp_id: resp.id.clone(),
                operation: resp.operation.clone(),
                validation_summary: summary,
            }),
            Err(e) => Ok(failure_transition(
                &e,
                job.retry_count as u32 + 1,
                job.max_retries as u32,
                self.cfg.sync.retry_semantic_rejections,
                self.cfg.sync.retry_base_ms,
                self.cfg.sync.retry_max_ms,
            )),
        }
    }

    async fn item_identity(&self, item_id: i64) -> Result<Option<(String, String)>> {
        let row = sqlx::query(
            "select product_type, coalesce(code, '') as code from opms_item where id = $1",
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .context("item identity lookup failed")?;
        match row {
            Some(row) => Ok(Some((row.try_get("product_type")?, row.try_get("code")?))),
            None => Ok(None),
        }
    }

    /// Record the transition on the queue row and the item-sync row.
    async fn record_transition(&self, job: &SyncJobRow, transition: Transition) -> Result<()> {
        match transition {
            Transition::Complete {
                erp_id,
                operation,
                validation_summary,
            } => {
                mark_completed(
                    &self.pool,
                    job.id,
                    json!({"erp_id": &erp_id, "operation": &operation}),
                )
                .await?;
                item_sync_mark(
                    &self.pool,
                    &NewItemSyncMark {
                        item_id: job.item_id,
                        sync_status: ItemSyncState::Success,
                        erp_item_id: erp_id.clone(),
                        last_error: None,
                        field_validation_summary: validation_summary,
                    },
                )
                .await?;
                info!(job_id = job.id, item_id = job.item_id, erp_id = ?erp_id, "job completed");
            }
            Transition::Skip { reason } => {
                mark_completed(&self.pool, job.id, json!({"skipped": true, "reason": &reason}))
                    .await?;
                item_sync_mark(
                    &self.pool,
                    &NewItemSyncMark {
                        item_id: job.item_id,
                        sync_status: ItemSyncState::Skipped,
                        erp_item_id: None,
                        last_error: Some(reason.clone()),
                        field_validation_summary: None,
                    },
                )
                .await?;
                info!(job_id = job.id, item_id = job.item_id, reason = %reason, "job skipped");
            }
            Transition::Retry { delay_ms, error } => {
                schedule_retry(&self.pool, job.id, delay_ms, &error).await?;
                item_sync_mark(
                    &self.pool,
                    &NewItemSyncMark {
                        item_id: job.item_id,
                        sync_status: ItemSyncState::InProgress,
                        erp_item_id: None,
                        last_error: Some(error.clone()),
                        field_validation_summary: None,
                    },
                )
                .await?;
                warn!(job_id = job.id, item_id = job.item_id, delay_ms, error = %error, "job scheduled for retry");
            }
            Transition::Fail { error } => {
                mark_failed(&self.pool, job.id, &error).await?;
                item_sync_mark(
                    &self.pool,
                    &NewItemSyncMark {
                        item_id: job.item_id,
                        sync_status: ItemSyncState::Failed,
                        erp_item_id: None,
                        last_error: Some(error.clone()),
                        field_validation_summary: None,
                    },
                )
                .await?;
                error!(job_id = job.id, item_id = job.item_id, error = %error, "job failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ops_schemas::ErpEnvironment;

    fn transport() -> UpsertError {
        UpsertError::Transport("connect refused".to_string())
    }

    fn semantic() -> UpsertError {
        UpsertError::Semantic {
            message: "duplicate item".to_string(),
        }
    }

    #[test]
    fn transient_failures_follow_the_backoff_schedule() {
        for (failures, expect) in [(1u32, 2_000u64), (2, 4_000), (3, 8_000)] {
            match failure_transition(&transport(), failures, 3, true, 2_000, 30_000) {
                Transition::Retry { delay_ms, .. } => assert_eq!(delay_ms, expect),
                other => panic!("expected retry, got {other:?}"),
            }
        }
    }

    #[test]
    fn exhausted_retries_fail_with_permanent_marker() {
        match failure_transition(&transport(), 4, 3, true, 2_000, 30_000) {
            Transition::Fail { error } => {
                assert!(error.contains("PERMANENT FAILURE"));
                assert!(error.contains("retries exhausted"));
            }
            other => panic!("expected fail, got {other:?}"),
        }
    }

    #[test]
    fn semantic_rejections_retry_only_under_policy() {
        assert!(matches!(
            failure_transition(&semantic(), 1, 3, true, 2_000, 30_000),
            Transition::Retry { .. }
        ));
        assert!(matches!(
            failure_transition(&semantic(), 1, 3, false, 2_000, 30_000),
            Transition::Fail { .. }
        ));
    }

    #[test]
    fn permanent_config_errors_never_retry() {
        let e = UpsertError::MissingEndpoint(ErpEnvironment::Production);
        assert!(matches!(
            failure_transition(&e, 1, 3, true, 2_000, 30_000),
            Transition::Fail { .. }
        ));
    }

    #[test]
    fn extraction_no_row_is_transient() {
        let e = ExtractError::NoRow { item_id: 7 };
        match extraction_failure_transition(&e, 1, 3, 2_000, 30_000) {
            Transition::Retry { delay_ms, .. } => assert_eq!(delay_ms, 2_000),
            other => panic!("expected retry, got {other:?}"),
        }
    }
}
