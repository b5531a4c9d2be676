//! ops-schemas
//!
//! Shared wire and queue types for the OPMS ⇄ ERP sync engine. Everything
//! here is plain data: serde round-trippable, no IO, no clocks. The string
//! forms of the enums are the exact values persisted in `opms_sync_queue`
//! and `opms_item_sync`, so `as_str`/`parse` pairs are the single source of
//! truth for both directions.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod event;
mod payload;
mod webhook;

pub use event::{EventData, ManualOpts, Provenance};
pub use payload::{ErpUpsertPayload, ErpUpsertResponse, SENTINEL};
pub use webhook::{PriceSnapshot, PricingWebhook, WebhookOutcome};

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

/// What kind of OPMS mutation produced a sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Create,
    Update,
    Delete,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Create => "CREATE",
            EventType::Update => "UPDATE",
            EventType::Delete => "DELETE",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "CREATE" => Ok(EventType::Create),
            "UPDATE" => Ok(EventType::Update),
            "DELETE" => Ok(EventType::Delete),
            other => Err(anyhow!("invalid event type: {}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Queue priority. Claim order is priority first, then insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Normal => "NORMAL",
            Priority::Low => "LOW",
        }
    }

    /// Numeric rank used by the claim query's ORDER BY (lower claims first).
    pub fn rank(&self) -> i16 {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "HIGH" => Ok(Priority::High),
            "NORMAL" => Ok(Priority::Normal),
            "LOW" => Ok(Priority::Low),
            other => Err(anyhow!("invalid priority: {}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a queue row: PENDING → PROCESSING → (COMPLETED | FAILED |
/// PENDING with a future scheduled_at). COMPLETED and FAILED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(anyhow!("invalid job status: {}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// ItemSyncState
// ---------------------------------------------------------------------------

/// Per-item latest outcome recorded in `opms_item_sync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemSyncState {
    Success,
    Skipped,
    InProgress,
    Failed,
}

impl ItemSyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemSyncState::Success => "SUCCESS",
            ItemSyncState::Skipped => "SKIPPED",
            ItemSyncState::InProgress => "IN_PROGRESS",
            ItemSyncState::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "SUCCESS" => Ok(ItemSyncState::Success),
            "SKIPPED" => Ok(ItemSyncState::Skipped),
            "IN_PROGRESS" => Ok(ItemSyncState::InProgress),
            "FAILED" => Ok(ItemSyncState::Failed),
            other => Err(anyhow!("invalid item sync state: {}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// ErpEnvironment
// ---------------------------------------------------------------------------

/// Which ERP deployment a request is routed to. Resolution order is
/// explicit per-job override > configured environment > Sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErpEnvironment {
    Production,
    Sandbox,
}

impl ErpEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErpEnvironment::Production => "prod",
            ErpEnvironment::Sandbox => "sandbox",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "prod" | "production" => Ok(ErpEnvironment::Production),
            "sandbox" | "sb" => Ok(ErpEnvironment::Sandbox),
            other => Err(anyhow!("invalid erp environment: {}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// FieldState / ValidationSummary
// ---------------------------------------------------------------------------

/// Classification of one logical field on the extraction surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldState {
    /// Field carried a meaningful value.
    HasData,
    /// Null, empty string, whitespace-only, or empty collection in OPMS.
    SrcEmpty,
    /// The column never arrived from the query layer (internal bug).
    QueryFailed,
}

/// Per-extraction counts of the three field classifications, attached to
/// every emitted payload for auditability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub has_data: u32,
    pub src_empty: u32,
    pub query_failed: u32,
}

impl ValidationSummary {
    pub fn count(&mut self, state: FieldState) {
        match state {
            FieldState::HasData => self.has_data += 1,
            FieldState::SrcEmpty => self.src_empty += 1,
            FieldState::QueryFailed => self.query_failed += 1,
        }
    }

    /// Serialized counts carried in `custitem_opms_field_validation_summary`.
    pub fn wire_string(&self) -> String {
        format!(
            "has_data={} src_empty={} query_failed={}",
            self.has_data, self.src_empty, self.query_failed
        )
    }
}

// ---------------------------------------------------------------------------
// DryRunRecord
// ---------------------------------------------------------------------------

/// Captured output of a dry-run: the payload that would have been sent, the
/// validation outcome, and a simulated response. No network is involved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DryRunRecord {
    pub item_id: i64,
    pub environment: ErpEnvironment,
    pub payload: serde_json::Value,
    pub validation_summary: ValidationSummary,
    pub simulated_response: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(s.as_str()).unwrap(), s);
        }
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn priority_rank_orders_high_first() {
        assert!(Priority::High.rank() < Priority::Normal.rank());
        assert!(Priority::Normal.rank() < Priority::Low.rank());
    }

    #[test]
    fn environment_accepts_aliases() {
        assert_eq!(
            ErpEnvironment::parse("production").unwrap(),
            ErpEnvironment::Production
        );
        assert_eq!(ErpEnvironment::parse("sb").unwrap(), ErpEnvironment::Sandbox);
        assert!(ErpEnvironment::parse("staging").is_err());
    }

    #[test]
    fn validation_summary_counts_and_serializes() {
        let mut s = ValidationSummary::default();
        s.count(FieldState::HasData);
        s.count(FieldState::HasData);
        s.count(FieldState::SrcEmpty);
        s.count(FieldState::QueryFailed);
        assert_eq!(s.wire_string(), "has_data=2 src_empty=1 query_failed=1");
    }
}
