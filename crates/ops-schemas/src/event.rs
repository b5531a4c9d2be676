//! Typed event data carried inside each queue row.
//!
//! The queue column `event_data` is jsonb; this sum type replaces the loose
//! maps the detector layers would otherwise write. The `source` tag keys the
//! provenance of the job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ErpEnvironment;

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Where a detected change came from. Persisted in `opms_change_log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provenance {
    Trigger,
    Polling,
    Manual,
    Webhook,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Trigger => "TRIGGER",
            Provenance::Polling => "POLLING",
            Provenance::Manual => "MANUAL",
            Provenance::Webhook => "WEBHOOK",
        }
    }
}

// ---------------------------------------------------------------------------
// ManualOpts
// ---------------------------------------------------------------------------

/// Operator-supplied context on a manual trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualOpts {
    /// Identity of the operator who requested the sync.
    pub triggered_by: String,
    pub reason: String,
    /// Route this job to a specific ERP environment instead of the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_override: Option<ErpEnvironment>,
    /// false = run extraction + build but end SKIPPED without a network call.
    pub live_sync: bool,
    /// Permit dispatch even while sync is globally disabled.
    #[serde(default)]
    pub config_override: bool,
}

impl ManualOpts {
    pub fn new(triggered_by: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            triggered_by: triggered_by.into(),
            reason: reason.into(),
            env_override: None,
            live_sync: true,
            config_override: false,
        }
    }
}

// ---------------------------------------------------------------------------
// EventData
// ---------------------------------------------------------------------------

/// Structured provenance + options for one sync job.
///
/// `WebhookCascade` is reserved: the sibling-item cascade is not wired up,
/// but rows written by a future cascade deserialize cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventData {
    /// Deposited by a database trigger on the item or product table.
    Trigger {
        table: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        change_fields: Vec<String>,
    },
    /// Backup detection: modification timestamp passed the poll watermark.
    Polling { watermark: DateTime<Utc> },
    ManualItem { opts: ManualOpts },
    ManualProduct { product_id: i64, opts: ManualOpts },
    WebhookCascade { origin_item_id: i64 },
}

impl EventData {
    pub fn provenance(&self) -> Provenance {
        match self {
            EventData::Trigger { .. } => Provenance::Trigger,
            EventData::Polling { .. } => Provenance::Polling,
            EventData::ManualItem { .. } | EventData::ManualProduct { .. } => Provenance::Manual,
            EventData::WebhookCascade { .. } => Provenance::Webhook,
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(
            self,
            EventData::ManualItem { .. } | EventData::ManualProduct { .. }
        )
    }

    pub fn manual_opts(&self) -> Option<&ManualOpts> {
        match self {
            EventData::ManualItem { opts } => Some(opts),
            EventData::ManualProduct { opts, .. } => Some(opts),
            _ => None,
        }
    }

    /// Non-manual jobs always go live; manual jobs honor the flag.
    pub fn live_sync(&self) -> bool {
        self.manual_opts().map(|o| o.live_sync).unwrap_or(true)
    }

    /// Only manual jobs may override the global gate.
    pub fn config_override(&self) -> bool {
        self.manual_opts().map(|o| o.config_override).unwrap_or(false)
    }

    pub fn env_override(&self) -> Option<ErpEnvironment> {
        self.manual_opts().and_then(|o| o.env_override)
    }
}
