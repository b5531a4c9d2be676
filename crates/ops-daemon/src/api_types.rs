//! Request/response DTOs for the daemon's HTTP surface.

use serde::{Deserialize, Serialize};

use ops_runtime::HealthReport;
use ops_schemas::{ErpEnvironment, Priority, WebhookOutcome};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub daemon_uptime_secs: u64,
    pub config_hash: String,
    pub sync_enabled: bool,
    pub paused: bool,
    pub health: HealthReport,
    /// Trailing-hour queue activity.
    pub queue_activity: ops_db::QueueStats,
    pub vendor_mapping: ops_db::MappingStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Manual triggers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerItemRequest {
    pub item_id: i64,
    pub triggered_by: String,
    pub reason: String,
    #[serde(default)]
    pub env_override: Option<ErpEnvironment>,
    /// Defaults to a live run; false ends in SKIPPED without a network call.
    #[serde(default = "default_true")]
    pub live_sync: bool,
    #[serde(default)]
    pub config_override: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerProductRequest {
    pub product_id: i64,
    pub triggered_by: String,
    pub reason: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub env_override: Option<ErpEnvironment>,
    #[serde(default = "default_true")]
    pub live_sync: bool,
    #[serde(default)]
    pub config_override: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerItemResponse {
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerProductResponse {
    pub items: Vec<TriggerProductItem>,
    pub enqueued: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerProductItem {
    pub item_id: i64,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Dry run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DryRunRequest {
    pub item_id: i64,
    #[serde(default)]
    pub environment: Option<ErpEnvironment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DryRunResponse {
    pub simulated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponse {
    #[serde(flatten)]
    pub outcome: WebhookOutcome,
}
