//! Typed view over the merged config tree.
//!
//! All tuning knobs have defaults matching the dispatcher/retry contract;
//! ERP credentials have none and stay `Option` so the daemon can boot in a
//! degraded read-only mode without them (health reports the gap).

use serde_json::Value;

use ops_schemas::ErpEnvironment;

use crate::{cfg_bool, cfg_env, cfg_str, cfg_u64, LoadedConfig};

// ---------------------------------------------------------------------------
// ErpConfig
// ---------------------------------------------------------------------------

/// Endpoint + credential set for the ERP upsert client.
#[derive(Debug, Clone)]
pub struct ErpConfig {
    pub account: Option<String>,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub token_id: Option<String>,
    pub token_secret: Option<String>,
    /// OAuth realm; defaults to the account id when unset.
    pub realm: Option<String>,
    pub upsert_url_prod: Option<String>,
    pub upsert_url_sandbox: Option<String>,
    /// Script/deployment identifiers embedded as query parameters.
    pub script_id: String,
    pub deploy_id: String,
    pub environment: ErpEnvironment,
    pub timeout_secs: u64,
    pub tax_schedule_id: String,
    pub subsidiary_id: String,
}

impl ErpConfig {
    pub fn has_credentials(&self) -> bool {
        self.consumer_key.is_some()
            && self.consumer_secret.is_some()
            && self.token_id.is_some()
            && self.token_secret.is_some()
    }

    pub fn url_for(&self, env: ErpEnvironment) -> Option<&str> {
        match env {
            ErpEnvironment::Production => self.upsert_url_prod.as_deref(),
            ErpEnvironment::Sandbox => self.upsert_url_sandbox.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// SyncTuning
// ---------------------------------------------------------------------------

/// Dispatcher / retry / polling knobs. Defaults are the contract values.
#[derive(Debug, Clone)]
pub struct SyncTuning {
    pub dispatch_interval_secs: u64,
    /// Outbound cap inside one rate window.
    pub rate_max_per_window: u64,
    pub rate_window_ms: u64,
    /// Minimum spacing between any two outbound requests.
    pub min_spacing_ms: u64,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    pub max_retries: u32,
    pub poll_interval_secs: u64,
    pub poll_batch_limit: u64,
    /// PROCESSING rows older than this are reclaimable.
    pub lease_ttl_secs: u64,
    /// Whether ERP `success=false` responses retry like transport failures.
    pub retry_semantic_rejections: bool,
    pub webhook_min_spacing_ms: u64,
    pub supervisor_max_restarts: u32,
    /// Hard-stop grace window on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            dispatch_interval_secs: 5,
            rate_max_per_window: 10,
            rate_window_ms: 1_000,
            min_spacing_ms: 100,
            retry_base_ms: 2_000,
            retry_max_ms: 30_000,
            max_retries: 3,
            poll_interval_secs: 60,
            poll_batch_limit: 100,
            lease_ttl_secs: 600,
            retry_semantic_rejections: true,
            webhook_min_spacing_ms: 1_000,
            supervisor_max_restarts: 3,
            shutdown_grace_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub erp: ErpConfig,
    pub sync: SyncTuning,
    pub config_hash: String,
}

impl EngineConfig {
    pub fn from_loaded(loaded: &LoadedConfig) -> Self {
        let v = &loaded.config_json;
        Self {
            erp: Self::erp_from(v),
            sync: Self::sync_from(v),
            config_hash: loaded.config_hash.clone(),
        }
    }

    fn erp_from(v: &Value) -> ErpConfig {
        let account = string_ish(v, "/erp/account");
        ErpConfig {
            realm: cfg_str(v, "/erp/realm").or_else(|| account.clone()),
            account,
            consumer_key: cfg_str(v, "/erp/consumer_key"),
            consumer_secret: cfg_str(v, "/erp/consumer_secret"),
            token_id: cfg_str(v, "/erp/token_id"),
            token_secret: cfg_str(v, "/erp/token_secret"),
            upsert_url_prod: cfg_str(v, "/erp/upsert_url_prod"),
            upsert_url_sandbox: cfg_str(v, "/erp/upsert_url_sandbox"),
            script_id: string_ish(v, "/erp/script_id").unwrap_or_else(|| "customscript_opms_upsert".to_string()),
            deploy_id: string_ish(v, "/erp/deploy_id").unwrap_or_else(|| "customdeploy1".to_string()),
            environment: cfg_env(v, "/erp/environment", ErpEnvironment::Sandbox),
            timeout_secs: cfg_u64(v, "/erp/timeout_secs", 30),
            tax_schedule_id: string_ish(v, "/erp/tax_schedule_id").unwrap_or_else(|| "2".to_string()),
            subsidiary_id: string_ish(v, "/erp/subsidiary_id").unwrap_or_else(|| "1".to_string()),
        }
    }

    fn sync_from(v: &Value) -> SyncTuning {
        let d = SyncTuning::default();
        SyncTuning {
            dispatch_interval_secs: cfg_u64(v, "/sync/dispatch_interval_secs", d.dispatch_interval_secs),
            rate_max_per_window: cfg_u64(v, "/sync/rate_max_per_window", d.rate_max_per_window),
            rate_window_ms: cfg_u64(v, "/sync/rate_window_ms", d.rate_window_ms),
            min_spacing_ms: cfg_u64(v, "/sync/min_spacing_ms", d.min_spacing_ms),
            retry_base_ms: cfg_u64(v, "/sync/retry_base_ms", d.retry_base_ms),
            retry_max_ms: cfg_u64(v, "/sync/retry_max_ms", d.retry_max_ms),
            max_retries: cfg_u64(v, "/sync/max_retries", d.max_retries as u64) as u32,
            poll_interval_secs: cfg_u64(v, "/sync/poll_interval_secs", d.poll_interval_secs),
            poll_batch_limit: cfg_u64(v, "/sync/poll_batch_limit", d.poll_batch_limit),
            lease_ttl_secs: cfg_u64(v, "/sync/lease_ttl_secs", d.lease_ttl_secs),
            retry_semantic_rejections: cfg_bool(
                v,
                "/sync/retry_semantic_rejections",
                d.retry_semantic_rejections,
            ),
            webhook_min_spacing_ms: cfg_u64(v, "/sync/webhook_min_spacing_ms", d.webhook_min_spacing_ms),
            supervisor_max_restarts: cfg_u64(
                v,
                "/sync/supervisor_max_restarts",
                d.supervisor_max_restarts as u64,
            ) as u32,
            shutdown_grace_secs: cfg_u64(v, "/sync/shutdown_grace_secs", d.shutdown_grace_secs),
        }
    }
}

/// Accept both string and numeric spellings (env overlay coerces "123456"
/// to a number; ERP account ids like "123456_SB2" stay strings).
fn string_ish(v: &Value, ptr: &str) -> Option<String> {
    match v.pointer(ptr) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_layered_with_env;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_dispatch_contract() {
        let loaded = load_layered_with_env(&[], &[]).unwrap();
        let cfg = EngineConfig::from_loaded(&loaded);
        assert_eq!(cfg.sync.dispatch_interval_secs, 5);
        assert_eq!(cfg.sync.rate_max_per_window, 10);
        assert_eq!(cfg.sync.rate_window_ms, 1_000);
        assert_eq!(cfg.sync.min_spacing_ms, 100);
        assert_eq!(cfg.sync.retry_base_ms, 2_000);
        assert_eq!(cfg.sync.retry_max_ms, 30_000);
        assert_eq!(cfg.sync.max_retries, 3);
        assert_eq!(cfg.sync.poll_interval_secs, 60);
        assert_eq!(cfg.sync.poll_batch_limit, 100);
        assert_eq!(cfg.sync.lease_ttl_secs, 600);
        assert!(cfg.sync.retry_semantic_rejections);
        assert_eq!(cfg.erp.timeout_secs, 30);
        assert_eq!(cfg.erp.environment, ErpEnvironment::Sandbox);
    }

    #[test]
    fn env_overrides_reach_the_view() {
        let loaded = load_layered_with_env(
            &[],
            &env(&[
                ("OPS_ERP_ACCOUNT", "123456_SB2"),
                ("OPS_ERP_CONSUMER_KEY", "ck"),
                ("OPS_ERP_CONSUMER_SECRET", "cs"),
                ("OPS_ERP_TOKEN_ID", "tid"),
                ("OPS_ERP_TOKEN_SECRET", "ts"),
                ("OPS_ERP_ENVIRONMENT", "prod"),
                ("OPS_SYNC_MAX_RETRIES", "5"),
            ]),
        )
        .unwrap();
        let cfg = EngineConfig::from_loaded(&loaded);
        assert!(cfg.erp.has_credentials());
        assert_eq!(cfg.erp.account.as_deref(), Some("123456_SB2"));
        // realm falls back to the account id
        assert_eq!(cfg.erp.realm.as_deref(), Some("123456_SB2"));
        assert_eq!(cfg.erp.environment, ErpEnvironment::Production);
        assert_eq!(cfg.sync.max_retries, 5);
    }

    #[test]
    fn missing_credentials_detected() {
        let loaded = load_layered_with_env(&[], &env(&[("OPS_ERP_CONSUMER_KEY", "ck")])).unwrap();
        let cfg = EngineConfig::from_loaded(&loaded);
        assert!(!cfg.erp.has_credentials());
    }
}
