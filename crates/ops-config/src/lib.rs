//! ops-config
//!
//! Configuration for the sync engine: layered YAML files deep-merged in
//! order, then `OPS_*` environment variables overlaid on top, canonicalized
//! to JSON and hashed. The hash is reported by `/v1/status` so operators can
//! tell at a glance which configuration a daemon is running.
//!
//! Credentials (consumer/token secrets) normally arrive via the env overlay
//! rather than files; nothing in this crate writes them anywhere.

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

use ops_schemas::ErpEnvironment;

pub const ENV_PREFIX: &str = "OPS_";

mod view;

pub use view::{EngineConfig, ErpConfig, SyncTuning};

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_json: Value,
    pub canonical_json: String,
    pub config_hash: String,
}

/// Load + merge YAML files in order, overlay `OPS_*` env vars, then
/// canonicalize and hash. Later files override earlier files via deep-merge;
/// env vars override everything.
pub fn load_layered(paths: &[&str]) -> Result<LoadedConfig> {
    let env_vars: Vec<(String, String)> = std::env::vars().collect();
    load_layered_with_env(paths, &env_vars)
}

/// Same as [`load_layered`] but with an explicit env var list (testable).
pub fn load_layered_with_env(paths: &[&str], env_vars: &[(String, String)]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());

    for p in paths {
        let s = fs::read_to_string(p).with_context(|| format!("read config: {p}"))?;
        let yaml_val: serde_yaml::Value =
            serde_yaml::from_str(&s).with_context(|| format!("parse yaml: {p}"))?;
        let json_val = serde_json::to_value(yaml_val).context("yaml->json conversion failed")?;
        deep_merge(&mut merged, json_val);
    }

    apply_env_overlay(&mut merged, env_vars)?;

    let canonical = canonicalize_json(&merged)?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let hash = hex::encode(hasher.finalize());

    Ok(LoadedConfig {
        config_json: serde_json::from_str(&canonical).context("canonical json parse failed")?,
        canonical_json: canonical,
        config_hash: hash,
    })
}

/// Deep-merge: objects merge recursively; arrays replaced; scalars overwritten.
fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

/// Overlay env vars onto the merged tree.
///
/// `OPS_ERP_CONSUMER_KEY=k` becomes `/erp/consumer_key = "k"`: the first
/// underscore-separated segment after the prefix selects the section, the
/// rest (joined back with underscores) is the key inside it. Values parse as
/// bool/number when they look like one, string otherwise.
fn apply_env_overlay(merged: &mut Value, env_vars: &[(String, String)]) -> Result<()> {
    for (name, raw) in env_vars {
        let Some(rest) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let Some((section, key)) = rest.split_once('_') else {
            continue;
        };
        if section.is_empty() || key.is_empty() {
            continue;
        }

        let section = section.to_ascii_lowercase();
        let key = key.to_ascii_lowercase();
        let value = coerce_scalar(raw);

        let root = merged
            .as_object_mut()
            .ok_or_else(|| anyhow!("config root is not an object"))?;
        let slot = root
            .entry(section.clone())
            .or_insert_with(|| Value::Object(Default::default()));
        match slot.as_object_mut() {
            Some(obj) => {
                obj.insert(key, value);
            }
            None => {
                // A file set this section to a scalar; env wins and reshapes it.
                let mut obj = serde_json::Map::new();
                obj.insert(key, value);
                *slot = Value::Object(obj);
            }
        }
    }
    Ok(())
}

fn coerce_scalar(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::from(f);
    }
    Value::String(raw.to_string())
}

// ---------------------------------------------------------------------------
// Canonicalization
// ---------------------------------------------------------------------------

/// Canonicalize JSON by sorting all object keys recursively and emitting
/// compact JSON.
fn canonicalize_json(v: &Value) -> Result<String> {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).context("json serialization failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

// ---------------------------------------------------------------------------
// Pointer accessors
// ---------------------------------------------------------------------------

pub(crate) fn cfg_bool(v: &Value, ptr: &str, default: bool) -> bool {
    v.pointer(ptr).and_then(|x| x.as_bool()).unwrap_or(default)
}

pub(crate) fn cfg_u64(v: &Value, ptr: &str, default: u64) -> u64 {
    v.pointer(ptr).and_then(|x| x.as_u64()).unwrap_or(default)
}

pub(crate) fn cfg_str(v: &Value, ptr: &str) -> Option<String> {
    v.pointer(ptr).and_then(|x| x.as_str()).map(str::to_string)
}

pub(crate) fn cfg_env(v: &Value, ptr: &str, default: ErpEnvironment) -> ErpEnvironment {
    v.pointer(ptr)
        .and_then(|x| x.as_str())
        .and_then(|s| ErpEnvironment::parse(s).ok())
        .unwrap_or(default)
}
