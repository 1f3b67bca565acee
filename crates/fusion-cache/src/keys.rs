//! Deterministic cache key construction (spec §4.6, DESIGN.md open question
//! #1: the source's `fmt.Sprintf(key, value)` loop was order-dependent;
//! here keys are hashed from a canonical (sorted-keys) JSON encoding so the
//! key is stable regardless of argument insertion order).

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Re-encode `value` with object keys sorted recursively, so two
/// semantically-equal argument maps always hash to the same bytes.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect();
            serde_json::to_value(sorted).unwrap_or(Value::Null)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn sha256_hex_16(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)[..16].to_string()
}

/// `fusion:{service}:{endpointID}:{sha256-16-hex of canonical-JSON args}`.
pub fn response_cache_key(service: &str, endpoint_id: &str, args: &Value) -> String {
    let canonical = canonicalize(args);
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    format!("fusion:{service}:{endpoint_id}:{}", sha256_hex_16(&bytes))
}

/// `tenant:{tenantHash}:token:{service}`.
pub fn token_cache_key(tenant_hash: &str, service: &str) -> String {
    format!("tenant:{tenant_hash}:token:{service}")
}
