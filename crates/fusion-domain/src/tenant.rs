use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved sentinel for explicit no-auth mode. Must never be produced by
/// normal token validation (spec §3 invariant, §8 invariant 4).
pub const NOAUTH: &str = "NOAUTH";

/// Per-call authenticated-caller context, threaded through the handler
/// pipeline under `TenantContextKey` (spec §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantContext {
    /// 64-hex token hash, or the `NOAUTH` sentinel.
    pub tenant_hash: String,
    pub service_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub request_id: String,
    pub created_at: DateTime<Utc>,
}

impl TenantContext {
    pub fn new_no_auth(service_name: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            tenant_hash: NOAUTH.to_string(),
            service_name: service_name.into(),
            user_id: None,
            description: None,
            metadata: HashMap::new(),
            request_id: request_id.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_no_auth(&self) -> bool {
        self.tenant_hash == NOAUTH
    }

    /// Composite key used by the per-(tenant, service) lock map and the
    /// token cache.
    pub fn lock_key(&self) -> String {
        format!("{}:{}", self.tenant_hash, self.service_name)
    }
}

/// Truncates a hash for display/log purposes, except the `NOAUTH` sentinel
/// which is short and must never be truncated further (spec §8 invariant 5).
pub fn short_hash(hash: &str) -> String {
    if hash == NOAUTH {
        return NOAUTH.to_string();
    }
    hash.chars().take(12).collect()
}
