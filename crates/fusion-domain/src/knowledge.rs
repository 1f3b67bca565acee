use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user persistent key-value memory entry. Unique on
/// `(user_id, domain, key)` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub user_id: String,
    pub domain: String,
    pub key: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    pub fn new(user_id: impl Into<String>, domain: impl Into<String>, key: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            domain: domain.into(),
            key: key.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
