use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use fusion_domain::error::{Error, Result};

use crate::Cache;

const MAX_KEY_LEN: usize = 200;
const HASH_SUFFIX_LEN: usize = 8;

#[derive(Serialize, Deserialize)]
struct FileEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// One JSON file per sanitized key, in a discovered writable directory.
/// Files are written with `0600` permissions on Unix; a background task
/// sweeps expired entries hourly (spec §4.6).
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Tries a system-wide directory first, falls back to the user's home,
    /// then the OS temp directory — the first one it can actually create
    /// and write into wins.
    pub fn discover() -> Result<Self> {
        let candidates: Vec<PathBuf> = vec![
            PathBuf::from("/var/lib/fusion-gateway/cache"),
            dirs::home_dir().map(|h| h.join(".fusion-gateway").join("cache")).unwrap_or_default(),
            std::env::temp_dir().join("fusion-gateway-cache"),
        ];
        for candidate in candidates {
            if candidate.as_os_str().is_empty() {
                continue;
            }
            if std::fs::create_dir_all(&candidate).is_ok() {
                let probe = candidate.join(".fusion-write-probe");
                if std::fs::write(&probe, b"ok").is_ok() {
                    let _ = std::fs::remove_file(&probe);
                    return Ok(Self { dir: candidate });
                }
            }
        }
        Err(Error::Cache {
            operation: "discover".into(),
            key: String::new(),
            message: "no writable directory found for file cache (tried system, home, temp)".into(),
        })
    }

    pub fn at(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn spawn_sweeper(self: &std::sync::Arc<Self>) {
        let dir = self.dir.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60 * 60));
            loop {
                interval.tick().await;
                sweep_dir(&dir);
            }
        });
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

/// Replaces filesystem-unsafe characters with `_`. Keys longer than
/// `MAX_KEY_LEN` are truncated with an 8-hex-char suffix of the full key's
/// SHA-256 hash appended, so truncation can't collide two distinct long
/// keys onto the same file (spec §9, flagged as a bug to not reproduce).
pub fn sanitize_key(key: &str) -> String {
    let safe: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':' { c } else { '_' })
        .collect();
    if safe.len() <= MAX_KEY_LEN {
        return safe;
    }
    let digest = Sha256::digest(key.as_bytes());
    let suffix = hex::encode(digest)[..HASH_SUFFIX_LEN].to_string();
    let keep = MAX_KEY_LEN - HASH_SUFFIX_LEN - 1;
    format!("{}_{}", &safe[..keep], suffix)
}

fn sweep_dir(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    let now = Utc::now();
    let mut evicted = 0u32;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Ok(raw) = std::fs::read_to_string(&path) {
            if let Ok(parsed) = serde_json::from_str::<FileEntry>(&raw) {
                if parsed.expires_at <= now {
                    let _ = std::fs::remove_file(&path);
                    evicted += 1;
                }
            }
        }
    }
    if evicted > 0 {
        tracing::debug!(evicted, "file cache sweep evicted expired entries");
    }
}

fn write_0600(path: &Path, bytes: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(bytes)?;
    }
    #[cfg(not(unix))]
    {
        std::fs::write(path, bytes)?;
    }
    Ok(())
}

#[async_trait]
impl Cache for FileCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)?;
        let entry: FileEntry = serde_json::from_str(&raw)?;
        if entry.expires_at <= Utc::now() {
            let _ = std::fs::remove_file(&path);
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let entry = FileEntry {
            value: value.to_string(),
            expires_at: Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(0)),
        };
        let json = serde_json::to_vec(&entry)?;
        write_0600(&self.path_for(key), &json)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        if let Ok(entries) = std::fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    let _ = std::fs::remove_file(path);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::at(dir.path()).unwrap();
        cache.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn expired_entry_treated_as_miss() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::at(dir.path()).unwrap();
        cache.set("k", "v", Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_is_written_with_0600_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let cache = FileCache::at(dir.path()).unwrap();
        cache.set("k", "v", Duration::from_secs(60)).await.unwrap();
        let meta = std::fs::metadata(cache.path_for("k")).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_key("fusion/graph get?x=1"), "fusion_graph_get_x_1");
    }

    #[test]
    fn sanitize_preserves_allowed_characters() {
        assert_eq!(sanitize_key("fusion:graph:get-1_2"), "fusion:graph:get-1_2");
    }

    #[test]
    fn long_key_truncated_with_hash_suffix() {
        let long_key = "x".repeat(300);
        let sanitized = sanitize_key(&long_key);
        assert_eq!(sanitized.len(), MAX_KEY_LEN);
        assert_ne!(sanitized, "x".repeat(MAX_KEY_LEN), "must not silently truncate without a distinguishing suffix");
    }

    #[test]
    fn distinct_long_keys_with_same_prefix_do_not_collide() {
        let a = format!("{}a", "x".repeat(300));
        let b = format!("{}b", "x".repeat(300));
        assert_ne!(sanitize_key(&a), sanitize_key(&b));
    }
}
