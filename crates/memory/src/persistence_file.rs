//! JSON file per scope key, written atomically.

use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result, bail},
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    sha2::{Digest, Sha256},
    tokio::fs,
};

use crate::{entry::MemoryEntry, persistence::MemoryPersistence};

#[derive(Serialize, Deserialize)]
struct ScopeFile {
    scope_key: String,
    entries: Vec<MemoryEntry>,
}

/// Stores each scope as `<storage_dir>/<slug>-<hash>.json`.
pub struct FilePersistence {
    storage_dir: PathBuf,
}

impl FilePersistence {
    pub fn new(storage_dir: impl AsRef<Path>) -> Self {
        Self {
            storage_dir: storage_dir.as_ref().to_path_buf(),
        }
    }

    /// Scope keys contain `:` and arbitrary ids, so the file name is a
    /// readable slug plus a hash prefix that keeps distinct keys apart.
    pub fn path_for(&self, scope_key: &str) -> PathBuf {
        let slug: String = scope_key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .take(64)
            .collect();
        let digest = Sha256::digest(scope_key.as_bytes());
        let hash: String = digest[..6].iter().map(|b| format!("{b:02x}")).collect();
        self.storage_dir.join(format!("{slug}-{hash}.json"))
    }
}

#[async_trait]
impl MemoryPersistence for FilePersistence {
    async fn load(&self, scope_key: &str) -> Result<Vec<MemoryEntry>> {
        let path = self.path_for(scope_key);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file: ScopeFile = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        if file.scope_key != scope_key {
            bail!(
                "{} holds scope {:?}, expected {:?}",
                path.display(),
                file.scope_key,
                scope_key
            );
        }
        Ok(file.entries)
    }

    /// Atomic write: write to temp, rename over target.
    async fn save(&self, scope_key: &str, entries: &[MemoryEntry]) -> Result<()> {
        fs::create_dir_all(&self.storage_dir).await?;
        let path = self.path_for(scope_key);
        let json = serde_json::to_string_pretty(&ScopeFile {
            scope_key: scope_key.to_string(),
            entries: entries.to_vec(),
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes()).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::entry::EntryDraft, chrono::Utc, tempfile::TempDir};

    fn entries(key: &str, n: usize) -> Vec<MemoryEntry> {
        (0..n)
            .map(|i| EntryDraft::user("alice", format!("msg {i}")).seal(key.into(), Utc::now()))
            .collect()
    }

    #[tokio::test]
    async fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let store = FilePersistence::new(tmp.path());

        store.save("member:alice", &entries("member:alice", 3)).await.unwrap();
        let loaded = store.load("member:alice").await.unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[2].content, "msg 2");
    }

    #[tokio::test]
    async fn load_missing_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = FilePersistence::new(tmp.path().join("not-created-yet"));
        assert!(store.load("member:nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_replaces_previous_list() {
        let tmp = TempDir::new().unwrap();
        let store = FilePersistence::new(tmp.path());

        store.save("global", &entries("global", 5)).await.unwrap();
        store.save("global", &entries("global", 2)).await.unwrap();
        assert_eq!(store.load("global").await.unwrap().len(), 2);
        assert!(!store.path_for("global").with_extension("json.tmp").exists());
    }

    #[test]
    fn similar_keys_get_distinct_files() {
        let store = FilePersistence::new("/tmp/x");
        let a = store.path_for("group:a/b");
        let b = store.path_for("group:a_b");
        assert_ne!(a, b);
        assert!(a.file_name().unwrap().to_str().unwrap().starts_with("group_a_b-"));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = FilePersistence::new(tmp.path());
        std::fs::write(store.path_for("member:x"), "{not json").unwrap();
        assert!(store.load("member:x").await.is_err());
    }
}
