//! Durable backends behind the in-memory scope logs.

use std::sync::Arc;

use {
    anyhow::{Result, bail},
    async_trait::async_trait,
    tracing::warn,
};

use switchyard_config::{PersistenceKind, schema::PersistenceConfig};

use crate::{
    entry::MemoryEntry, persistence_file::FilePersistence,
    persistence_sqlite::SqlitePersistence,
};

/// Key → entry-list storage. The manager always saves a scope's complete,
/// already-bounded list, so backends replace rather than append.
#[async_trait]
pub trait MemoryPersistence: Send + Sync {
    /// Entries stored under `scope_key`, oldest first. Unknown keys yield an
    /// empty list.
    async fn load(&self, scope_key: &str) -> Result<Vec<MemoryEntry>>;
    async fn save(&self, scope_key: &str, entries: &[MemoryEntry]) -> Result<()>;
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Build the backend selected by `[memory.persistence]`.
///
/// A key-value store that cannot be opened does not stop startup: the
/// manager runs on an [`UnavailablePersistence`] and every scope starts empty
/// in degraded mode.
pub async fn from_config(config: &PersistenceConfig) -> crate::Result<Arc<dyn MemoryPersistence>> {
    Ok(match config.kind {
        PersistenceKind::File => Arc::new(FilePersistence::new(&config.file.storage_dir)),
        PersistenceKind::KeyValueStore => {
            match SqlitePersistence::new(&config.kv.database_url).await {
                Ok(backend) => Arc::new(backend),
                Err(e) => {
                    warn!(
                        error = %e,
                        "key-value memory store unavailable, running memory in degraded mode"
                    );
                    Arc::new(UnavailablePersistence::new(e.to_string()))
                },
            }
        },
    })
}

/// Stand-in for a backend that could not be opened. Every call fails with
/// the original reason.
pub struct UnavailablePersistence {
    reason: String,
}

impl UnavailablePersistence {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl MemoryPersistence for UnavailablePersistence {
    async fn load(&self, _scope_key: &str) -> Result<Vec<MemoryEntry>> {
        bail!("memory backend unavailable: {}", self.reason)
    }

    async fn save(&self, _scope_key: &str, _entries: &[MemoryEntry]) -> Result<()> {
        bail!("memory backend unavailable: {}", self.reason)
    }
}
