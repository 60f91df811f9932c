//! Process-local persistence for tests and ephemeral runs.

use std::{collections::HashMap, sync::Mutex};

use {anyhow::Result, async_trait::async_trait};

use crate::{entry::MemoryEntry, persistence::MemoryPersistence};

/// `HashMap`-backed store. Nothing survives the process.
#[derive(Default)]
pub struct InMemoryPersistence {
    scopes: Mutex<HashMap<String, Vec<MemoryEntry>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a scope, as if a previous process had saved it.
    pub fn with_scope(self, scope_key: impl Into<String>, entries: Vec<MemoryEntry>) -> Self {
        self.scopes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(scope_key.into(), entries);
        self
    }

    pub fn snapshot(&self, scope_key: &str) -> Option<Vec<MemoryEntry>> {
        self.scopes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(scope_key)
            .cloned()
    }
}

#[async_trait]
impl MemoryPersistence for InMemoryPersistence {
    async fn load(&self, scope_key: &str) -> Result<Vec<MemoryEntry>> {
        Ok(self.snapshot(scope_key).unwrap_or_default())
    }

    async fn save(&self, scope_key: &str, entries: &[MemoryEntry]) -> Result<()> {
        self.scopes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(scope_key.to_string(), entries.to_vec());
        Ok(())
    }
}
