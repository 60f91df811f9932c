//! Bounded per-scope memory logs with write-through persistence.

use std::{collections::VecDeque, sync::Arc};

use {
    chrono::Utc,
    dashmap::DashMap,
    switchyard_common::MessageIdentity,
    switchyard_config::MemoryConfig,
    tokio::sync::Mutex,
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use switchyard_metrics::{counter, gauge, labels, memory as mem_metrics};

use crate::{
    Error, Result,
    compose::{MemoryComposer, MemoryDecomposer},
    entry::{EntryDraft, MemoryEntry},
    persistence::{self, MemoryPersistence},
    registry::{ComposerRegistry, DecomposerRegistry, ScopeRegistry},
    scope::MemoryScope,
};

#[derive(Default)]
struct ScopeLog {
    /// The backend's copy of this key has been read (or deliberately replaced).
    hydrated: bool,
    /// The last load failed. `entries` then holds only what was stored since,
    /// so it must not be written over the durable copy.
    degraded: bool,
    entries: VecDeque<MemoryEntry>,
}

/// Owns every scope's entry log.
///
/// Each scope key has its own async mutex, so concurrent stores to one key
/// are serialized (including the backend write) while different keys never
/// contend. The in-memory log is authoritative; the backend is read once per
/// key on first access and written on every store. While a key's load keeps
/// failing the key is degraded: stores stay in memory, writes are withheld,
/// and the next successful load merges the durable history back in.
pub struct MemoryManager {
    max_entries: usize,
    default_scope: String,
    persistence: Arc<dyn MemoryPersistence>,
    logs: DashMap<String, Arc<Mutex<ScopeLog>>>,
    scopes: ScopeRegistry,
    composers: ComposerRegistry,
    decomposers: DecomposerRegistry,
}

impl MemoryManager {
    pub fn new(
        max_entries: usize,
        default_scope: impl Into<String>,
        persistence: Arc<dyn MemoryPersistence>,
    ) -> Result<Self> {
        if max_entries == 0 {
            return Err(Error::InvalidMaxEntries);
        }
        let default_scope = default_scope.into();
        let scopes = ScopeRegistry::with_builtins();
        if !scopes.contains(&default_scope) {
            warn!(scope = %default_scope, "default scope is not built in; register it before use");
        }
        Ok(Self {
            max_entries,
            default_scope,
            persistence,
            logs: DashMap::new(),
            scopes,
            composers: ComposerRegistry::with_builtins(),
            decomposers: DecomposerRegistry::with_builtins(),
        })
    }

    /// Build the manager and its backend from `[memory]`.
    pub async fn from_config(config: &MemoryConfig) -> Result<Self> {
        let backend = persistence::from_config(&config.persistence).await?;
        info!(
            persistence = %config.persistence.kind,
            max_entries = config.max_entries,
            default_scope = %config.default_scope,
            "memory initialized"
        );
        Self::new(config.max_entries, config.default_scope.clone(), backend)
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn register_scope(&mut self, name: impl Into<String>, scope: Arc<dyn MemoryScope>) {
        self.scopes.register(name, scope);
    }

    pub fn register_composer(&mut self, name: impl Into<String>, composer: Arc<dyn MemoryComposer>) {
        self.composers.register(name, composer);
    }

    pub fn register_decomposer(
        &mut self,
        name: impl Into<String>,
        decomposer: Arc<dyn MemoryDecomposer>,
    ) {
        self.decomposers.register(name, decomposer);
    }

    /// Look up a scope by name; `None` selects the configured default.
    pub fn scope(&self, name: Option<&str>) -> Result<Arc<dyn MemoryScope>> {
        let name = name.unwrap_or(&self.default_scope);
        self.scopes.get(name).ok_or_else(|| Error::unknown_scope(name))
    }

    pub fn composer(&self, name: &str) -> Result<Arc<dyn MemoryComposer>> {
        self.composers
            .get(name)
            .ok_or_else(|| Error::unknown_composer(name))
    }

    pub fn decomposer(&self, name: &str) -> Result<Arc<dyn MemoryDecomposer>> {
        self.decomposers
            .get(name)
            .ok_or_else(|| Error::unknown_decomposer(name))
    }

    fn log_for(&self, scope_key: &str) -> Arc<Mutex<ScopeLog>> {
        let log = Arc::clone(self.logs.entry(scope_key.to_string()).or_default().value());
        #[cfg(feature = "metrics")]
        gauge!(mem_metrics::SCOPES_LOADED).set(self.logs.len() as f64);
        log
    }

    /// The newest `max_entries` of `entries`.
    fn bounded(&self, entries: Vec<MemoryEntry>) -> VecDeque<MemoryEntry> {
        let skip = entries.len().saturating_sub(self.max_entries);
        entries.into_iter().skip(skip).collect()
    }

    /// Load the key from the backend until a load succeeds. Entries stored
    /// while degraded are kept after the durable ones.
    async fn hydrate(&self, scope_key: &str, log: &mut ScopeLog) {
        if log.hydrated {
            return;
        }
        match self.persistence.load(scope_key).await {
            Ok(mut durable) => {
                let recovered = log.degraded;
                durable.extend(log.entries.drain(..));
                log.entries = self.bounded(durable);
                log.hydrated = true;
                log.degraded = false;
                if recovered {
                    info!(scope_key, count = log.entries.len(), "memory backend recovered, scope merged");
                } else {
                    debug!(scope_key, count = log.entries.len(), "hydrated memory scope");
                }
            },
            Err(e) => {
                #[cfg(feature = "metrics")]
                counter!(mem_metrics::PERSISTENCE_ERRORS_TOTAL, labels::OP => "load").increment(1);
                if log.degraded {
                    debug!(scope_key, error = %e, "memory backend still unavailable");
                } else {
                    warn!(
                        scope_key,
                        error = %e,
                        "memory backend unavailable, starting scope empty (degraded)"
                    );
                }
                log.degraded = true;
            },
        }
    }

    /// Entries for the identity's scope key, oldest first.
    pub async fn query(
        &self,
        scope: &dyn MemoryScope,
        identity: &MessageIdentity,
    ) -> Vec<MemoryEntry> {
        let scope_key = scope.scope_key(identity);
        self.query_key(&scope_key).await
    }

    /// Entries stored under a raw scope key, oldest first.
    ///
    /// A key nothing has been stored under yet is read straight from the
    /// backend and not kept in memory.
    pub async fn query_key(&self, scope_key: &str) -> Vec<MemoryEntry> {
        #[cfg(feature = "metrics")]
        counter!(mem_metrics::QUERIES_TOTAL).increment(1);

        let cached = self.logs.get(scope_key).map(|log| Arc::clone(log.value()));
        if let Some(log) = cached {
            let mut log = log.lock().await;
            self.hydrate(scope_key, &mut log).await;
            return log.entries.iter().cloned().collect();
        }

        match self.persistence.load(scope_key).await {
            Ok(entries) => self.bounded(entries).into(),
            Err(e) => {
                #[cfg(feature = "metrics")]
                counter!(mem_metrics::PERSISTENCE_ERRORS_TOTAL, labels::OP => "load").increment(1);
                warn!(scope_key, error = %e, "memory backend unavailable, returning no entries (degraded)");
                Vec::new()
            },
        }
    }

    /// Append an entry to the identity's scope, evict past the bound and
    /// write the log through to the backend.
    pub async fn store(
        &self,
        scope: &dyn MemoryScope,
        identity: &MessageIdentity,
        draft: EntryDraft,
    ) -> MemoryEntry {
        let scope_key = scope.scope_key(identity);
        let log = self.log_for(&scope_key);
        let mut log = log.lock().await;
        self.hydrate(&scope_key, &mut log).await;

        // Keep timestamps non-decreasing within a key even if the clock steps back.
        let now = Utc::now();
        let timestamp = log
            .entries
            .back()
            .map_or(now, |last| last.timestamp.max(now));
        let entry = draft.seal(scope_key.clone(), timestamp);
        log.entries.push_back(entry.clone());

        let mut evicted = 0usize;
        while log.entries.len() > self.max_entries {
            log.entries.pop_front();
            evicted += 1;
        }

        #[cfg(feature = "metrics")]
        {
            counter!(mem_metrics::STORES_TOTAL).increment(1);
            counter!(mem_metrics::EVICTIONS_TOTAL).increment(evicted as u64);
        }
        debug!(scope_key = %scope_key, role = %entry.role, evicted, "stored memory entry");

        if log.degraded {
            warn!(
                scope_key = %scope_key,
                "memory scope degraded; entry kept in memory until the backend can be read"
            );
            return entry;
        }

        let snapshot: Vec<MemoryEntry> = log.entries.iter().cloned().collect();
        if let Err(e) = self.persistence.save(&scope_key, &snapshot).await {
            #[cfg(feature = "metrics")]
            counter!(mem_metrics::PERSISTENCE_ERRORS_TOTAL, labels::OP => "save").increment(1);
            error!(
                scope_key = %scope_key,
                error = %e,
                "failed to persist memory entry; kept in memory only"
            );
        }
        entry
    }

    /// Drop every entry of a scope key, in memory and in the backend.
    pub async fn clear(&self, scope_key: &str) -> Result<()> {
        let log = self.log_for(scope_key);
        let mut log = log.lock().await;
        log.entries.clear();
        log.hydrated = true;
        log.degraded = false;
        self.persistence
            .save(scope_key, &[])
            .await
            .map_err(|e| Error::persistence(format!("failed to clear {scope_key}"), e))
    }

    /// Scope keys currently held in memory, sorted.
    pub fn loaded_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.logs.iter().map(|e| e.key().clone()).collect();
        keys.sort_unstable();
        keys
    }

    /// Save every hydrated scope and flush the backend. Degraded scopes get
    /// one more load attempt; if it fails they are not written.
    pub async fn shutdown(&self) -> Result<()> {
        let logs: Vec<(String, Arc<Mutex<ScopeLog>>)> = self
            .logs
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        let mut failed = 0usize;
        for (scope_key, log) in logs {
            let mut log = log.lock().await;
            self.hydrate(&scope_key, &mut log).await;
            if !log.hydrated {
                if !log.entries.is_empty() {
                    failed += 1;
                    error!(
                        scope_key = %scope_key,
                        lost = log.entries.len(),
                        "memory backend unavailable on shutdown; scope not persisted"
                    );
                }
                continue;
            }
            let snapshot: Vec<MemoryEntry> = log.entries.iter().cloned().collect();
            if let Err(e) = self.persistence.save(&scope_key, &snapshot).await {
                failed += 1;
                error!(scope_key = %scope_key, error = %e, "failed to persist scope on shutdown");
            }
        }

        self.persistence
            .flush()
            .await
            .map_err(|e| Error::persistence("failed to flush memory backend", e))?;
        info!(failed, "memory shut down");
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            persistence_file::FilePersistence,
            persistence_memory::InMemoryPersistence,
            scope::{ConversationScope, GlobalScope, MemberScope},
        },
        async_trait::async_trait,
        std::sync::atomic::{AtomicUsize, Ordering},
        tempfile::TempDir,
    };

    fn manager(max: usize) -> (MemoryManager, Arc<InMemoryPersistence>) {
        let backend = Arc::new(InMemoryPersistence::new());
        let mgr = MemoryManager::new(max, "member", backend.clone()).unwrap();
        (mgr, backend)
    }

    fn alice() -> MessageIdentity {
        MessageIdentity::direct("alice")
    }

    /// Backend that fails every call.
    struct BrokenBackend {
        saves: AtomicUsize,
    }

    #[async_trait]
    impl MemoryPersistence for BrokenBackend {
        async fn load(&self, _scope_key: &str) -> anyhow::Result<Vec<MemoryEntry>> {
            anyhow::bail!("connection refused")
        }

        async fn save(&self, _scope_key: &str, _entries: &[MemoryEntry]) -> anyhow::Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("connection refused")
        }
    }

    #[test]
    fn zero_max_entries_rejected() {
        let backend = Arc::new(InMemoryPersistence::new());
        assert!(matches!(
            MemoryManager::new(0, "member", backend),
            Err(Error::InvalidMaxEntries)
        ));
    }

    #[tokio::test]
    async fn query_unknown_scope_is_empty() {
        let (mgr, _) = manager(3);
        assert!(mgr.query(&MemberScope, &alice()).await.is_empty());
    }

    #[tokio::test]
    async fn fifo_bound_keeps_most_recent() {
        let (mgr, backend) = manager(3);
        for i in 1..=5 {
            mgr.store(&MemberScope, &alice(), EntryDraft::user("alice", format!("E{i}")))
                .await;
        }

        let entries = mgr.query(&MemberScope, &alice()).await;
        let contents: Vec<&str> = entries.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["E3", "E4", "E5"]);
        assert!(entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        let persisted = backend.snapshot("member:alice").unwrap();
        assert_eq!(persisted, entries);
    }

    #[tokio::test]
    async fn stored_entry_carries_scope_key() {
        let (mgr, _) = manager(10);
        let identity = MessageIdentity::group("bob", "g1");
        let entry = mgr
            .store(&ConversationScope, &identity, EntryDraft::user("bob", "hi"))
            .await;
        assert_eq!(entry.scope_key, "group:g1");

        let carol = MessageIdentity::group("carol", "g1");
        assert_eq!(mgr.query(&ConversationScope, &carol).await, vec![entry]);
    }

    #[tokio::test]
    async fn scopes_partition_entries() {
        let (mgr, _) = manager(10);
        mgr.store(&MemberScope, &alice(), EntryDraft::user("alice", "a"))
            .await;
        mgr.store(
            &MemberScope,
            &MessageIdentity::direct("bob"),
            EntryDraft::user("bob", "b"),
        )
        .await;

        assert_eq!(mgr.query(&MemberScope, &alice()).await.len(), 1);
        assert!(mgr.query(&GlobalScope, &alice()).await.is_empty());
        assert_eq!(mgr.loaded_keys(), vec!["member:alice", "member:bob"]);
    }

    #[tokio::test]
    async fn hydrates_from_backend_and_applies_bound() {
        let seeded: Vec<MemoryEntry> = (0..5)
            .map(|i| EntryDraft::user("alice", format!("old {i}")).seal("member:alice".into(), Utc::now()))
            .collect();
        let backend = Arc::new(InMemoryPersistence::new().with_scope("member:alice", seeded));
        let mgr = MemoryManager::new(2, "member", backend).unwrap();

        let entries = mgr.query(&MemberScope, &alice()).await;
        let contents: Vec<&str> = entries.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["old 3", "old 4"]);

        mgr.store(&MemberScope, &alice(), EntryDraft::user("alice", "new"))
            .await;
        let contents: Vec<String> = mgr
            .query(&MemberScope, &alice())
            .await
            .into_iter()
            .map(|e| e.content)
            .collect();
        assert_eq!(contents, vec!["old 4", "new"]);
    }

    #[tokio::test]
    async fn broken_backend_degrades_without_losing_entries() {
        let backend = Arc::new(BrokenBackend {
            saves: AtomicUsize::new(0),
        });
        let mgr = MemoryManager::new(10, "member", backend.clone()).unwrap();

        assert!(mgr.query(&MemberScope, &alice()).await.is_empty());
        mgr.store(&MemberScope, &alice(), EntryDraft::user("alice", "kept"))
            .await;

        let entries = mgr.query(&MemberScope, &alice()).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "kept");
        // Nothing is written over a durable copy that could not be read.
        assert_eq!(backend.saves.load(Ordering::SeqCst), 0);
    }

    /// In-memory backend whose first `failing_loads` loads fail.
    struct FlakyBackend {
        inner: InMemoryPersistence,
        failing_loads: AtomicUsize,
    }

    impl FlakyBackend {
        fn new(seeded: Vec<MemoryEntry>, failing_loads: usize) -> Self {
            Self {
                inner: InMemoryPersistence::new().with_scope("member:alice", seeded),
                failing_loads: AtomicUsize::new(failing_loads),
            }
        }

        fn contents(&self) -> Vec<String> {
            self.inner
                .snapshot("member:alice")
                .unwrap_or_default()
                .into_iter()
                .map(|e| e.content)
                .collect()
        }
    }

    #[async_trait]
    impl MemoryPersistence for FlakyBackend {
        async fn load(&self, scope_key: &str) -> anyhow::Result<Vec<MemoryEntry>> {
            let fail = self
                .failing_loads
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if fail {
                anyhow::bail!("timed out");
            }
            self.inner.load(scope_key).await
        }

        async fn save(&self, scope_key: &str, entries: &[MemoryEntry]) -> anyhow::Result<()> {
            self.inner.save(scope_key, entries).await
        }
    }

    fn seeded(n: usize) -> Vec<MemoryEntry> {
        (1..=n)
            .map(|i| EntryDraft::user("alice", format!("old {i}")).seal("member:alice".into(), Utc::now()))
            .collect()
    }

    fn contents(entries: &[MemoryEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.content.as_str()).collect()
    }

    #[tokio::test]
    async fn failed_load_never_overwrites_durable_history() {
        let backend = Arc::new(FlakyBackend::new(seeded(3), usize::MAX));
        let mgr = MemoryManager::new(10, "member", backend.clone()).unwrap();

        assert!(mgr.query(&MemberScope, &alice()).await.is_empty());
        mgr.store(&MemberScope, &alice(), EntryDraft::user("alice", "new"))
            .await;
        assert_eq!(contents(&mgr.query(&MemberScope, &alice()).await), vec!["new"]);
        mgr.shutdown().await.unwrap();

        assert_eq!(backend.contents(), vec!["old 1", "old 2", "old 3"]);
    }

    #[tokio::test]
    async fn degraded_scope_merges_history_once_backend_recovers() {
        // The query and the store's own hydration both fail; the next read works.
        let backend = Arc::new(FlakyBackend::new(seeded(3), 2));
        let mgr = MemoryManager::new(10, "member", backend.clone()).unwrap();

        assert!(mgr.query(&MemberScope, &alice()).await.is_empty());
        mgr.store(&MemberScope, &alice(), EntryDraft::user("alice", "new"))
            .await;
        assert_eq!(backend.contents(), vec!["old 1", "old 2", "old 3"]);

        let entries = mgr.query(&MemberScope, &alice()).await;
        assert_eq!(contents(&entries), vec!["old 1", "old 2", "old 3", "new"]);

        mgr.store(&MemberScope, &alice(), EntryDraft::user("alice", "later"))
            .await;
        assert_eq!(backend.contents(), vec![
            "old 1", "old 2", "old 3", "new", "later"
        ]);
    }

    #[tokio::test]
    async fn store_after_a_single_failed_load_keeps_history() {
        let backend = Arc::new(FlakyBackend::new(seeded(3), 1));
        let mgr = MemoryManager::new(10, "member", backend.clone()).unwrap();

        assert!(mgr.query(&MemberScope, &alice()).await.is_empty());
        mgr.store(&MemberScope, &alice(), EntryDraft::user("alice", "new"))
            .await;
        assert_eq!(backend.contents(), vec!["old 1", "old 2", "old 3", "new"]);
    }

    #[tokio::test]
    async fn unreachable_key_value_store_starts_degraded() {
        let tmp = TempDir::new().unwrap();
        // A regular file where the database directory should be.
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let mut config = MemoryConfig::default();
        config.persistence.kind = switchyard_config::PersistenceKind::KeyValueStore;
        config.persistence.kv.database_url =
            format!("sqlite://{}/memory.db?mode=rwc", blocker.display());

        let mgr = MemoryManager::from_config(&config).await.unwrap();
        assert!(mgr.query(&MemberScope, &alice()).await.is_empty());
        mgr.store(&MemberScope, &alice(), EntryDraft::user("alice", "kept"))
            .await;
        assert_eq!(contents(&mgr.query(&MemberScope, &alice()).await), vec!["kept"]);
        // The unsaved scope is reported, not an error.
        mgr.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn looking_up_an_unknown_key_does_not_load_it() {
        let (mgr, _) = manager(5);
        assert!(mgr.query_key("member:nobody").await.is_empty());
        assert!(mgr.query_key("typo").await.is_empty());
        assert!(mgr.loaded_keys().is_empty());

        mgr.store(&MemberScope, &alice(), EntryDraft::user("alice", "x"))
            .await;
        assert_eq!(mgr.query_key("member:alice").await.len(), 1);
        assert_eq!(mgr.loaded_keys(), vec!["member:alice"]);
    }

    #[tokio::test]
    async fn concurrent_stores_respect_bound_and_order() {
        let (mgr, _) = manager(10);
        let mgr = Arc::new(mgr);

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let mgr = Arc::clone(&mgr);
                tokio::spawn(async move {
                    mgr.store(&MemberScope, &alice(), EntryDraft::user("alice", i.to_string()))
                        .await
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }

        let entries = mgr.query(&MemberScope, &alice()).await;
        assert_eq!(entries.len(), 10);
        assert!(entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        let mut contents: Vec<&str> = entries.iter().map(|e| e.content.as_str()).collect();
        contents.sort_unstable();
        contents.dedup();
        assert_eq!(contents.len(), 10);
    }

    #[tokio::test]
    async fn different_keys_do_not_share_bound() {
        let (mgr, _) = manager(2);
        let mgr = Arc::new(mgr);
        let handles: Vec<_> = (0..20)
            .map(|i| {
                let mgr = Arc::clone(&mgr);
                tokio::spawn(async move {
                    let who = format!("user{}", i % 4);
                    mgr.store(
                        &MemberScope,
                        &MessageIdentity::direct(&who),
                        EntryDraft::user(&who, "x"),
                    )
                    .await
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }
        for i in 0..4 {
            let identity = MessageIdentity::direct(format!("user{i}"));
            assert_eq!(mgr.query(&MemberScope, &identity).await.len(), 2);
        }
    }

    #[tokio::test]
    async fn clear_empties_scope_and_backend() {
        let (mgr, backend) = manager(5);
        mgr.store(&MemberScope, &alice(), EntryDraft::user("alice", "x"))
            .await;
        mgr.clear("member:alice").await.unwrap();
        assert!(mgr.query(&MemberScope, &alice()).await.is_empty());
        assert_eq!(backend.snapshot("member:alice"), Some(Vec::new()));
    }

    #[tokio::test]
    async fn file_backend_survives_restart() {
        let tmp = TempDir::new().unwrap();
        {
            let mgr =
                MemoryManager::new(5, "member", Arc::new(FilePersistence::new(tmp.path()))).unwrap();
            mgr.store(&MemberScope, &alice(), EntryDraft::user("alice", "remember me"))
                .await;
            mgr.shutdown().await.unwrap();
        }

        let mgr = MemoryManager::new(5, "member", Arc::new(FilePersistence::new(tmp.path()))).unwrap();
        let entries = mgr.query(&MemberScope, &alice()).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "remember me");
    }

    #[tokio::test]
    async fn registry_lookups() {
        let (mgr, _) = manager(5);
        assert_eq!(mgr.scope(None).unwrap().name(), "member");
        assert_eq!(mgr.scope(Some("global")).unwrap().name(), "global");
        assert!(matches!(
            mgr.scope(Some("team")),
            Err(Error::UnknownScope { .. })
        ));
        assert!(mgr.composer("default").is_ok());
        assert!(mgr.decomposer("timestamped").is_ok());
        assert!(matches!(
            mgr.decomposer("nope"),
            Err(Error::UnknownDecomposer { .. })
        ));
    }
}
