//! Name → implementation registries for scopes, composers and decomposers.

use std::{collections::HashMap, sync::Arc};

use crate::{
    compose::{
        DefaultComposer, DefaultDecomposer, MemoryComposer, MemoryDecomposer,
        TimestampedDecomposer, TranscriptDecomposer,
    },
    scope::{MemoryScope, ScopeKind},
};

/// Name used for the default composer and decomposer.
pub const DEFAULT_NAME: &str = "default";

/// Implementations stored as `Arc<dyn …>` so lookups hand out cheap clones
/// that outlive the registry borrow.
pub struct NamedRegistry<T: ?Sized> {
    items: HashMap<String, Arc<T>>,
}

impl<T: ?Sized> Default for NamedRegistry<T> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
        }
    }
}

impl<T: ?Sized> NamedRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `item` under `name`, returning the implementation it replaced.
    pub fn register(&mut self, name: impl Into<String>, item: Arc<T>) -> Option<Arc<T>> {
        self.items.insert(name.into(), item)
    }

    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.items.get(name).map(Arc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.items.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

pub type ScopeRegistry = NamedRegistry<dyn MemoryScope>;
pub type ComposerRegistry = NamedRegistry<dyn MemoryComposer>;
pub type DecomposerRegistry = NamedRegistry<dyn MemoryDecomposer>;

impl NamedRegistry<dyn MemoryScope> {
    /// `member`, `conversation` and `global`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for kind in ScopeKind::ALL {
            registry.register(kind.as_str(), kind.scope());
        }
        registry
    }
}

impl NamedRegistry<dyn MemoryComposer> {
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULT_NAME, Arc::new(DefaultComposer));
        registry
    }
}

impl NamedRegistry<dyn MemoryDecomposer> {
    /// `default`, `timestamped` and `transcript`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULT_NAME, Arc::new(DefaultDecomposer));
        registry.register("timestamped", Arc::new(TimestampedDecomposer));
        registry.register("transcript", Arc::new(TranscriptDecomposer));
        registry
    }
}
