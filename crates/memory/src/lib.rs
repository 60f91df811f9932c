//! Conversational memory: bounded, ordered entry logs partitioned by scope.
//!
//! A [`scope::MemoryScope`] turns a message identity into a scope key, a
//! [`compose::MemoryComposer`] turns messages and replies into entries, and a
//! [`compose::MemoryDecomposer`] renders entries back into context text. The
//! [`manager::MemoryManager`] owns the per-key logs and writes them through to
//! a [`persistence::MemoryPersistence`] backend.

pub mod compose;
pub mod entry;
pub mod error;
pub mod manager;
pub mod persistence;
pub mod persistence_file;
pub mod persistence_memory;
pub mod persistence_sqlite;
pub mod registry;
pub mod scope;

pub use {
    compose::{Composable, MemoryComposer, MemoryDecomposer},
    entry::{EntryDraft, MemoryEntry, Role},
    error::{Error, Result},
    manager::MemoryManager,
    persistence::MemoryPersistence,
    scope::{MemoryScope, ScopeKind},
};

/// Run database migrations for the key-value persistence backend.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
