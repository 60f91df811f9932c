//! Key-value persistence on SQLite using sqlx.

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions},
};

use crate::{entry::MemoryEntry, persistence::MemoryPersistence};

/// One row per scope key holding the JSON-encoded entry list.
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Connect with a dedicated pool and run migrations.
    pub async fn new(database_url: &str) -> crate::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        crate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Use an existing pool. [`crate::run_migrations`] must already have run.
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemoryPersistence for SqlitePersistence {
    async fn load(&self, scope_key: &str) -> Result<Vec<MemoryEntry>> {
        let row = sqlx::query("SELECT entries FROM memory_scopes WHERE scope_key = ?")
            .bind(scope_key)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(Vec::new());
        };
        let data: String = row.get("entries");
        serde_json::from_str(&data).with_context(|| format!("corrupt entries for {scope_key}"))
    }

    async fn save(&self, scope_key: &str, entries: &[MemoryEntry]) -> Result<()> {
        let data = serde_json::to_string(entries)?;
        sqlx::query(
            "INSERT INTO memory_scopes (scope_key, entries, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(scope_key) DO UPDATE SET entries = excluded.entries, updated_at = excluded.updated_at",
        )
        .bind(scope_key)
        .bind(&data)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
