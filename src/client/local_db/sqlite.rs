//! SQLite backend
//!
//! The primary engine of the local store. One pool per store; file
//! databases run in WAL mode, in-memory databases are pinned to a single
//! connection so every query sees the same database.

use super::schema;
use super::{BackendKind, Collection, Result, StoreBackend};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;

/// SQLite-backed record store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) a database file and apply migrations
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("cache_size", "1000")
            .pragma("temp_store", "MEMORY");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        tracing::info!("Opened SQLite store at {}", path.display());
        Self::from_pool(pool).await
    }

    /// Open a private in-memory database
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Checks the current schema version and applies any pending migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let current: i32 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;

        if !schema::needs_migration(current) {
            return Ok(());
        }

        for (version, statements) in schema::pending_migrations(current) {
            let mut tx = self.pool.begin().await?;
            for statement in statements.iter() {
                sqlx::query(*statement).execute(&mut *tx).await?;
            }
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
                .bind(*version)
                .bind(Utc::now().to_rfc3339())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            tracing::debug!("Applied schema migration {}", version);
        }

        Ok(())
    }

    /// Get connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl StoreBackend for SqliteStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    async fn put(&self, collection: Collection, key: &str, value: &Value) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (key, data, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            schema::table_for(collection)
        );

        sqlx::query(&sql)
            .bind(key)
            .bind(serde_json::to_string(value)?)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        let sql = format!("SELECT data FROM {} WHERE key = ?", schema::table_for(collection));

        let data: Option<String> = sqlx::query_scalar(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<(String, Value)>> {
        let sql = format!("SELECT key, data FROM {} ORDER BY key", schema::table_for(collection));

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("key")?;
            let data: String = row.try_get("data")?;
            match serde_json::from_str(&data) {
                Ok(value) => entries.push((key, value)),
                Err(e) => tracing::warn!("Skipping corrupt row {}/{}: {}", collection, key, e),
            }
        }
        Ok(entries)
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE key = ?", schema::table_for(collection));
        sqlx::query(&sql).bind(key).execute(&self.pool).await?;
        Ok(())
    }

    async fn count(&self, collection: Collection) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", schema::table_for(collection));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn clear(&self, collection: Collection) -> Result<()> {
        let sql = format!("DELETE FROM {}", schema::table_for(collection));
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }
}
