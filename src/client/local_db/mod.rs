//! # Local Store Module
//!
//! Durable, key-indexed storage for everything the device needs while
//! offline: stop and itinerary snapshots, the sync queue, and cached map
//! tiles.
//!
//! ## Architecture
//!
//! Two backends sit behind the [`StoreBackend`] trait:
//! - **SQLite** (`sqlite.rs`): the primary store, one table per collection
//! - **Key-value** (`kv.rs`): a single JSON document on disk, or pure memory
//!
//! [`LocalStore`] fronts both. Writes go to the primary and fall back to the
//! key-value store when the primary fails; reads merge both; deletes hit
//! both. Callers never see which backend served them, so the queue and the
//! reconciliation engine work the same against either.
//!
//! ## Readiness
//!
//! Opening SQLite is asynchronous. Until [`LocalStore::init`] has completed
//! every operation fails with [`StoreError::NotReady`] instead of silently
//! dropping data; [`LocalStore::is_ready`] lets callers check first.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use route_sync::client::local_db::{LocalStore, StoreConfig};
//!
//! # async fn example() -> Result<(), route_sync::client::local_db::StoreError> {
//! let store = LocalStore::new(StoreConfig::default());
//! store.init().await;
//!
//! let stops = store.stops_for_itinerary(Some("itinerary-1")).await?;
//! # Ok(())
//! # }
//! ```

pub mod itinerary;
pub mod kv;
pub mod schema;
pub mod sqlite;
pub mod stops;
pub mod tiles;

pub use kv::KeyValueStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Errors raised by the local store
#[derive(Debug, Error)]
pub enum StoreError {
    /// `init()` has not completed yet
    #[error("local store is not ready")]
    NotReady,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for local store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Record families kept in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Stops,
    Itinerary,
    SyncQueue,
    OfflineTiles,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Stops,
        Collection::Itinerary,
        Collection::SyncQueue,
        Collection::OfflineTiles,
    ];

    /// Table (SQLite) or section (key-value) name
    pub fn name(self) -> &'static str {
        match self {
            Collection::Stops => "stops",
            Collection::Itinerary => "itinerary",
            Collection::SyncQueue => "sync_queue",
            Collection::OfflineTiles => "offline_tiles",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which engine is serving writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sqlite,
    KeyValue,
}

/// A storage engine holding JSON records by collection and key
#[async_trait]
pub trait StoreBackend: Send + Sync + fmt::Debug {
    fn kind(&self) -> BackendKind;

    /// Insert or overwrite
    async fn put(&self, collection: Collection, key: &str, value: &Value) -> Result<()>;

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>>;

    /// All `(key, value)` pairs of a collection, in key order
    async fn get_all(&self, collection: Collection) -> Result<Vec<(String, Value)>>;

    /// Deleting an absent key succeeds
    async fn delete(&self, collection: Collection, key: &str) -> Result<()>;

    async fn count(&self, collection: Collection) -> Result<usize>;

    async fn clear(&self, collection: Collection) -> Result<()>;
}

/// Where the backends keep their data
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// SQLite file; `None` opens an in-memory database
    pub database_path: Option<PathBuf>,
    /// Key-value JSON file; `None` keeps the fallback in memory
    pub fallback_path: Option<PathBuf>,
}

#[derive(Debug)]
struct Backends {
    primary: Option<Arc<dyn StoreBackend>>,
    fallback: Arc<dyn StoreBackend>,
}

/// The device's local store, fronting a primary and a fallback backend
#[derive(Debug)]
pub struct LocalStore {
    config: StoreConfig,
    backends: OnceCell<Backends>,
}

impl LocalStore {
    /// Create an unopened store; call [`LocalStore::init`] before use
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            backends: OnceCell::new(),
        }
    }

    /// Create a ready store from explicit backends
    pub fn with_backends(
        primary: Option<Arc<dyn StoreBackend>>,
        fallback: Arc<dyn StoreBackend>,
    ) -> Self {
        Self {
            config: StoreConfig::default(),
            backends: OnceCell::new_with(Some(Backends { primary, fallback })),
        }
    }

    /// A ready store with no primary and an in-memory fallback
    pub fn memory_only() -> Self {
        Self::with_backends(None, Arc::new(KeyValueStore::in_memory()))
    }

    /// A ready store backed by in-memory SQLite with an in-memory fallback
    pub async fn open_in_memory() -> Result<Self> {
        let primary = SqliteStore::open_in_memory().await?;
        Ok(Self::with_backends(
            Some(Arc::new(primary)),
            Arc::new(KeyValueStore::in_memory()),
        ))
    }

    /// Open both backends. Never fails: an unusable SQLite file leaves the
    /// store running on the key-value fallback alone.
    pub async fn init(&self) -> BackendKind {
        let backends = self
            .backends
            .get_or_init(|| async {
                let fallback: Arc<dyn StoreBackend> = match &self.config.fallback_path {
                    Some(path) => Arc::new(KeyValueStore::open(path.clone()).await),
                    None => Arc::new(KeyValueStore::in_memory()),
                };

                let opened = match &self.config.database_path {
                    Some(path) => SqliteStore::open(path).await,
                    None => SqliteStore::open_in_memory().await,
                };
                let primary: Option<Arc<dyn StoreBackend>> = match opened {
                    Ok(store) => Some(Arc::new(store)),
                    Err(e) => {
                        tracing::warn!(
                            "SQLite store unavailable, continuing on key-value fallback: {}",
                            e
                        );
                        None
                    }
                };

                Backends { primary, fallback }
            })
            .await;

        let kind = Self::active_kind(backends);
        tracing::info!(backend = ?kind, "Local store ready");
        kind
    }

    pub fn is_ready(&self) -> bool {
        self.backends.initialized()
    }

    /// Backend currently receiving writes
    pub fn backend_kind(&self) -> Result<BackendKind> {
        Ok(Self::active_kind(self.backends()?))
    }

    fn active_kind(backends: &Backends) -> BackendKind {
        backends
            .primary
            .as_ref()
            .map(|primary| primary.kind())
            .unwrap_or_else(|| backends.fallback.kind())
    }

    fn backends(&self) -> Result<&Backends> {
        self.backends.get().ok_or(StoreError::NotReady)
    }

    /// Insert or overwrite a record
    pub async fn put(&self, collection: Collection, key: &str, value: &Value) -> Result<()> {
        let backends = self.backends()?;

        if let Some(primary) = &backends.primary {
            match primary.put(collection, key, value).await {
                Ok(()) => {
                    // An older copy may have landed in the fallback while the primary was failing
                    if let Ok(Some(_)) = backends.fallback.get(collection, key).await {
                        if let Err(e) = backends.fallback.delete(collection, key).await {
                            tracing::warn!("Failed to drop stale fallback copy of {}/{}: {}", collection, key, e);
                        }
                    }
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Primary write to {}/{} failed, using fallback: {}", collection, key, e);
                }
            }
        }

        backends.fallback.put(collection, key, value).await
    }

    /// Serialize and store a typed record
    pub async fn put_record<T: Serialize>(
        &self,
        collection: Collection,
        key: &str,
        record: &T,
    ) -> Result<()> {
        let value = serde_json::to_value(record)?;
        self.put(collection, key, &value).await
    }

    /// Read a record; backend failures read as absent
    pub async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        let backends = self.backends()?;

        if let Some(primary) = &backends.primary {
            match primary.get(collection, key).await {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => {}
                Err(e) => tracing::warn!("Primary read of {}/{} failed: {}", collection, key, e),
            }
        }

        match backends.fallback.get(collection, key).await {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!("Fallback read of {}/{} failed: {}", collection, key, e);
                Ok(None)
            }
        }
    }

    /// Read and decode a typed record
    pub async fn get_record<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<T>> {
        Ok(self
            .get(collection, key)
            .await?
            .and_then(|value| decode(collection, value)))
    }

    /// All records of a collection across both backends, de-duplicated by
    /// key with the primary's copy winning
    pub async fn get_all(&self, collection: Collection) -> Result<Vec<Value>> {
        Ok(self.merged(collection).await?.into_values().collect())
    }

    /// All decodable records of a collection
    pub async fn get_all_records<T: DeserializeOwned>(
        &self,
        collection: Collection,
    ) -> Result<Vec<T>> {
        Ok(self
            .get_all(collection)
            .await?
            .into_iter()
            .filter_map(|value| decode(collection, value))
            .collect())
    }

    async fn merged(&self, collection: Collection) -> Result<BTreeMap<String, Value>> {
        let backends = self.backends()?;
        let mut merged = BTreeMap::new();

        match backends.fallback.get_all(collection).await {
            Ok(entries) => merged.extend(entries),
            Err(e) => tracing::warn!("Fallback scan of {} failed: {}", collection, e),
        }

        if let Some(primary) = &backends.primary {
            match primary.get_all(collection).await {
                Ok(entries) => merged.extend(entries),
                Err(e) => tracing::warn!("Primary scan of {} failed: {}", collection, e),
            }
        }

        Ok(merged)
    }

    /// Remove a record from both backends; absent keys are a no-op
    pub async fn delete(&self, collection: Collection, key: &str) -> Result<()> {
        let backends = self.backends()?;
        let mut failure = None;

        if let Some(primary) = &backends.primary {
            if let Err(e) = primary.delete(collection, key).await {
                tracing::warn!("Primary delete of {}/{} failed: {}", collection, key, e);
                failure = Some(e);
            }
        }

        if let Err(e) = backends.fallback.delete(collection, key).await {
            tracing::warn!("Fallback delete of {}/{} failed: {}", collection, key, e);
            failure.get_or_insert(e);
        }

        let Some(e) = failure else {
            return Ok(());
        };

        // A backend that cannot be read no longer serves the record
        match self.get(collection, key).await {
            Ok(None) => {
                tracing::debug!("{}/{} is no longer readable, treating as deleted", collection, key);
                Ok(())
            }
            _ => Err(e),
        }
    }

    /// Number of distinct keys across both backends
    pub async fn count(&self, collection: Collection) -> Result<usize> {
        let backends = self.backends()?;

        let fallback_empty = matches!(backends.fallback.count(collection).await, Ok(0));
        if fallback_empty {
            if let Some(primary) = &backends.primary {
                if let Ok(count) = primary.count(collection).await {
                    return Ok(count);
                }
            }
        }

        Ok(self.merged(collection).await?.len())
    }

    /// Pending sync queue items, for the UI badge
    pub async fn count_sync_queue(&self) -> Result<usize> {
        self.count(Collection::SyncQueue).await
    }

    /// Empty a collection in both backends
    pub async fn clear(&self, collection: Collection) -> Result<()> {
        let backends = self.backends()?;
        let mut failure = None;

        if let Some(primary) = &backends.primary {
            if let Err(e) = primary.clear(collection).await {
                tracing::warn!("Primary clear of {} failed: {}", collection, e);
                failure = Some(e);
            }
        }

        backends.fallback.clear(collection).await?;

        match failure {
            Some(e) if !self.merged(collection).await?.is_empty() => Err(e),
            _ => Ok(()),
        }
    }
}

fn decode<T: DeserializeOwned>(collection: Collection, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!("Skipping undecodable record in {}: {}", collection, e);
            None
        }
    }
}
