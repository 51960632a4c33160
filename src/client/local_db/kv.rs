//! Key-value fallback backend
//!
//! Keeps every collection in one in-memory map and, when given a path,
//! mirrors it to a JSON document. A mutation becomes visible in memory only
//! after the document holding it is on disk. The document is written to a
//! sibling temp file and renamed into place so a crash never leaves a
//! half-written store behind.

use super::{BackendKind, Collection, Result, StoreBackend};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

type Entries = BTreeMap<String, BTreeMap<String, Value>>;

/// Fallback store: JSON file on disk, or memory only
#[derive(Debug)]
pub struct KeyValueStore {
    /// Backing file; `None` for memory only
    path: Option<PathBuf>,
    /// Collection name -> key -> record
    entries: RwLock<Entries>,
}

impl KeyValueStore {
    /// A store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(Entries::new()),
        }
    }

    /// Load `path` if it exists. An unreadable document is logged and the
    /// store starts empty; the next write replaces it.
    pub async fn open(path: PathBuf) -> Self {
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Entries>(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Ignoring unreadable fallback store {}: {}", path.display(), e);
                    Entries::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Entries::new(),
            Err(e) => {
                tracing::warn!("Cannot read fallback store {}: {}", path.display(), e);
                Entries::new()
            }
        };

        Self {
            path: Some(path),
            entries: RwLock::new(entries),
        }
    }

    /// Apply `change` and make it visible only once it is on disk. `change`
    /// returns whether it modified anything.
    async fn commit<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Entries) -> bool + Send,
    {
        let mut entries = self.entries.write().await;

        if self.path.is_none() {
            change(&mut entries);
            return Ok(());
        }

        let mut updated = entries.clone();
        if change(&mut updated) {
            self.persist(&updated).await?;
            *entries = updated;
        }
        Ok(())
    }

    /// Write the whole document; caller holds the write lock
    async fn persist(&self, entries: &Entries) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let temp = path.with_extension("tmp");
        tokio::fs::write(&temp, serde_json::to_vec(entries)?).await?;
        tokio::fs::rename(&temp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for KeyValueStore {
    fn kind(&self) -> BackendKind {
        BackendKind::KeyValue
    }

    async fn put(&self, collection: Collection, key: &str, value: &Value) -> Result<()> {
        self.commit(|entries| {
            entries
                .entry(collection.name().to_string())
                .or_default()
                .insert(key.to_string(), value.clone());
            true
        })
        .await
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(collection.name())
            .and_then(|records| records.get(key))
            .cloned())
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<(String, Value)>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(collection.name())
            .map(|records| {
                records
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<()> {
        self.commit(|entries| {
            entries
                .get_mut(collection.name())
                .and_then(|records| records.remove(key))
                .is_some()
        })
        .await
    }

    async fn count(&self, collection: Collection) -> Result<usize> {
        let entries = self.entries.read().await;
        Ok(entries.get(collection.name()).map_or(0, BTreeMap::len))
    }

    async fn clear(&self, collection: Collection) -> Result<()> {
        self.commit(|entries| entries.remove(collection.name()).is_some())
            .await
    }
}
