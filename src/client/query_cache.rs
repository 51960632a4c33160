//! Read-through query cache
//!
//! Holds the results of read queries (stop lists, itinerary, derived
//! stats) so repeated renders do not rescan the store. Entries expire after
//! a TTL and whole query families are invalidated once the server confirms
//! a mutation.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Default entry lifetime
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Families of cached queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Stops,
    Itinerary,
    Stats,
    Earnings,
}

impl QueryKey {
    /// Every family a confirmed mutation can affect
    pub const ALL: [QueryKey; 4] = [
        QueryKey::Stops,
        QueryKey::Itinerary,
        QueryKey::Stats,
        QueryKey::Earnings,
    ];
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Value,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    /// `(family, scope)` -> entry; scope is e.g. an itinerary id
    entries: HashMap<(QueryKey, String), CacheEntry>,
    generations: HashMap<QueryKey, u64>,
}

/// In-memory cache of query results
#[derive(Debug)]
pub struct QueryCache {
    inner: RwLock<Inner>,
    default_ttl: Duration,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl QueryCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            default_ttl,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: QueryKey, scope: &str) -> Option<T> {
        let inner = self.inner.read().await;
        let entry = inner.entries.get(&(key, scope.to_string()))?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        serde_json::from_value(entry.data.clone()).ok()
    }

    pub async fn insert<T: Serialize>(&self, key: QueryKey, scope: &str, value: &T) {
        let Ok(data) = serde_json::to_value(value) else {
            return;
        };
        let mut inner = self.inner.write().await;
        inner.entries.insert(
            (key, scope.to_string()),
            CacheEntry {
                data,
                expires_at: Instant::now() + self.default_ttl,
            },
        );
    }

    /// Return the cached value or run `load` and cache its result. A load
    /// that overlaps an invalidation of `key` is returned but not cached.
    pub async fn get_or_load<T, E, F, Fut>(&self, key: QueryKey, scope: &str, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key, scope).await {
            return Ok(hit);
        }

        let generation = self.generation(key).await;
        let value = load().await?;

        if self.generation(key).await == generation {
            self.insert(key, scope, &value).await;
        }
        Ok(value)
    }

    /// Drop every entry of the given families
    pub async fn invalidate(&self, keys: &[QueryKey]) {
        let mut inner = self.inner.write().await;
        inner.entries.retain(|(key, _), _| !keys.contains(key));
        for key in keys {
            *inner.generations.entry(*key).or_default() += 1;
        }
        tracing::debug!("Invalidated cached queries {:?}", keys);
    }

    pub async fn invalidate_all(&self) {
        self.invalidate(&QueryKey::ALL).await;
    }

    /// Number of invalidations `key` has seen
    pub async fn generation(&self, key: QueryKey) -> u64 {
        self.inner
            .read()
            .await
            .generations
            .get(&key)
            .copied()
            .unwrap_or_default()
    }

    /// Drop expired entries
    pub async fn cleanup_expired(&self) {
        let now = Instant::now();
        self.inner
            .write()
            .await
            .entries
            .retain(|_, entry| entry.expires_at > now);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
