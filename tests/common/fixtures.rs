//! Test fixtures

use crate::common::mock_remote::MockRemote;
use async_trait::async_trait;
use chrono::NaiveDate;
use route_sync::client::local_db::{
    BackendKind, Collection, KeyValueStore, LocalStore, StoreBackend, StoreError,
};
use route_sync::client::offline::{OfflineManager, Reconciler, RetryPolicy, SyncQueue};
use route_sync::client::query_cache::QueryCache;
use route_sync::client::sync::{NetworkStatus, SyncSignals};
use route_sync::shared::{AppConfig, NewItinerary, NewStop, StopRecord, SyncStatus};
use serde_json::Value;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default settings: 2 s settle delay, 30 s poll, 3 retries
pub fn test_config() -> AppConfig {
    AppConfig::default()
}

pub fn stop_at(address: &str) -> NewStop {
    NewStop::new(address, 51.5072, -0.1276)
}

pub fn itinerary_on(day: u32) -> NewItinerary {
    NewItinerary {
        user_id: "courier-1".to_string(),
        date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
        name: format!("Round {}", day),
    }
}

/// A stop the server already knows about
pub fn synced_stop(id: &str, address: &str) -> StopRecord {
    let mut stop = StopRecord::from_new(stop_at(address), 1);
    stop.id = id.to_string();
    stop.sync_status = SyncStatus::Synced;
    stop
}

/// Queue, reconciler and manager sharing one store, cache and state
pub struct Harness {
    pub store: Arc<LocalStore>,
    pub signals: Arc<SyncSignals>,
    pub queue: Arc<SyncQueue>,
    pub cache: Arc<QueryCache>,
    pub remote: Arc<MockRemote>,
    pub reconciler: Arc<Reconciler>,
    pub manager: OfflineManager,
}

impl Harness {
    pub fn new(status: NetworkStatus) -> Self {
        Self::with_store(LocalStore::memory_only(), status)
    }

    pub fn with_store(store: LocalStore, status: NetworkStatus) -> Self {
        let store = Arc::new(store);
        let signals = Arc::new(SyncSignals::new(status));
        let queue = Arc::new(SyncQueue::new(store.clone(), signals.clone()));
        let cache = Arc::new(QueryCache::default());
        let remote = MockRemote::new();
        let policy = RetryPolicy::from_config(&test_config());

        let reconciler = Reconciler::new(queue.clone(), remote.clone(), signals.clone(), policy.clone())
            .with_cache(cache.clone());
        let manager = OfflineManager::new(queue.clone(), remote.clone(), signals.clone(), policy)
            .with_cache(cache.clone());

        Self {
            store,
            signals,
            queue,
            cache,
            remote,
            reconciler: Arc::new(reconciler),
            manager,
        }
    }

    pub fn go_online(&self) {
        self.signals.set_network_status(NetworkStatus::Online);
    }

    pub fn go_offline(&self) {
        self.signals.set_network_status(NetworkStatus::Offline);
    }
}

/// Key-value backend that can be made to fail, standing in for a primary
/// database that comes and goes. `failing` breaks writes only; `blocked`
/// breaks every operation.
#[derive(Debug)]
pub struct FlakyBackend {
    inner: KeyValueStore,
    failing: AtomicBool,
    blocked: AtomicBool,
}

impl FlakyBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: KeyValueStore::in_memory(),
            failing: AtomicBool::new(false),
            blocked: AtomicBool::new(false),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "disk I/O error").into());
        }
        self.check()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.blocked.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "database is locked").into());
        }
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for FlakyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    async fn put(&self, collection: Collection, key: &str, value: &Value) -> Result<(), StoreError> {
        self.check_write()?;
        self.inner.put(collection, key, value).await
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError> {
        self.check()?;
        self.inner.get(collection, key).await
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<(String, Value)>, StoreError> {
        self.check()?;
        self.inner.get_all(collection).await
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<(), StoreError> {
        self.check_write()?;
        self.inner.delete(collection, key).await
    }

    async fn count(&self, collection: Collection) -> Result<usize, StoreError> {
        self.check()?;
        self.inner.count(collection).await
    }

    async fn clear(&self, collection: Collection) -> Result<(), StoreError> {
        self.check_write()?;
        self.inner.clear(collection).await
    }
}

/// A store whose primary is a [`FlakyBackend`] over an in-memory fallback
pub fn flaky_store() -> (LocalStore, Arc<FlakyBackend>) {
    let primary = FlakyBackend::new();
    let store = LocalStore::with_backends(
        Some(primary.clone() as Arc<dyn StoreBackend>),
        Arc::new(KeyValueStore::in_memory()),
    );
    (store, primary)
}
