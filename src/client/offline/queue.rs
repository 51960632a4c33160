//! # Sync Queue
//!
//! Write-ahead queue of mutations that have been applied locally but not yet
//! confirmed by the server. Items live in the local store's `sync_queue`
//! collection, so they survive restarts and work against either backend.
//!
//! ## Features
//!
//! - **Persistent Queue**: every item is written through the [`LocalStore`]
//! - **Causal Ordering**: items replay in enqueue order, ties broken by id
//! - **Retry Tracking**: per-item retry counter and last error
//! - **Pending Signal**: the UI badge count is refreshed on every change
//! - **Id Remapping**: queued work follows an entity to its server-assigned id
//!
//! ## Usage
//!
//! ```rust,no_run
//! use route_sync::client::offline::queue::{HttpMethod, SyncOperationType, SyncQueue};
//! use serde_json::json;
//!
//! # async fn example(queue: SyncQueue) -> Result<(), route_sync::client::local_db::StoreError> {
//! let id = queue
//!     .enqueue(
//!         SyncOperationType::UpdateStopStatus,
//!         "/api/stops/s-1/status",
//!         HttpMethod::Patch,
//!         json!({"status": "delivered"}),
//!     )
//!     .await?;
//!
//! for item in queue.dequeue_all().await? {
//!     // Replay item...
//!     queue.remove(item.id).await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::client::local_db::{Collection, LocalStore, Result};
use crate::client::sync::sync_state::SyncSignals;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Kind of mutation a queue item replays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncOperationType {
    CreateStop,
    UpdateStop,
    DeleteStop,
    UpdateStopStatus,
    ReorderStops,
    CreateItinerary,
}

impl SyncOperationType {
    /// Creates may come back with a server-assigned id
    pub fn is_create(self) -> bool {
        matches!(self, Self::CreateStop | Self::CreateItinerary)
    }
}

impl fmt::Display for SyncOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateStop => "create-stop",
            Self::UpdateStop => "update-stop",
            Self::DeleteStop => "delete-stop",
            Self::UpdateStopStatus => "update-stop-status",
            Self::ReorderStops => "reorder-stops",
            Self::CreateItinerary => "create-itinerary",
        };
        f.write_str(name)
    }
}

/// HTTP method of a replayed mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending mutation awaiting remote application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueItem {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub operation: SyncOperationType,
    /// Path relative to the server root, e.g. `/api/stops/{id}`
    pub endpoint: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
    /// Local id of the mutated record, when there is one
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl SyncQueueItem {
    /// Replay order: enqueue time, then id
    fn order_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.enqueued_at, self.id)
    }

    /// Whether replaying this item changes `entity_id`: its own record, or
    /// any stop named in a reorder
    pub fn touches(&self, entity_id: &str) -> bool {
        if self.entity_id.as_deref() == Some(entity_id) {
            return true;
        }
        self.operation == SyncOperationType::ReorderStops
            && self
                .payload
                .get("stopIds")
                .and_then(Value::as_array)
                .is_some_and(|ids| ids.iter().any(|id| id.as_str() == Some(entity_id)))
    }
}

/// Sync queue manager
#[derive(Debug)]
pub struct SyncQueue {
    store: Arc<LocalStore>,
    signals: Arc<SyncSignals>,
    /// Last issued enqueue stamp, in microseconds
    last_stamp: AtomicI64,
}

impl SyncQueue {
    pub fn new(store: Arc<LocalStore>, signals: Arc<SyncSignals>) -> Self {
        Self {
            store,
            signals,
            last_stamp: AtomicI64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// Queue a mutation that is not tied to a single record
    pub async fn enqueue(
        &self,
        operation: SyncOperationType,
        endpoint: impl Into<String>,
        method: HttpMethod,
        payload: Value,
    ) -> Result<Uuid> {
        self.push(operation, endpoint.into(), method, payload, None)
            .await
    }

    /// Queue a mutation of the record `entity_id`
    pub async fn enqueue_for(
        &self,
        entity_id: impl Into<String>,
        operation: SyncOperationType,
        endpoint: impl Into<String>,
        method: HttpMethod,
        payload: Value,
    ) -> Result<Uuid> {
        self.push(
            operation,
            endpoint.into(),
            method,
            payload,
            Some(entity_id.into()),
        )
        .await
    }

    async fn push(
        &self,
        operation: SyncOperationType,
        endpoint: String,
        method: HttpMethod,
        payload: Value,
        entity_id: Option<String>,
    ) -> Result<Uuid> {
        let item = SyncQueueItem {
            id: Uuid::now_v7(),
            operation,
            endpoint,
            method,
            payload,
            enqueued_at: self.next_stamp(),
            retry_count: 0,
            entity_id,
            last_error: None,
        };

        self.store
            .put_record(Collection::SyncQueue, &item.id.to_string(), &item)
            .await?;
        tracing::debug!(
            "Queued {} {} {} as {}",
            item.operation,
            item.method,
            item.endpoint,
            item.id
        );

        self.refresh_pending_count().await?;
        Ok(item.id)
    }

    /// Wall-clock time, nudged forward so no two stamps are equal
    fn next_stamp(&self) -> DateTime<Utc> {
        let now = Utc::now().timestamp_micros();
        let mut last = self.last_stamp.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self
                .last_stamp
                .compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return DateTime::from_timestamp_micros(next).unwrap_or_else(Utc::now),
                Err(current) => last = current,
            }
        }
    }

    /// Keep stamps ahead of anything already persisted
    fn observe_stamp(&self, stamp: DateTime<Utc>) {
        self.last_stamp
            .fetch_max(stamp.timestamp_micros(), Ordering::SeqCst);
    }

    /// Every pending item across both backends, oldest first
    pub async fn dequeue_all(&self) -> Result<Vec<SyncQueueItem>> {
        let mut items: Vec<SyncQueueItem> =
            self.store.get_all_records(Collection::SyncQueue).await?;
        items.sort_by_key(SyncQueueItem::order_key);

        if let Some(latest) = items.last() {
            self.observe_stamp(latest.enqueued_at);
        }
        Ok(items)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<SyncQueueItem>> {
        self.store
            .get_record(Collection::SyncQueue, &id.to_string())
            .await
    }

    /// Remove an item; absent ids are a no-op
    pub async fn remove(&self, id: Uuid) -> Result<()> {
        self.store
            .delete(Collection::SyncQueue, &id.to_string())
            .await?;
        tracing::debug!("Removed queue item {}", id);
        self.refresh_pending_count().await?;
        Ok(())
    }

    /// Persist one more failed attempt; returns the new retry count, or
    /// `None` when the item no longer exists
    pub async fn increment_retry(&self, id: Uuid, error: Option<String>) -> Result<Option<u32>> {
        let Some(mut item) = self.get(id).await? else {
            return Ok(None);
        };

        item.retry_count += 1;
        if error.is_some() {
            item.last_error = error;
        }
        self.store
            .put_record(Collection::SyncQueue, &id.to_string(), &item)
            .await?;

        Ok(Some(item.retry_count))
    }

    pub async fn count(&self) -> Result<usize> {
        self.store.count_sync_queue().await
    }

    /// Recount the queue and publish the result
    pub async fn refresh_pending_count(&self) -> Result<usize> {
        let count = self.count().await?;
        self.signals.set_pending(count);
        Ok(count)
    }

    /// Whether any queued item touches `entity_id`
    pub async fn has_pending_for(&self, entity_id: &str) -> Result<bool> {
        Ok(self
            .dequeue_all()
            .await?
            .iter()
            .any(|item| item.touches(entity_id)))
    }

    /// Point queued work for `old_id` at `new_id`: entity ids, endpoint
    /// path segments and payload values equal to the old id are rewritten.
    /// Returns the number of items changed.
    pub async fn rebind_entity(&self, old_id: &str, new_id: &str) -> Result<usize> {
        if old_id == new_id {
            return Ok(0);
        }

        let mut rebound = 0;
        for mut item in self.dequeue_all().await? {
            let mut changed = false;

            if item.entity_id.as_deref() == Some(old_id) {
                item.entity_id = Some(new_id.to_string());
                changed = true;
            }

            let endpoint = rewrite_path(&item.endpoint, old_id, new_id);
            if endpoint != item.endpoint {
                item.endpoint = endpoint;
                changed = true;
            }

            changed |= replace_id(&mut item.payload, old_id, new_id);

            if changed {
                self.store
                    .put_record(Collection::SyncQueue, &item.id.to_string(), &item)
                    .await?;
                rebound += 1;
            }
        }

        if rebound > 0 {
            tracing::info!("Rebound {} queued items from {} to {}", rebound, old_id, new_id);
        }
        Ok(rebound)
    }
}

fn rewrite_path(path: &str, old_id: &str, new_id: &str) -> String {
    path.split('/')
        .map(|segment| if segment == old_id { new_id } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

fn replace_id(value: &mut Value, old_id: &str, new_id: &str) -> bool {
    match value {
        Value::String(s) if s == old_id => {
            *s = new_id.to_string();
            true
        }
        Value::Array(values) => values
            .iter_mut()
            .fold(false, |changed, v| replace_id(v, old_id, new_id) | changed),
        Value::Object(map) => map
            .values_mut()
            .fold(false, |changed, v| replace_id(v, old_id, new_id) | changed),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::local_db::{KeyValueStore, StoreError, StoreConfig};
    use crate::client::local_db::tests::UnavailableBackend;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn queue_on(store: LocalStore) -> (SyncQueue, Arc<SyncSignals>) {
        let signals = Arc::new(SyncSignals::default());
        (SyncQueue::new(Arc::new(store), signals.clone()), signals)
    }

    #[tokio::test]
    async fn test_enqueue_before_init_is_not_ready() {
        let (queue, _) = queue_on(LocalStore::new(StoreConfig::default()));
        let result = queue
            .enqueue(SyncOperationType::CreateStop, "/api/stops", HttpMethod::Post, json!({}))
            .await;
        assert!(matches!(result, Err(StoreError::NotReady)));
    }

    #[tokio::test]
    async fn test_enqueue_orders_and_counts() {
        let (queue, signals) = queue_on(LocalStore::open_in_memory().await.unwrap());

        let first = queue
            .enqueue_for("s-1", SyncOperationType::CreateStop, "/api/stops", HttpMethod::Post, json!({}))
            .await
            .unwrap();
        let second = queue
            .enqueue_for(
                "s-1",
                SyncOperationType::UpdateStopStatus,
                "/api/stops/s-1/status",
                HttpMethod::Patch,
                json!({"status": "delivered"}),
            )
            .await
            .unwrap();

        let items = queue.dequeue_all().await.unwrap();
        let ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![first, second]);
        assert!(items[0].enqueued_at < items[1].enqueued_at);
        assert_eq!(items[0].retry_count, 0);
        assert_eq!(signals.pending(), 2);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (queue, signals) = queue_on(LocalStore::memory_only());
        let id = queue
            .enqueue(SyncOperationType::DeleteStop, "/api/stops/s-1", HttpMethod::Delete, Value::Null)
            .await
            .unwrap();

        queue.remove(id).await.unwrap();
        queue.remove(id).await.unwrap();
        queue.remove(Uuid::new_v4()).await.unwrap();

        assert_eq!(queue.count().await.unwrap(), 0);
        assert_eq!(signals.pending(), 0);
    }

    #[tokio::test]
    async fn test_increment_retry_persists() {
        let (queue, _) = queue_on(LocalStore::open_in_memory().await.unwrap());
        let id = queue
            .enqueue(SyncOperationType::CreateStop, "/api/stops", HttpMethod::Post, json!({}))
            .await
            .unwrap();

        assert_eq!(queue.increment_retry(id, Some("HTTP 503".into())).await.unwrap(), Some(1));
        assert_eq!(queue.increment_retry(id, None).await.unwrap(), Some(2));

        let item = queue.get(id).await.unwrap().unwrap();
        assert_eq!(item.retry_count, 2);
        assert_eq!(item.last_error.as_deref(), Some("HTTP 503"));

        assert_eq!(queue.increment_retry(Uuid::new_v4(), None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_queue_works_on_fallback_only() {
        let store = LocalStore::with_backends(
            Some(Arc::new(UnavailableBackend)),
            Arc::new(KeyValueStore::in_memory()),
        );
        let (queue, signals) = queue_on(store);

        let id = queue
            .enqueue(SyncOperationType::CreateItinerary, "/api/itinerary", HttpMethod::Post, json!({}))
            .await
            .unwrap();
        assert_eq!(signals.pending(), 1);
        assert_eq!(queue.dequeue_all().await.unwrap()[0].id, id);

        queue.remove(id).await.unwrap();
        assert_eq!(signals.pending(), 0);
    }

    #[tokio::test]
    async fn test_has_pending_for() {
        let (queue, _) = queue_on(LocalStore::memory_only());
        queue
            .enqueue_for("s-1", SyncOperationType::CreateStop, "/api/stops", HttpMethod::Post, json!({}))
            .await
            .unwrap();

        assert!(queue.has_pending_for("s-1").await.unwrap());
        assert!(!queue.has_pending_for("s-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_queued_reorder_covers_its_stops() {
        let (queue, _) = queue_on(LocalStore::memory_only());
        queue
            .enqueue_for(
                "it-1",
                SyncOperationType::ReorderStops,
                "/api/stops/reorder",
                HttpMethod::Patch,
                json!({"itineraryId": "it-1", "stopIds": ["s-2", "s-1"]}),
            )
            .await
            .unwrap();

        assert!(queue.has_pending_for("it-1").await.unwrap());
        assert!(queue.has_pending_for("s-1").await.unwrap());
        assert!(queue.has_pending_for("s-2").await.unwrap());
        assert!(!queue.has_pending_for("s-3").await.unwrap());
    }

    #[tokio::test]
    async fn test_rebind_entity_rewrites_later_items() {
        let (queue, _) = queue_on(LocalStore::memory_only());
        queue
            .enqueue_for(
                "local-1",
                SyncOperationType::UpdateStopStatus,
                "/api/stops/local-1/status",
                HttpMethod::Patch,
                json!({"status": "delivered"}),
            )
            .await
            .unwrap();
        queue
            .enqueue(
                SyncOperationType::ReorderStops,
                "/api/stops/reorder",
                HttpMethod::Patch,
                json!({"itineraryId": "it-1", "stopIds": ["local-1", "s-9"]}),
            )
            .await
            .unwrap();

        assert_eq!(queue.rebind_entity("local-1", "srv-1").await.unwrap(), 2);

        let items = queue.dequeue_all().await.unwrap();
        assert_eq!(items[0].endpoint, "/api/stops/srv-1/status");
        assert_eq!(items[0].entity_id.as_deref(), Some("srv-1"));
        assert_eq!(items[1].payload["stopIds"], json!(["srv-1", "s-9"]));
    }

    #[test]
    fn test_item_wire_format() {
        let item = SyncQueueItem {
            id: Uuid::nil(),
            operation: SyncOperationType::UpdateStopStatus,
            endpoint: "/api/stops/s-1/status".into(),
            method: HttpMethod::Patch,
            payload: json!({"status": "current"}),
            enqueued_at: DateTime::from_timestamp(0, 0).unwrap(),
            retry_count: 0,
            entity_id: Some("s-1".into()),
            last_error: None,
        };

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "update-stop-status");
        assert_eq!(value["method"], "PATCH");
        assert_eq!(value["retryCount"], 0);
    }
}
