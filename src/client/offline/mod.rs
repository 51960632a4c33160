//! # Offline Mutation System
//!
//! Offline-first writes for stops and itineraries: every mutation lands in
//! the local store first and reaches the server either immediately or,
//! through the sync queue, once connectivity returns.
//!
//! ## Architecture
//!
//! The offline system consists of:
//! - **Two-phase mutations**: local write, then direct send or enqueue
//! - **Sync Queue**: write-ahead log of unconfirmed mutations
//! - **Retry Policy**: classification of replay responses
//! - **Reconciliation**: ordered replay of the queue
//!
//! ## Key Components
//!
//! - `queue.rs`: Sync queue manager
//! - `retry.rs`: Response classification and retry accounting
//! - `reconciliation.rs`: The reconciliation engine and its lock
//!
//! ## Usage
//!
//! ```rust,no_run
//! use route_sync::client::offline::OfflineManager;
//! use route_sync::shared::{NewStop, StopStatus};
//!
//! # async fn example(manager: OfflineManager) -> Result<(), route_sync::client::offline::OfflineError> {
//! let created = manager.create_stop(NewStop::new("12 High St", 51.5, -0.12)).await?;
//! manager
//!     .update_stop_status(&created.record.id, StopStatus::Delivered)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod queue;
pub mod reconciliation;
pub mod retry;

// Re-export main types
pub use queue::{HttpMethod, SyncOperationType, SyncQueue, SyncQueueItem};
pub use reconciliation::{ReconcileOutcome, Reconciler, SkipReason, SyncLock, SyncReport};
pub use retry::{ReplayVerdict, RetryDecision, RetryPolicy};

use crate::client::local_db::{LocalStore, StoreError};
use crate::client::query_cache::{QueryCache, QueryKey};
use crate::client::remote::{RemoteApi, RemoteError, RemoteRequest, RemoteResponse};
use crate::client::sync::sync_state::SyncSignals;
use crate::shared::config::DEFAULT_REQUEST_TIMEOUT;
use crate::shared::{
    DeliveryStats, ItineraryRecord, NewItinerary, NewStop, SharedError, StopPatch, StopRecord,
    StopStatus, SyncStatus,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors from the mutation and read API
#[derive(Debug, Error)]
pub enum OfflineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Invalid(#[from] SharedError),
}

/// Result type for offline operations
pub type Result<T> = std::result::Result<T, OfflineError>;

/// How a mutation reached (or will reach) the server
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Confirmed by the server during the call
    Synced,
    /// Written to the sync queue under this id
    Queued(Uuid),
    /// The server refused it and will keep refusing; not queued
    Rejected,
    /// Nothing changed, nothing sent
    Unchanged,
}

/// A local record after a mutation, with its delivery
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation<T> {
    pub record: T,
    pub delivery: Delivery,
}

/// One mutation bound for the server
struct Outbound {
    entity_id: String,
    operation: SyncOperationType,
    endpoint: String,
    method: HttpMethod,
    payload: Value,
    /// Other records whose queued work must replay first
    depends_on: Vec<String>,
}

/// Main offline manager coordinating local writes and their delivery
#[derive(Debug)]
pub struct OfflineManager {
    queue: Arc<SyncQueue>,
    remote: Arc<dyn RemoteApi>,
    signals: Arc<SyncSignals>,
    policy: RetryPolicy,
    cache: Arc<QueryCache>,
    request_timeout: Duration,
}

impl OfflineManager {
    pub fn new(
        queue: Arc<SyncQueue>,
        remote: Arc<dyn RemoteApi>,
        signals: Arc<SyncSignals>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            remote,
            signals,
            policy,
            cache: Arc::new(QueryCache::default()),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_cache(mut self, cache: Arc<QueryCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn store(&self) -> &Arc<LocalStore> {
        self.queue.store()
    }

    /// Check if the system is currently online
    pub fn is_online(&self) -> bool {
        self.signals.is_online()
    }

    // ---- Stops ----

    /// Create a stop at the end of its itinerary
    pub async fn create_stop(&self, new_stop: NewStop) -> Result<Mutation<StopRecord>> {
        new_stop.validate()?;

        let sequence = self
            .store()
            .next_sequence(new_stop.itinerary_id.as_deref())
            .await?;
        let mut stop = StopRecord::from_new(new_stop, sequence);
        self.store().put_stop(&stop).await?;
        self.invalidate_stops().await;
        tracing::info!("Created stop {} at position {}", stop.id, stop.sequence);

        let delivery = self
            .dispatch(Outbound {
                entity_id: stop.id.clone(),
                operation: SyncOperationType::CreateStop,
                endpoint: "/api/stops".to_string(),
                method: HttpMethod::Post,
                payload: stop.create_payload(),
                depends_on: stop.itinerary_id.iter().cloned().collect(),
            })
            .await?;

        if let Delivered::Confirmed(response) = &delivery {
            if let Some(server_id) = response.as_ref().and_then(RemoteResponse::record_id) {
                if server_id != stop.id {
                    self.store().rekey_stop(&stop.id, &server_id).await?;
                    self.queue.rebind_entity(&stop.id, &server_id).await?;
                    stop.id = server_id;
                }
            }
            self.store().mark_stop_synced(&stop.id).await?;
            stop.sync_status = SyncStatus::Synced;
        }

        Ok(Mutation {
            record: stop,
            delivery: delivery.into(),
        })
    }

    /// Edit a stop's address, coordinates or package count
    pub async fn update_stop(&self, id: &str, patch: StopPatch) -> Result<Mutation<StopRecord>> {
        let mut stop = self.require_stop(id).await?;
        if patch.is_empty() {
            return Ok(Mutation {
                record: stop,
                delivery: Delivery::Unchanged,
            });
        }
        patch.validate(&stop)?;

        patch.apply(&mut stop);
        stop.sync_status = SyncStatus::Pending;
        self.store().put_stop(&stop).await?;
        self.invalidate_stops().await;

        let delivery = self
            .dispatch(Outbound {
                entity_id: stop.id.clone(),
                operation: SyncOperationType::UpdateStop,
                endpoint: format!("/api/stops/{}", stop.id),
                method: HttpMethod::Patch,
                payload: serde_json::to_value(&patch).map_err(SharedError::from)?,
                depends_on: Vec::new(),
            })
            .await?;

        self.settle_stop(stop, delivery).await
    }

    /// Move a stop along its delivery lifecycle; the same status is a no-op
    pub async fn update_stop_status(&self, id: &str, status: StopStatus) -> Result<Mutation<StopRecord>> {
        let mut stop = self.require_stop(id).await?;
        if !stop.transition(status)? {
            return Ok(Mutation {
                record: stop,
                delivery: Delivery::Unchanged,
            });
        }

        stop.sync_status = SyncStatus::Pending;
        self.store().put_stop(&stop).await?;
        self.invalidate_stops().await;
        tracing::info!("Stop {} is now {}", stop.id, status);

        let delivery = self
            .dispatch(Outbound {
                entity_id: stop.id.clone(),
                operation: SyncOperationType::UpdateStopStatus,
                endpoint: format!("/api/stops/{}/status", stop.id),
                method: HttpMethod::Patch,
                payload: json!({ "status": status }),
                depends_on: Vec::new(),
            })
            .await?;

        self.settle_stop(stop, delivery).await
    }

    /// Delete a stop locally and remotely. Unknown ids are still sent, the
    /// record may exist only on the server.
    pub async fn delete_stop(&self, id: &str) -> Result<Delivery> {
        self.store().delete_stop(id).await?;
        self.invalidate_stops().await;
        tracing::info!("Deleted stop {}", id);

        let delivery = self
            .dispatch(Outbound {
                entity_id: id.to_string(),
                operation: SyncOperationType::DeleteStop,
                endpoint: format!("/api/stops/{}", id),
                method: HttpMethod::Delete,
                payload: Value::Null,
                depends_on: Vec::new(),
            })
            .await?;

        Ok(delivery.into())
    }

    /// Reorder an itinerary's stops; `stop_ids` must name each of its stops
    /// exactly once. Positions become `1..=n`.
    pub async fn reorder_stops(&self, itinerary_id: &str, stop_ids: &[String]) -> Result<Vec<StopRecord>> {
        let stops = self.store().stops_for_itinerary(Some(itinerary_id)).await?;

        let requested: HashSet<&str> = stop_ids.iter().map(String::as_str).collect();
        let existing: HashSet<&str> = stops.iter().map(|s| s.id.as_str()).collect();
        if requested.len() != stop_ids.len() || requested != existing {
            return Err(SharedError::validation(
                "stop_ids",
                "must list every stop of the itinerary exactly once",
            )
            .into());
        }

        let mut reordered = Vec::with_capacity(stops.len());
        for (position, id) in stop_ids.iter().enumerate() {
            let Some(mut stop) = stops.iter().find(|s| &s.id == id).cloned() else {
                continue;
            };
            stop.sequence = position as u32 + 1;
            stop.sync_status = SyncStatus::Pending;
            self.store().put_stop(&stop).await?;
            reordered.push(stop);
        }
        self.invalidate_stops().await;

        let delivery = self
            .dispatch(Outbound {
                entity_id: itinerary_id.to_string(),
                operation: SyncOperationType::ReorderStops,
                endpoint: "/api/stops/reorder".to_string(),
                method: HttpMethod::Patch,
                payload: json!({ "itineraryId": itinerary_id, "stopIds": stop_ids }),
                depends_on: stop_ids.to_vec(),
            })
            .await?;

        if matches!(delivery, Delivered::Confirmed(_)) {
            for stop in reordered.iter_mut() {
                self.store().mark_stop_synced(&stop.id).await?;
                stop.sync_status = SyncStatus::Synced;
            }
        }

        Ok(reordered)
    }

    // ---- Itinerary ----

    pub async fn create_itinerary(&self, new_itinerary: NewItinerary) -> Result<Mutation<ItineraryRecord>> {
        new_itinerary.validate()?;

        let mut itinerary = ItineraryRecord::from_new(new_itinerary);
        self.store().put_itinerary(&itinerary).await?;
        self.invalidate_itinerary().await;
        tracing::info!("Created itinerary {} for {}", itinerary.id, itinerary.date);

        let delivery = self
            .dispatch(Outbound {
                entity_id: itinerary.id.clone(),
                operation: SyncOperationType::CreateItinerary,
                endpoint: "/api/itinerary".to_string(),
                method: HttpMethod::Post,
                payload: itinerary.create_payload(),
                depends_on: Vec::new(),
            })
            .await?;

        if let Delivered::Confirmed(response) = &delivery {
            if let Some(server_id) = response.as_ref().and_then(RemoteResponse::record_id) {
                if server_id != itinerary.id {
                    self.store().rekey_itinerary(&itinerary.id, &server_id).await?;
                    self.queue.rebind_entity(&itinerary.id, &server_id).await?;
                    self.invalidate_stops().await;
                    itinerary.id = server_id;
                }
            }
            self.store().mark_itinerary_synced(&itinerary.id).await?;
            itinerary.sync_status = SyncStatus::Synced;
        }

        Ok(Mutation {
            record: itinerary,
            delivery: delivery.into(),
        })
    }

    // ---- Reads ----

    /// Stops of an itinerary (all stops for `None`) in delivery order
    pub async fn stops(&self, itinerary_id: Option<&str>) -> Result<Vec<StopRecord>> {
        let store = self.store();
        self.cache
            .get_or_load(QueryKey::Stops, itinerary_id.unwrap_or("*"), || async {
                store.stops_for_itinerary(itinerary_id).await
            })
            .await
            .map_err(OfflineError::from)
    }

    /// The current itinerary, if any
    pub async fn itinerary(&self) -> Result<Option<ItineraryRecord>> {
        let store = self.store();
        self.cache
            .get_or_load(QueryKey::Itinerary, "current", || async {
                store.current_itinerary().await
            })
            .await
            .map_err(OfflineError::from)
    }

    pub async fn delivery_stats(&self, itinerary_id: Option<&str>) -> Result<DeliveryStats> {
        let store = self.store();
        self.cache
            .get_or_load(QueryKey::Stats, itinerary_id.unwrap_or("*"), || async {
                let stops = store.stops_for_itinerary(itinerary_id).await?;
                Ok::<_, StoreError>(DeliveryStats::from_stops(&stops))
            })
            .await
            .map_err(OfflineError::from)
    }

    /// Total earnings across stored itineraries
    pub async fn earnings(&self) -> Result<f64> {
        let store = self.store();
        self.cache
            .get_or_load(QueryKey::Earnings, "*", || async {
                let itineraries = store.all_itineraries().await?;
                Ok::<_, StoreError>(itineraries.iter().map(|i| i.total_earnings).sum::<f64>())
            })
            .await
            .map_err(OfflineError::from)
    }

    // ---- Internals ----

    async fn require_stop(&self, id: &str) -> Result<StopRecord> {
        self.store()
            .get_stop(id)
            .await?
            .ok_or_else(|| SharedError::not_found("stop", id).into())
    }

    async fn settle_stop(&self, mut stop: StopRecord, delivery: Delivered) -> Result<Mutation<StopRecord>> {
        if matches!(delivery, Delivered::Confirmed(_)) {
            self.store().mark_stop_synced(&stop.id).await?;
            stop.sync_status = SyncStatus::Synced;
        }
        Ok(Mutation {
            record: stop,
            delivery: delivery.into(),
        })
    }

    async fn invalidate_stops(&self) {
        self.cache.invalidate(&[QueryKey::Stops, QueryKey::Stats]).await;
    }

    async fn invalidate_itinerary(&self) {
        self.cache
            .invalidate(&[QueryKey::Itinerary, QueryKey::Earnings])
            .await;
    }

    /// Phase two: send now when nothing earlier is queued for the record,
    /// otherwise append to the sync queue
    async fn dispatch(&self, outbound: Outbound) -> std::result::Result<Delivered, StoreError> {
        if self.is_online() && !self.blocked(&outbound).await? {
            let request = RemoteRequest::new(
                outbound.method,
                outbound.endpoint.clone(),
                match (outbound.method, &outbound.payload) {
                    (HttpMethod::Delete, _) | (_, Value::Null) => None,
                    (_, payload) => Some(payload.clone()),
                },
            );

            let result = match tokio::time::timeout(self.request_timeout, self.remote.send(&request)).await {
                Ok(result) => result,
                Err(_) => Err(RemoteError::Timeout(self.request_timeout)),
            };

            match result {
                Ok(response) => match self.policy.classify(response.status) {
                    ReplayVerdict::Applied | ReplayVerdict::AlreadyApplied => {
                        tracing::debug!("{} {} confirmed directly", outbound.operation, outbound.entity_id);
                        self.cache.invalidate(&QueryKey::ALL).await;
                        return Ok(Delivered::Confirmed(Some(response)));
                    }
                    ReplayVerdict::Rejected => {
                        tracing::warn!(
                            "{} {} rejected with HTTP {}",
                            outbound.operation,
                            outbound.entity_id,
                            response.status
                        );
                        return Ok(Delivered::Rejected);
                    }
                    ReplayVerdict::Transient => {
                        tracing::debug!(
                            "{} {} got HTTP {}, queueing",
                            outbound.operation,
                            outbound.entity_id,
                            response.status
                        );
                    }
                },
                Err(e) => {
                    tracing::debug!("{} {} not sent ({}), queueing", outbound.operation, outbound.entity_id, e);
                }
            }
        }

        let id = self
            .queue
            .enqueue_for(
                outbound.entity_id,
                outbound.operation,
                outbound.endpoint,
                outbound.method,
                outbound.payload,
            )
            .await?;
        Ok(Delivered::Queued(id))
    }

    async fn blocked(&self, outbound: &Outbound) -> std::result::Result<bool, StoreError> {
        if self.queue.has_pending_for(&outbound.entity_id).await? {
            return Ok(true);
        }
        for id in &outbound.depends_on {
            if self.queue.has_pending_for(id).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Internal delivery result, keeping the server response for id remapping
enum Delivered {
    Confirmed(Option<RemoteResponse>),
    Queued(Uuid),
    Rejected,
}

impl From<Delivered> for Delivery {
    fn from(delivered: Delivered) -> Self {
        match delivered {
            Delivered::Confirmed(_) => Delivery::Synced,
            Delivered::Queued(id) => Delivery::Queued(id),
            Delivered::Rejected => Delivery::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::sync::network_monitor::NetworkStatus;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingRemote {
        sent: Mutex<Vec<RemoteRequest>>,
        status: u16,
        body: Option<Value>,
    }

    #[async_trait]
    impl RemoteApi for RecordingRemote {
        async fn send(&self, request: &RemoteRequest) -> std::result::Result<RemoteResponse, RemoteError> {
            self.sent.lock().await.push(request.clone());
            Ok(RemoteResponse::new(self.status, self.body.clone()))
        }
    }

    fn manager(status: NetworkStatus, remote: Arc<RecordingRemote>) -> OfflineManager {
        let signals = Arc::new(SyncSignals::new(status));
        let queue = Arc::new(SyncQueue::new(Arc::new(LocalStore::memory_only()), signals.clone()));
        OfflineManager::new(queue, remote, signals, RetryPolicy::default())
    }

    fn ok_remote() -> Arc<RecordingRemote> {
        Arc::new(RecordingRemote {
            status: 200,
            ..RecordingRemote::default()
        })
    }

    #[tokio::test]
    async fn test_offline_create_is_queued() {
        let manager = manager(NetworkStatus::Offline, ok_remote());

        let created = manager
            .create_stop(NewStop::new("1 Main St", 40.0, -3.0).in_itinerary("it-1"))
            .await
            .unwrap();

        assert_matches!(created.delivery, Delivery::Queued(_));
        assert_eq!(created.record.status, StopStatus::Pending);
        assert_eq!(created.record.sync_status, SyncStatus::Pending);
        assert_eq!(created.record.sequence, 1);

        let items = manager.queue.dequeue_all().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].operation, SyncOperationType::CreateStop);
        assert_eq!(items[0].payload, json!({"addressFull": "1 Main St", "latitude": 40.0, "longitude": -3.0}));
    }

    #[tokio::test]
    async fn test_online_create_is_sent_and_synced() {
        let remote = ok_remote();
        let manager = manager(NetworkStatus::Online, remote.clone());

        let created = manager.create_stop(NewStop::new("1 Main St", 40.0, -3.0)).await.unwrap();

        assert_eq!(created.delivery, Delivery::Synced);
        assert_eq!(created.record.sync_status, SyncStatus::Synced);
        assert_eq!(manager.queue.count().await.unwrap(), 0);
        assert_eq!(remote.sent.lock().await[0].path, "/api/stops");
    }

    #[tokio::test]
    async fn test_online_create_adopts_server_id() {
        let remote = Arc::new(RecordingRemote {
            status: 201,
            body: Some(json!({"id": "srv-42"})),
            ..RecordingRemote::default()
        });
        let manager = manager(NetworkStatus::Online, remote);

        let created = manager.create_stop(NewStop::new("1 Main St", 40.0, -3.0)).await.unwrap();

        assert_eq!(created.record.id, "srv-42");
        assert!(manager.store().get_stop("srv-42").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_transient_failure_falls_back_to_queue() {
        let remote = Arc::new(RecordingRemote {
            status: 503,
            ..RecordingRemote::default()
        });
        let manager = manager(NetworkStatus::Online, remote);

        let created = manager.create_stop(NewStop::new("1 Main St", 40.0, -3.0)).await.unwrap();
        assert_matches!(created.delivery, Delivery::Queued(_));
        assert_eq!(created.record.sync_status, SyncStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_behind_queued_create_is_queued() {
        let manager = manager(NetworkStatus::Offline, ok_remote());
        let created = manager.create_stop(NewStop::new("1 Main St", 40.0, -3.0)).await.unwrap();

        manager.signals.set_network_status(NetworkStatus::Online);
        let updated = manager
            .update_stop_status(&created.record.id, StopStatus::Delivered)
            .await
            .unwrap();

        assert_matches!(updated.delivery, Delivery::Queued(_));
        assert!(updated.record.delivered_at.is_some());
        assert_eq!(manager.queue.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_behind_queued_reorder_is_queued() {
        let remote = ok_remote();
        let manager = manager(NetworkStatus::Online, remote.clone());
        let a = manager.create_stop(NewStop::new("A", 0.0, 0.0).in_itinerary("it-1")).await.unwrap();
        let b = manager.create_stop(NewStop::new("B", 0.0, 0.0).in_itinerary("it-1")).await.unwrap();
        assert_eq!(manager.queue.count().await.unwrap(), 0);

        manager.signals.set_network_status(NetworkStatus::Offline);
        manager
            .reorder_stops("it-1", &[b.record.id.clone(), a.record.id.clone()])
            .await
            .unwrap();

        manager.signals.set_network_status(NetworkStatus::Online);
        let updated = manager
            .update_stop(&a.record.id, StopPatch { package_count: Some(3), ..StopPatch::default() })
            .await
            .unwrap();

        assert_matches!(updated.delivery, Delivery::Queued(_));
        assert_eq!(updated.record.sync_status, SyncStatus::Pending);
        assert_eq!(remote.sent.lock().await.len(), 2);
        assert_eq!(manager.queue.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invalid_transition_rejected_locally() {
        let manager = manager(NetworkStatus::Offline, ok_remote());
        let created = manager.create_stop(NewStop::new("1 Main St", 40.0, -3.0)).await.unwrap();
        manager
            .update_stop_status(&created.record.id, StopStatus::Failed)
            .await
            .unwrap();

        let result = manager
            .update_stop_status(&created.record.id, StopStatus::Current)
            .await;
        assert_matches!(result, Err(OfflineError::Invalid(SharedError::InvalidTransition { .. })));
        assert_eq!(manager.queue.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_same_status_is_unchanged() {
        let manager = manager(NetworkStatus::Offline, ok_remote());
        let created = manager.create_stop(NewStop::new("1 Main St", 40.0, -3.0)).await.unwrap();

        let same = manager
            .update_stop_status(&created.record.id, StopStatus::Pending)
            .await
            .unwrap();
        assert_eq!(same.delivery, Delivery::Unchanged);
        assert_eq!(manager.queue.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_stop() {
        let manager = manager(NetworkStatus::Offline, ok_remote());
        let result = manager
            .update_stop("missing", StopPatch { package_count: Some(2), ..StopPatch::default() })
            .await;
        assert_matches!(result, Err(OfflineError::Invalid(SharedError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_reorder_requires_exact_set() {
        let manager = manager(NetworkStatus::Offline, ok_remote());
        let a = manager.create_stop(NewStop::new("A", 0.0, 0.0).in_itinerary("it-1")).await.unwrap();
        let b = manager.create_stop(NewStop::new("B", 0.0, 0.0).in_itinerary("it-1")).await.unwrap();

        let partial = manager.reorder_stops("it-1", &[a.record.id.clone()]).await;
        assert_matches!(partial, Err(OfflineError::Invalid(SharedError::ValidationError { .. })));

        let reordered = manager
            .reorder_stops("it-1", &[b.record.id.clone(), a.record.id.clone()])
            .await
            .unwrap();
        assert_eq!(reordered[0].id, b.record.id);
        assert_eq!(reordered[0].sequence, 1);
        assert_eq!(reordered[1].sequence, 2);

        let stops = manager.stops(Some("it-1")).await.unwrap();
        assert_eq!(stops[0].id, b.record.id);
    }

    #[tokio::test]
    async fn test_stats_follow_local_writes() {
        let manager = manager(NetworkStatus::Offline, ok_remote());
        let created = manager
            .create_stop(NewStop::new("1 Main St", 40.0, -3.0).with_packages(4))
            .await
            .unwrap();

        assert_eq!(manager.delivery_stats(None).await.unwrap().remaining, 1);

        manager
            .update_stop_status(&created.record.id, StopStatus::Delivered)
            .await
            .unwrap();

        let stats = manager.delivery_stats(None).await.unwrap();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.packages_delivered, 4);
    }
}
