//! # Reconciliation Engine
//!
//! Replays the sync queue against the remote API and folds the results back
//! into local state.
//!
//! ## Features
//!
//! - **Single Pass at a Time**: a try-acquire lock; a trigger that finds a
//!   pass running is a no-op
//! - **Causal Replay**: items are sent one by one in enqueue order
//! - **Item Isolation**: a failing item never aborts the pass
//! - **Bounded Calls**: every request runs under a deadline; a timeout is a
//!   transient failure
//! - **Id Remapping**: a create answered with a server id moves the local
//!   record and the queued work behind it to that id
//! - **Aggregate Reporting**: one [`SyncReport`] per pass, to the state
//!   signal and the notifier
//!
//! ## Usage
//!
//! ```rust,no_run
//! use route_sync::client::offline::reconciliation::{ReconcileOutcome, Reconciler};
//!
//! # async fn example(reconciler: Reconciler) {
//! match reconciler.reconcile().await {
//!     ReconcileOutcome::Completed(report) => println!("{} synced", report.succeeded),
//!     ReconcileOutcome::Idle => println!("Nothing to do"),
//!     ReconcileOutcome::Skipped(reason) => println!("Skipped: {:?}", reason),
//! }
//! # }
//! ```

use crate::client::notify::{LogNotifier, SyncNotifier};
use crate::client::offline::queue::{SyncOperationType, SyncQueue, SyncQueueItem};
use crate::client::offline::retry::{ReplayVerdict, RetryDecision, RetryPolicy};
use crate::client::query_cache::{QueryCache, QueryKey};
use crate::client::remote::{RemoteApi, RemoteError, RemoteRequest, RemoteResponse};
use crate::client::local_db::{LocalStore, Result as StoreResult};
use crate::client::sync::sync_state::SyncSignals;
use crate::shared::config::DEFAULT_REQUEST_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Aggregate outcome of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Applied, or already applied per a conflict status
    pub succeeded: usize,
    /// Transient failures, including drops
    pub failed: usize,
    /// Failures that exhausted their retries and were removed
    pub dropped: usize,
    /// Removed because the server will never accept them
    pub rejected: usize,
}

impl SyncReport {
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.rejected
    }
}

/// Why a reconciliation request did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyRunning,
    Offline,
    NotReady,
}

/// Result of [`Reconciler::reconcile`]; a pass never fails as a whole
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Skipped(SkipReason),
    /// The queue was empty
    Idle,
    Completed(SyncReport),
}

/// In-flight flag with an atomic try-acquire
#[derive(Debug)]
pub struct SyncLock {
    in_flight: AtomicBool,
    signals: Arc<SyncSignals>,
}

impl SyncLock {
    pub fn new(signals: Arc<SyncSignals>) -> Self {
        Self {
            in_flight: AtomicBool::new(false),
            signals,
        }
    }

    /// Take the lock unless a pass already holds it
    pub fn try_acquire(&self) -> Option<SyncGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.signals.set_syncing(true);
        Some(SyncGuard { lock: self })
    }

    pub fn is_held(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Releases the [`SyncLock`] when dropped
#[derive(Debug)]
pub struct SyncGuard<'a> {
    lock: &'a SyncLock,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.lock.in_flight.store(false, Ordering::Release);
        self.lock.signals.set_syncing(false);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Succeeded,
    Retrying,
    Dropped,
    Rejected,
}

/// Reconciliation engine
#[derive(Debug)]
pub struct Reconciler {
    queue: Arc<SyncQueue>,
    remote: Arc<dyn RemoteApi>,
    signals: Arc<SyncSignals>,
    policy: RetryPolicy,
    request_timeout: Duration,
    lock: SyncLock,
    cache: Arc<QueryCache>,
    notifier: Arc<dyn SyncNotifier>,
}

impl Reconciler {
    pub fn new(
        queue: Arc<SyncQueue>,
        remote: Arc<dyn RemoteApi>,
        signals: Arc<SyncSignals>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            remote,
            lock: SyncLock::new(signals.clone()),
            signals,
            policy,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cache: Arc::new(QueryCache::default()),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_cache(mut self, cache: Arc<QueryCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn SyncNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn is_running(&self) -> bool {
        self.lock.is_held()
    }

    pub fn queue(&self) -> &Arc<SyncQueue> {
        &self.queue
    }

    fn store(&self) -> &Arc<LocalStore> {
        self.queue.store()
    }

    /// Run one pass over the queue snapshot taken at its start
    pub async fn reconcile(&self) -> ReconcileOutcome {
        if !self.store().is_ready() {
            return ReconcileOutcome::Skipped(SkipReason::NotReady);
        }
        if !self.signals.is_online() {
            tracing::debug!("Offline, skipping reconciliation");
            return ReconcileOutcome::Skipped(SkipReason::Offline);
        }
        let Some(_guard) = self.lock.try_acquire() else {
            tracing::debug!("Reconciliation already in flight");
            return ReconcileOutcome::Skipped(SkipReason::AlreadyRunning);
        };

        let items = match self.queue.dequeue_all().await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("Cannot read sync queue, ending pass: {}", e);
                self.refresh_pending().await;
                return ReconcileOutcome::Idle;
            }
        };
        if items.is_empty() {
            self.refresh_pending().await;
            return ReconcileOutcome::Idle;
        }

        tracing::info!("Reconciling {} queued operations", items.len());
        let mut report = SyncReport::default();

        for id in items.into_iter().map(|item| item.id) {
            // Re-read: an earlier create may have rebound this item
            let item = match self.queue.get(id).await {
                Ok(Some(item)) => item,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("Cannot load queue item {}: {}", id, e);
                    report.failed += 1;
                    continue;
                }
            };

            match self.process(&item).await {
                ItemOutcome::Succeeded => report.succeeded += 1,
                ItemOutcome::Retrying => report.failed += 1,
                ItemOutcome::Dropped => {
                    report.failed += 1;
                    report.dropped += 1;
                }
                ItemOutcome::Rejected => report.rejected += 1,
            }
        }

        self.refresh_pending().await;

        if report.succeeded > 0 {
            self.cache.invalidate(&QueryKey::ALL).await;
        }

        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            dropped = report.dropped,
            rejected = report.rejected,
            "Reconciliation pass complete"
        );
        self.signals.record_report(report);
        self.notifier.notify(&report).await;

        ReconcileOutcome::Completed(report)
    }

    async fn refresh_pending(&self) {
        if let Err(e) = self.queue.refresh_pending_count().await {
            tracing::warn!("Failed to refresh pending count: {}", e);
        }
    }

    async fn process(&self, item: &SyncQueueItem) -> ItemOutcome {
        let request = RemoteRequest::from_item(item);

        let result = match tokio::time::timeout(self.request_timeout, self.remote.send(&request)).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(self.request_timeout)),
        };

        let (verdict, error) = match &result {
            Ok(response) => {
                let verdict = self.policy.classify(response.status);
                (verdict, Some(format!("HTTP {}", response.status)))
            }
            Err(e) => (ReplayVerdict::Transient, Some(e.to_string())),
        };

        match verdict {
            ReplayVerdict::Applied | ReplayVerdict::AlreadyApplied => {
                tracing::debug!("{} {} confirmed ({:?})", item.operation, item.id, verdict);
                let response = result.ok();
                if let Err(e) = self.confirm(item, response.as_ref()).await {
                    tracing::warn!("Failed to record confirmation of {}: {}", item.id, e);
                }
                ItemOutcome::Succeeded
            }
            ReplayVerdict::Rejected => {
                tracing::warn!(
                    "{} {} rejected by server: {}",
                    item.operation,
                    item.id,
                    error.as_deref().unwrap_or_default()
                );
                if let Err(e) = self.queue.remove(item.id).await {
                    tracing::warn!("Failed to remove rejected item {}: {}", item.id, e);
                }
                ItemOutcome::Rejected
            }
            ReplayVerdict::Transient => self.record_failure(item, error).await,
        }
    }

    async fn record_failure(&self, item: &SyncQueueItem, error: Option<String>) -> ItemOutcome {
        match self.policy.after_failure(item.retry_count) {
            RetryDecision::Retry { attempts } => {
                tracing::debug!(
                    "{} {} failed (attempt {}): {}",
                    item.operation,
                    item.id,
                    attempts,
                    error.as_deref().unwrap_or_default()
                );
                if let Err(e) = self.queue.increment_retry(item.id, error).await {
                    tracing::warn!("Failed to record retry of {}: {}", item.id, e);
                }
                ItemOutcome::Retrying
            }
            RetryDecision::Drop { attempts } => {
                tracing::warn!(
                    item_id = %item.id,
                    operation = %item.operation,
                    endpoint = %item.endpoint,
                    attempts,
                    last_error = error.as_deref().unwrap_or_default(),
                    "Dropping sync item after exhausting retries"
                );
                if let Err(e) = self.queue.remove(item.id).await {
                    tracing::warn!("Failed to drop item {}: {}", item.id, e);
                }
                ItemOutcome::Dropped
            }
        }
    }

    /// Remove a confirmed item and settle the local record it touched
    async fn confirm(&self, item: &SyncQueueItem, response: Option<&RemoteResponse>) -> StoreResult<()> {
        if let Err(e) = self.queue.remove(item.id).await {
            tracing::warn!("Failed to remove confirmed item {}: {}", item.id, e);
        }

        let mut entity_id = item.entity_id.clone();

        if item.operation.is_create() {
            if let (Some(local_id), Some(server_id)) =
                (entity_id.as_deref(), response.and_then(RemoteResponse::record_id))
            {
                if local_id != server_id {
                    self.rebind(item.operation, local_id, &server_id).await?;
                    entity_id = Some(server_id);
                }
            }
        }

        match item.operation {
            SyncOperationType::CreateStop
            | SyncOperationType::UpdateStop
            | SyncOperationType::UpdateStopStatus => {
                if let Some(id) = entity_id.as_deref() {
                    self.mark_stop_if_settled(id).await?;
                }
            }
            SyncOperationType::CreateItinerary => {
                if let Some(id) = entity_id.as_deref() {
                    if !self.queue.has_pending_for(id).await? {
                        self.store().mark_itinerary_synced(id).await?;
                    }
                }
            }
            SyncOperationType::ReorderStops => {
                let stop_ids = item
                    .payload
                    .get("stopIds")
                    .and_then(|ids| ids.as_array())
                    .into_iter()
                    .flatten()
                    .filter_map(|id| id.as_str());
                for id in stop_ids {
                    self.mark_stop_if_settled(id).await?;
                }
            }
            SyncOperationType::DeleteStop => {}
        }

        Ok(())
    }

    async fn mark_stop_if_settled(&self, id: &str) -> StoreResult<()> {
        if !self.queue.has_pending_for(id).await? {
            self.store().mark_stop_synced(id).await?;
        }
        Ok(())
    }

    async fn rebind(&self, operation: SyncOperationType, local_id: &str, server_id: &str) -> StoreResult<()> {
        tracing::info!("Server assigned id {} to local {} {}", server_id, operation, local_id);
        match operation {
            SyncOperationType::CreateStop => {
                self.store().rekey_stop(local_id, server_id).await?;
            }
            SyncOperationType::CreateItinerary => {
                self.store().rekey_itinerary(local_id, server_id).await?;
            }
            _ => {}
        }
        self.queue.rebind_entity(local_id, server_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::offline::queue::HttpMethod;
    use crate::client::sync::network_monitor::NetworkStatus;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    /// Answers with a fixed sequence of statuses, then 200
    #[derive(Debug, Default)]
    struct ScriptedRemote {
        statuses: Mutex<VecDeque<u16>>,
        sent: Mutex<Vec<RemoteRequest>>,
    }

    impl ScriptedRemote {
        fn with(statuses: &[u16]) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().copied().collect()),
                sent: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl RemoteApi for ScriptedRemote {
        async fn send(&self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError> {
            self.sent.lock().await.push(request.clone());
            let status = self.statuses.lock().await.pop_front().unwrap_or(200);
            Ok(RemoteResponse::new(status, None))
        }
    }

    /// Never answers
    #[derive(Debug)]
    struct HangingRemote;

    #[async_trait]
    impl RemoteApi for HangingRemote {
        async fn send(&self, _: &RemoteRequest) -> Result<RemoteResponse, RemoteError> {
            std::future::pending().await
        }
    }

    fn setup(remote: Arc<dyn RemoteApi>) -> (Reconciler, Arc<SyncQueue>, Arc<SyncSignals>) {
        let signals = Arc::new(SyncSignals::new(NetworkStatus::Online));
        let queue = Arc::new(SyncQueue::new(Arc::new(LocalStore::memory_only()), signals.clone()));
        let reconciler = Reconciler::new(queue.clone(), remote, signals.clone(), RetryPolicy::default());
        (reconciler, queue, signals)
    }

    async fn enqueue_status(queue: &SyncQueue, stop: &str) -> uuid::Uuid {
        queue
            .enqueue_for(
                stop,
                SyncOperationType::UpdateStopStatus,
                format!("/api/stops/{}/status", stop),
                HttpMethod::Patch,
                json!({"status": "delivered"}),
            )
            .await
            .unwrap()
    }

    #[test]
    fn test_lock_is_exclusive() {
        let signals = Arc::new(SyncSignals::default());
        let lock = SyncLock::new(signals.clone());

        let guard = lock.try_acquire();
        assert!(guard.is_some());
        assert!(signals.snapshot().is_syncing);
        assert!(lock.try_acquire().is_none());

        drop(guard);
        assert!(!lock.is_held());
        assert!(!signals.snapshot().is_syncing);
        assert!(lock.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_skips_when_offline() {
        let (reconciler, queue, signals) = setup(Arc::new(ScriptedRemote::default()));
        enqueue_status(&queue, "s-1").await;
        signals.set_network_status(NetworkStatus::Offline);

        assert_eq!(
            reconciler.reconcile().await,
            ReconcileOutcome::Skipped(SkipReason::Offline)
        );
        assert_eq!(queue.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_idle_on_empty_queue() {
        let (reconciler, _, _) = setup(Arc::new(ScriptedRemote::default()));
        assert_eq!(reconciler.reconcile().await, ReconcileOutcome::Idle);
    }

    #[tokio::test]
    async fn test_confirmation_settles_record_on_fallback_only() {
        use crate::client::local_db::tests::UnavailableBackend;
        use crate::client::local_db::KeyValueStore;
        use crate::shared::{NewStop, StopRecord, SyncStatus};

        let store = Arc::new(LocalStore::with_backends(
            Some(Arc::new(UnavailableBackend)),
            Arc::new(KeyValueStore::in_memory()),
        ));
        let signals = Arc::new(SyncSignals::new(NetworkStatus::Online));
        let queue = Arc::new(SyncQueue::new(store.clone(), signals.clone()));
        let reconciler = Reconciler::new(
            queue.clone(),
            Arc::new(ScriptedRemote::default()),
            signals.clone(),
            RetryPolicy::default(),
        );

        let mut stop = StopRecord::from_new(NewStop::new("3 Mill Ln", 1.0, 2.0), 1);
        stop.sync_status = SyncStatus::Pending;
        store.put_stop(&stop).await.unwrap();
        queue
            .enqueue_for(&stop.id, SyncOperationType::CreateStop, "/api/stops", HttpMethod::Post, json!({}))
            .await
            .unwrap();

        assert_eq!(
            reconciler.reconcile().await,
            ReconcileOutcome::Completed(SyncReport { succeeded: 1, ..SyncReport::default() })
        );
        assert_eq!(queue.count().await.unwrap(), 0);
        assert_eq!(signals.pending(), 0);
        let stored = store.get_stop(&stop.id).await.unwrap().unwrap();
        assert_eq!(stored.sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_conflict_removes_after_one_attempt() {
        let remote = Arc::new(ScriptedRemote::with(&[409]));
        let (reconciler, queue, _) = setup(remote.clone());
        enqueue_status(&queue, "s-1").await;

        let outcome = reconciler.reconcile().await;
        assert_eq!(
            outcome,
            ReconcileOutcome::Completed(SyncReport { succeeded: 1, ..SyncReport::default() })
        );
        assert_eq!(queue.count().await.unwrap(), 0);
        assert_eq!(remote.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_item_does_not_block_the_rest() {
        let remote = Arc::new(ScriptedRemote::with(&[500, 200]));
        let (reconciler, queue, signals) = setup(remote);
        let failing = enqueue_status(&queue, "s-1").await;
        enqueue_status(&queue, "s-2").await;

        let outcome = reconciler.reconcile().await;
        assert_eq!(
            outcome,
            ReconcileOutcome::Completed(SyncReport { succeeded: 1, failed: 1, ..SyncReport::default() })
        );

        let remaining = queue.dequeue_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, failing);
        assert_eq!(remaining[0].retry_count, 1);
        assert_eq!(remaining[0].last_error.as_deref(), Some("HTTP 500"));
        assert_eq!(signals.pending(), 1);
    }

    #[tokio::test]
    async fn test_dropped_on_third_failure() {
        let remote = Arc::new(ScriptedRemote::with(&[503, 503, 503]));
        let (reconciler, queue, _) = setup(remote);
        enqueue_status(&queue, "s-1").await;

        reconciler.reconcile().await;
        reconciler.reconcile().await;
        assert_eq!(queue.count().await.unwrap(), 1);

        let outcome = reconciler.reconcile().await;
        assert_eq!(
            outcome,
            ReconcileOutcome::Completed(SyncReport { failed: 1, dropped: 1, ..SyncReport::default() })
        );
        assert!(queue.dequeue_all().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_transient() {
        let (reconciler, queue, _) = setup(Arc::new(HangingRemote));
        let reconciler = reconciler.with_request_timeout(Duration::from_secs(5));
        let id = enqueue_status(&queue, "s-1").await;

        let outcome = reconciler.reconcile().await;
        assert_eq!(
            outcome,
            ReconcileOutcome::Completed(SyncReport { failed: 1, ..SyncReport::default() })
        );
        let item = queue.get(id).await.unwrap().unwrap();
        assert_eq!(item.retry_count, 1);
        assert!(item.last_error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_success_invalidates_cache() {
        let cache = Arc::new(QueryCache::default());
        let (reconciler, queue, _) = setup(Arc::new(ScriptedRemote::default()));
        let reconciler = reconciler.with_cache(cache.clone());
        cache.insert(QueryKey::Stats, "all", &1u32).await;
        enqueue_status(&queue, "s-1").await;

        reconciler.reconcile().await;

        assert!(cache.is_empty().await);
        assert_eq!(cache.generation(QueryKey::Earnings).await, 1);
    }

    #[tokio::test]
    async fn test_failures_keep_cache() {
        let cache = Arc::new(QueryCache::default());
        let (reconciler, queue, _) = setup(Arc::new(ScriptedRemote::with(&[502])));
        let reconciler = reconciler.with_cache(cache.clone());
        cache.insert(QueryKey::Stops, "it-1", &1u32).await;
        enqueue_status(&queue, "s-1").await;

        reconciler.reconcile().await;

        assert_eq!(cache.get::<u32>(QueryKey::Stops, "it-1").await, Some(1));
    }
}
