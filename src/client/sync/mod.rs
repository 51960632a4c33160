//! # Background Sync Service
//!
//! Wires the local store, sync queue, remote API, reconciliation engine,
//! network monitor and scheduler into one running service.
//!
//! ## Architecture
//!
//! The sync service coordinates multiple components:
//! - **Network Monitor**: online/offline flag, settle-delayed reconnect triggers
//! - **Scheduler**: periodic poll while online with pending work
//! - **Message Listener**: `SYNC_REQUESTED` messages from the cache proxy
//! - **Dispatcher**: turns every trigger into a reconciliation attempt; the
//!   engine's lock drops attempts that overlap a running pass
//! - **Sync State**: watch channel the UI subscribes to
//!
//! ## Usage
//!
//! ```rust,no_run
//! use route_sync::client::sync::network_monitor::{NetworkStatus, StaticProbe};
//! use route_sync::client::sync::SyncService;
//! # use std::sync::Arc;
//!
//! # async fn example(config: route_sync::shared::AppConfig,
//! #     store: Arc<route_sync::client::local_db::LocalStore>,
//! #     remote: Arc<dyn route_sync::client::remote::RemoteApi>) {
//! let mut service = SyncService::new(&config, store, remote);
//! service.start(&StaticProbe(NetworkStatus::Online)).await;
//!
//! let handle = service.handle();
//! handle.set_online(false);
//! handle.post_message(r#"{"type":"SYNC_REQUESTED"}"#);
//!
//! service.stop().await;
//! # }
//! ```

pub mod messages;
pub mod network_monitor;
pub mod scheduler;
pub mod sync_state;

pub use messages::ProxyMessage;
pub use network_monitor::{ConnectivityProbe, HttpProbe, NetworkMonitor, NetworkStatus, StaticProbe, SyncTrigger};
pub use scheduler::SyncScheduler;
pub use sync_state::{SyncSignals, SyncState};

use crate::client::local_db::{BackendKind, LocalStore};
use crate::client::notify::{LogNotifier, SyncNotifier};
use crate::client::offline::{OfflineManager, Reconciler, RetryPolicy, SyncQueue};
use crate::client::query_cache::QueryCache;
use crate::client::remote::RemoteApi;
use crate::shared::AppConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};

/// Main sync service coordinator
#[derive(Debug)]
pub struct SyncService {
    store: Arc<LocalStore>,
    queue: Arc<SyncQueue>,
    reconciler: Arc<Reconciler>,
    manager: Arc<OfflineManager>,
    monitor: Arc<NetworkMonitor>,
    signals: Arc<SyncSignals>,
    poll_interval: Duration,
    trigger_tx: mpsc::UnboundedSender<SyncTrigger>,
    trigger_rx: Option<mpsc::UnboundedReceiver<SyncTrigger>>,
    message_tx: mpsc::UnboundedSender<String>,
    message_rx: Option<mpsc::UnboundedReceiver<String>>,
    /// Background task handles
    tasks: Vec<JoinHandle<()>>,
}

impl SyncService {
    pub fn new(config: &AppConfig, store: Arc<LocalStore>, remote: Arc<dyn RemoteApi>) -> Self {
        Self::with_notifier(config, store, remote, Arc::new(LogNotifier))
    }

    pub fn with_notifier(
        config: &AppConfig,
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteApi>,
        notifier: Arc<dyn SyncNotifier>,
    ) -> Self {
        let signals = Arc::new(SyncSignals::default());
        let cache = Arc::new(QueryCache::default());
        let policy = RetryPolicy::from_config(config);
        let queue = Arc::new(SyncQueue::new(store.clone(), signals.clone()));

        let reconciler = Reconciler::new(queue.clone(), remote.clone(), signals.clone(), policy.clone())
            .with_request_timeout(config.request_timeout)
            .with_cache(cache.clone())
            .with_notifier(notifier);
        let manager = OfflineManager::new(queue.clone(), remote, signals.clone(), policy)
            .with_request_timeout(config.request_timeout)
            .with_cache(cache);

        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let monitor = NetworkMonitor::new(signals.clone(), config.settle_delay, trigger_tx.clone());

        Self {
            store,
            queue,
            reconciler: Arc::new(reconciler),
            manager: Arc::new(manager),
            monitor: Arc::new(monitor),
            signals,
            poll_interval: config.poll_interval,
            trigger_tx,
            trigger_rx: Some(trigger_rx),
            message_tx,
            message_rx: Some(message_rx),
            tasks: Vec::new(),
        }
    }

    /// Open the store, take the startup connectivity state and spawn the
    /// background tasks. Calling it again has no effect.
    pub async fn start(&mut self, probe: &dyn ConnectivityProbe) -> BackendKind {
        let backend = self.store.init().await;

        let (Some(trigger_rx), Some(message_rx)) = (self.trigger_rx.take(), self.message_rx.take()) else {
            tracing::debug!("Sync service already started");
            return backend;
        };

        let pending = match self.queue.refresh_pending_count().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!("Cannot count pending operations: {}", e);
                0
            }
        };
        let status = self.monitor.initialize(probe).await;

        self.tasks.push(tokio::spawn(dispatch(self.reconciler.clone(), trigger_rx)));
        self.tasks.push(
            SyncScheduler::new(self.poll_interval, self.signals.clone(), self.trigger_tx.clone()).spawn(),
        );
        self.tasks.push(tokio::spawn(listen(self.monitor.clone(), message_rx)));

        tracing::info!(
            backend = ?backend,
            pending,
            status = %status,
            "Sync service started"
        );

        if status.is_online() && pending > 0 {
            self.monitor.request(SyncTrigger::Startup);
        }
        backend
    }

    /// Abort the background tasks, including any running pass
    pub async fn stop(&mut self) {
        self.monitor.cancel_pending();
        for task in &self.tasks {
            task.abort();
        }
        futures_util::future::join_all(self.tasks.drain(..)).await;
        tracing::info!("Sync service stopped");
    }

    pub fn handle(&self) -> SyncHandle {
        SyncHandle {
            signals: self.signals.clone(),
            monitor: self.monitor.clone(),
            messages: self.message_tx.clone(),
        }
    }

    pub fn manager(&self) -> Arc<OfflineManager> {
        self.manager.clone()
    }

    pub fn reconciler(&self) -> Arc<Reconciler> {
        self.reconciler.clone()
    }

    pub fn queue(&self) -> Arc<SyncQueue> {
        self.queue.clone()
    }

    pub fn store(&self) -> Arc<LocalStore> {
        self.store.clone()
    }

    /// Get current sync status
    pub fn state(&self) -> SyncState {
        self.signals.snapshot()
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Start a pass per trigger; passes that overlap a running one return at once
async fn dispatch(reconciler: Arc<Reconciler>, mut triggers: mpsc::UnboundedReceiver<SyncTrigger>) {
    let mut passes = JoinSet::new();

    while let Some(trigger) = triggers.recv().await {
        while passes.try_join_next().is_some() {}

        tracing::debug!("Sync trigger: {:?}", trigger);
        let reconciler = reconciler.clone();
        passes.spawn(async move {
            let outcome = reconciler.reconcile().await;
            tracing::debug!("Pass for {:?} ended: {:?}", trigger, outcome);
        });
    }
}

/// Feed raw proxy messages to the monitor
async fn listen(monitor: Arc<NetworkMonitor>, mut messages: mpsc::UnboundedReceiver<String>) {
    while let Some(raw) = messages.recv().await {
        if let Some(message) = ProxyMessage::parse(&raw) {
            monitor.handle_message(message);
        }
    }
}

/// Cloneable control surface for UI code
#[derive(Debug, Clone)]
pub struct SyncHandle {
    signals: Arc<SyncSignals>,
    monitor: Arc<NetworkMonitor>,
    messages: mpsc::UnboundedSender<String>,
}

impl SyncHandle {
    /// Report a platform connectivity change
    pub fn set_online(&self, online: bool) {
        self.monitor.set_online(online);
    }

    /// Deliver a raw message from the cache proxy's channel
    pub fn post_message(&self, raw: impl Into<String>) -> bool {
        self.messages.send(raw.into()).is_ok()
    }

    /// Ask for a pass now; it is skipped if offline or one is running
    pub fn force_sync(&self) -> bool {
        self.monitor.request(SyncTrigger::Manual)
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.signals.subscribe()
    }

    pub fn state(&self) -> SyncState {
        self.signals.snapshot()
    }
}
