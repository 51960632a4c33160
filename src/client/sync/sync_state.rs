//! # Sync State Management
//!
//! The observable state of the synchronization core, published on a
//! `tokio::sync::watch` channel so any number of UI observers can follow it.
//!
//! ## Features
//!
//! - **Network Status**: the online/offline flag the monitor maintains
//! - **In-flight Flag**: whether a reconciliation pass is running
//! - **Pending Count**: un-removed sync queue items across both stores
//! - **Last Outcome**: the aggregate report of the most recent pass

use crate::client::offline::reconciliation::SyncReport;
use crate::client::sync::network_monitor::NetworkStatus;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

/// Snapshot of the sync core as seen by the UI
#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    pub network_status: NetworkStatus,
    pub is_syncing: bool,
    pub pending_operations: usize,
    /// Completion time of the last pass that processed items
    pub last_sync: Option<DateTime<Utc>>,
    pub last_report: Option<SyncReport>,
}

impl SyncState {
    pub fn is_online(&self) -> bool {
        self.network_status.is_online()
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            network_status: NetworkStatus::Offline,
            is_syncing: false,
            pending_operations: 0,
            last_sync: None,
            last_report: None,
        }
    }
}

/// Writer side of the sync state, shared by every component that changes it
#[derive(Debug)]
pub struct SyncSignals {
    tx: watch::Sender<SyncState>,
}

impl SyncSignals {
    pub fn new(network_status: NetworkStatus) -> Self {
        let (tx, _) = watch::channel(SyncState {
            network_status,
            ..SyncState::default()
        });
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> SyncState {
        self.tx.borrow().clone()
    }

    pub fn is_online(&self) -> bool {
        self.tx.borrow().is_online()
    }

    /// Returns `true` when the status actually changed
    pub fn set_network_status(&self, status: NetworkStatus) -> bool {
        self.tx.send_if_modified(|state| {
            if state.network_status == status {
                return false;
            }
            state.network_status = status;
            true
        })
    }

    pub fn set_syncing(&self, syncing: bool) {
        self.tx.send_if_modified(|state| {
            let changed = state.is_syncing != syncing;
            state.is_syncing = syncing;
            changed
        });
    }

    pub fn set_pending(&self, pending: usize) {
        self.tx.send_if_modified(|state| {
            let changed = state.pending_operations != pending;
            state.pending_operations = pending;
            changed
        });
    }

    pub fn pending(&self) -> usize {
        self.tx.borrow().pending_operations
    }

    /// Store the outcome of a pass that processed at least one item
    pub fn record_report(&self, report: SyncReport) {
        self.tx.send_modify(|state| {
            state.last_sync = Some(Utc::now());
            state.last_report = Some(report);
        });
    }
}

impl Default for SyncSignals {
    fn default() -> Self {
        Self::new(NetworkStatus::Offline)
    }
}
