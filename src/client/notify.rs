//! Sync outcome notifications
//!
//! The only user-facing signal of a reconciliation pass is one summary of
//! its counts; per-item errors stay in the logs.

use crate::client::offline::reconciliation::SyncReport;
use async_trait::async_trait;
use std::fmt;
use tokio::sync::broadcast;

/// Receives the aggregate outcome of each reconciliation pass that
/// processed at least one item
#[async_trait]
pub trait SyncNotifier: Send + Sync + fmt::Debug {
    async fn notify(&self, report: &SyncReport);
}

/// Writes the summary to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl SyncNotifier for LogNotifier {
    async fn notify(&self, report: &SyncReport) {
        if report.failed > 0 || report.rejected > 0 {
            tracing::warn!(
                succeeded = report.succeeded,
                failed = report.failed,
                dropped = report.dropped,
                rejected = report.rejected,
                "Sync finished with failures"
            );
        } else {
            tracing::info!(succeeded = report.succeeded, "Sync finished");
        }
    }
}

/// Fans summaries out to UI subscribers, e.g. a toast
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: broadcast::Sender<SyncReport>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncReport> {
        self.tx.subscribe()
    }
}

impl Default for ChannelNotifier {
    fn default() -> Self {
        Self::new(16)
    }
}

#[async_trait]
impl SyncNotifier for ChannelNotifier {
    async fn notify(&self, report: &SyncReport) {
        // No subscribers is fine
        let _ = self.tx.send(*report);
    }
}
