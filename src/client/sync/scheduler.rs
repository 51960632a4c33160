//! # Sync Scheduler
//!
//! Periodic safety net behind the event-driven triggers. While online, each
//! tick checks the pending count and asks for a pass when work remains and
//! none is running, so items left behind by failures or dropped triggers
//! are retried.

use crate::client::sync::network_monitor::SyncTrigger;
use crate::client::sync::sync_state::SyncSignals;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Synchronization scheduler
#[derive(Debug)]
pub struct SyncScheduler {
    interval: Duration,
    signals: Arc<SyncSignals>,
    triggers: mpsc::UnboundedSender<SyncTrigger>,
}

impl SyncScheduler {
    pub fn new(
        interval: Duration,
        signals: Arc<SyncSignals>,
        triggers: mpsc::UnboundedSender<SyncTrigger>,
    ) -> Self {
        Self {
            interval,
            signals,
            triggers,
        }
    }

    /// Check if a poll pass should be requested now
    pub fn should_sync(&self) -> bool {
        let state = self.signals.snapshot();
        state.is_online() && state.pending_operations > 0 && !state.is_syncing
    }

    /// Tick until the trigger channel closes
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if !self.should_sync() {
                continue;
            }
            tracing::debug!("{} operations pending, requesting sync", self.signals.pending());
            if self.triggers.send(SyncTrigger::Poll).is_err() {
                break;
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::sync::network_monitor::NetworkStatus;

    fn scheduler(status: NetworkStatus) -> (SyncScheduler, mpsc::UnboundedReceiver<SyncTrigger>, Arc<SyncSignals>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signals = Arc::new(SyncSignals::new(status));
        (SyncScheduler::new(Duration::from_secs(30), signals.clone(), tx), rx, signals)
    }

    #[test]
    fn test_should_sync_conditions() {
        let (scheduler, _rx, signals) = scheduler(NetworkStatus::Online);
        assert!(!scheduler.should_sync());

        signals.set_pending(2);
        assert!(scheduler.should_sync());

        signals.set_syncing(true);
        assert!(!scheduler.should_sync());

        signals.set_syncing(false);
        signals.set_network_status(NetworkStatus::Offline);
        assert!(!scheduler.should_sync());
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_every_interval_while_pending() {
        let (scheduler, mut rx, signals) = scheduler(NetworkStatus::Online);
        signals.set_pending(1);
        let handle = scheduler.spawn();

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(rx.try_recv().unwrap(), SyncTrigger::Poll);

        signals.set_pending(0);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_channel_closes() {
        let (scheduler, rx, signals) = scheduler(NetworkStatus::Online);
        signals.set_pending(1);
        drop(rx);

        let handle = scheduler.spawn();
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(handle.is_finished());
    }
}
