//! # Network Monitor
//!
//! Maintains the online/offline flag and turns connectivity changes into
//! reconciliation triggers.
//!
//! ## Features
//!
//! - **Connectivity Detection**: startup state from a [`ConnectivityProbe`]
//! - **Immediate Offline**: going offline is published at once
//! - **Settled Online**: the reconnect trigger fires only after the settle
//!   delay, and a flap during the delay restarts it
//! - **External Requests**: proxy `SYNC_REQUESTED` messages and manual syncs
//!   feed the same trigger channel

use crate::client::sync::messages::ProxyMessage;
use crate::client::sync::sync_state::SyncSignals;
use async_trait::async_trait;
use reqwest::Client;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    Offline,
}

impl NetworkStatus {
    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }

    pub fn from_online(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

impl fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::Offline => f.write_str("offline"),
        }
    }
}

/// Why a reconciliation pass was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// Service started while online with pending work
    Startup,
    /// Settle delay elapsed after going online
    Reconnected,
    /// Periodic check found pending work
    Poll,
    /// The cache proxy asked for a sync
    SyncRequested,
    /// The user asked for a sync
    Manual,
}

/// Source of the startup connectivity indicator
#[async_trait]
pub trait ConnectivityProbe: Send + Sync + fmt::Debug {
    async fn probe(&self) -> NetworkStatus;
}

/// Reports a fixed status
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub NetworkStatus);

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn probe(&self) -> NetworkStatus {
        self.0
    }
}

/// Online when the server answers a HEAD request at all
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    url: String,
}

impl HttpProbe {
    pub fn new(server_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: server_url.into(),
        }
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn probe(&self) -> NetworkStatus {
        match self.client.head(&self.url).send().await {
            Ok(_) => NetworkStatus::Online,
            Err(e) => {
                tracing::debug!("Connectivity probe to {} failed: {}", self.url, e);
                NetworkStatus::Offline
            }
        }
    }
}

/// Network monitor
#[derive(Debug)]
pub struct NetworkMonitor {
    signals: Arc<SyncSignals>,
    triggers: mpsc::UnboundedSender<SyncTrigger>,
    settle_delay: Duration,
    /// Bumped on every transition; a settle timer only fires if it still matches
    generation: Arc<AtomicU64>,
}

impl NetworkMonitor {
    pub fn new(
        signals: Arc<SyncSignals>,
        settle_delay: Duration,
        triggers: mpsc::UnboundedSender<SyncTrigger>,
    ) -> Self {
        Self {
            signals,
            triggers,
            settle_delay,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Take the startup state from the platform indicator, without
    /// triggering anything
    pub async fn initialize(&self, probe: &dyn ConnectivityProbe) -> NetworkStatus {
        let status = probe.probe().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.signals.set_network_status(status);
        tracing::info!("Initial network status: {}", status);
        status
    }

    pub fn status(&self) -> NetworkStatus {
        self.signals.snapshot().network_status
    }

    /// Report a connectivity change. Must be called within a tokio runtime.
    pub fn set_online(&self, online: bool) {
        let status = NetworkStatus::from_online(online);
        if !self.signals.set_network_status(status) {
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        match status {
            NetworkStatus::Offline => tracing::info!("Network offline"),
            NetworkStatus::Online => {
                tracing::info!("Network online, syncing in {:?}", self.settle_delay);

                let current = self.generation.clone();
                let signals = self.signals.clone();
                let triggers = self.triggers.clone();
                let delay = self.settle_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if current.load(Ordering::SeqCst) == generation && signals.is_online() {
                        let _ = triggers.send(SyncTrigger::Reconnected);
                    }
                });
            }
        }
    }

    /// React to a message from the cache proxy
    pub fn handle_message(&self, message: ProxyMessage) {
        match message {
            ProxyMessage::SyncRequested => {
                tracing::debug!("Cache proxy requested a sync");
                self.request(SyncTrigger::SyncRequested);
            }
        }
    }

    /// Send a trigger; returns `false` once the service has stopped
    pub fn request(&self, trigger: SyncTrigger) -> bool {
        self.triggers.send(trigger).is_ok()
    }

    /// Invalidate any pending settle timer
    pub fn cancel_pending(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}
