//! Derived delivery progress figures

use crate::shared::stop::{StopRecord, StopStatus};
use serde::{Deserialize, Serialize};

/// Progress summary over a set of stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStats {
    pub total: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Pending or current
    pub remaining: usize,
    pub packages_total: u32,
    pub packages_delivered: u32,
    /// Stops with local changes the server has not confirmed
    pub unsynced: usize,
}

impl DeliveryStats {
    pub fn from_stops(stops: &[StopRecord]) -> Self {
        stops.iter().fold(Self::default(), |mut stats, stop| {
            stats.total += 1;
            stats.packages_total += stop.package_count;
            match stop.status {
                StopStatus::Delivered => {
                    stats.delivered += 1;
                    stats.packages_delivered += stop.package_count;
                }
                StopStatus::Failed => stats.failed += 1,
                StopStatus::Pending | StopStatus::Current => stats.remaining += 1,
            }
            if stop.sync_status.is_pending() {
                stats.unsynced += 1;
            }
            stats
        })
    }
}
