//! Stop snapshot operations on the local store

use super::{Collection, LocalStore, Result};
use crate::shared::{StopRecord, SyncStatus};

impl LocalStore {
    /// Save or overwrite a stop snapshot
    pub async fn put_stop(&self, stop: &StopRecord) -> Result<()> {
        self.put_record(Collection::Stops, &stop.id, stop).await
    }

    pub async fn get_stop(&self, id: &str) -> Result<Option<StopRecord>> {
        self.get_record(Collection::Stops, id).await
    }

    /// Stops of one itinerary (or all stops for `None`), in delivery order
    pub async fn stops_for_itinerary(&self, itinerary_id: Option<&str>) -> Result<Vec<StopRecord>> {
        let mut stops: Vec<StopRecord> = self.get_all_records(Collection::Stops).await?;

        if let Some(itinerary_id) = itinerary_id {
            stops.retain(|stop| stop.itinerary_id.as_deref() == Some(itinerary_id));
        }
        stops.sort_by(|a, b| {
            a.sequence
                .cmp(&b.sequence)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        Ok(stops)
    }

    /// Next free sequence position in an itinerary; positions start at 1
    pub async fn next_sequence(&self, itinerary_id: Option<&str>) -> Result<u32> {
        Ok(self
            .stops_for_itinerary(itinerary_id)
            .await?
            .iter()
            .map(|stop| stop.sequence + 1)
            .max()
            .unwrap_or(1))
    }

    pub async fn delete_stop(&self, id: &str) -> Result<()> {
        self.delete(Collection::Stops, id).await
    }

    /// Record remote confirmation; returns `false` when the stop is absent
    pub async fn mark_stop_synced(&self, id: &str) -> Result<bool> {
        self.set_stop_sync_status(id, SyncStatus::Synced).await
    }

    /// Set a stop's sync marker; returns `false` when the stop is absent
    pub async fn set_stop_sync_status(&self, id: &str, status: SyncStatus) -> Result<bool> {
        let Some(mut stop) = self.get_stop(id).await? else {
            return Ok(false);
        };
        if stop.sync_status != status {
            stop.sync_status = status;
            self.put_stop(&stop).await?;
        }
        Ok(true)
    }

    /// Replace the snapshot stored under `old_id` by one keyed by `new_id`
    pub async fn rekey_stop(&self, old_id: &str, new_id: &str) -> Result<bool> {
        let Some(mut stop) = self.get_stop(old_id).await? else {
            return Ok(false);
        };
        stop.id = new_id.to_string();
        self.put_stop(&stop).await?;
        self.delete_stop(old_id).await?;
        Ok(true)
    }

    /// Point stops of `old_id` at the itinerary `new_id`
    pub async fn reassign_stops(&self, old_id: &str, new_id: &str) -> Result<usize> {
        let mut moved = 0;
        for mut stop in self.stops_for_itinerary(Some(old_id)).await? {
            stop.itinerary_id = Some(new_id.to_string());
            self.put_stop(&stop).await?;
            moved += 1;
        }
        Ok(moved)
    }
}
