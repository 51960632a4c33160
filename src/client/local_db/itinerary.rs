//! Itinerary snapshot operations on the local store

use super::{Collection, LocalStore, Result};
use crate::shared::{ItineraryRecord, ItineraryStatus, SyncStatus};

impl LocalStore {
    pub async fn put_itinerary(&self, itinerary: &ItineraryRecord) -> Result<()> {
        self.put_record(Collection::Itinerary, &itinerary.id, itinerary)
            .await
    }

    pub async fn get_itinerary(&self, id: &str) -> Result<Option<ItineraryRecord>> {
        self.get_record(Collection::Itinerary, id).await
    }

    pub async fn all_itineraries(&self) -> Result<Vec<ItineraryRecord>> {
        self.get_all_records(Collection::Itinerary).await
    }

    /// The most recent active itinerary. More than one may be stored; the
    /// latest date wins, then the latest creation time.
    pub async fn current_itinerary(&self) -> Result<Option<ItineraryRecord>> {
        Ok(self
            .all_itineraries()
            .await?
            .into_iter()
            .filter(|itinerary| itinerary.status == ItineraryStatus::Active)
            .max_by(|a, b| {
                a.date
                    .cmp(&b.date)
                    .then_with(|| a.created_at.cmp(&b.created_at))
            }))
    }

    /// Removes only the itinerary; its stops stay
    pub async fn delete_itinerary(&self, id: &str) -> Result<()> {
        self.delete(Collection::Itinerary, id).await
    }

    pub async fn mark_itinerary_synced(&self, id: &str) -> Result<bool> {
        self.set_itinerary_sync_status(id, SyncStatus::Synced).await
    }

    pub async fn set_itinerary_sync_status(&self, id: &str, status: SyncStatus) -> Result<bool> {
        let Some(mut itinerary) = self.get_itinerary(id).await? else {
            return Ok(false);
        };
        if itinerary.sync_status != status {
            itinerary.sync_status = status;
            self.put_itinerary(&itinerary).await?;
        }
        Ok(true)
    }

    /// Move an itinerary to a server-assigned id, carrying its stops along
    pub async fn rekey_itinerary(&self, old_id: &str, new_id: &str) -> Result<bool> {
        let Some(mut itinerary) = self.get_itinerary(old_id).await? else {
            return Ok(false);
        };
        itinerary.id = new_id.to_string();
        self.put_itinerary(&itinerary).await?;
        self.delete_itinerary(old_id).await?;
        self.reassign_stops(old_id, new_id).await?;
        Ok(true)
    }
}
