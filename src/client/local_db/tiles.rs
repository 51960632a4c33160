//! Offline map tile cache
//!
//! Tiles live in their own collection and are never visible to the sync
//! queue or the reconciliation engine.

use super::{Collection, LocalStore, Result};
use crate::shared::OfflineTile;

impl LocalStore {
    pub async fn put_tile(&self, tile: &OfflineTile) -> Result<()> {
        self.put_record(Collection::OfflineTiles, &tile.key(), tile)
            .await
    }

    pub async fn get_tile(&self, zoom: u8, x: u32, y: u32) -> Result<Option<OfflineTile>> {
        self.get_record(Collection::OfflineTiles, &OfflineTile::key_for(zoom, x, y))
            .await
    }

    /// Cached tiles belonging to a city
    pub async fn tiles_for_city(&self, city_id: &str) -> Result<Vec<OfflineTile>> {
        let mut tiles: Vec<OfflineTile> = self.get_all_records(Collection::OfflineTiles).await?;
        tiles.retain(|tile| tile.city_id == city_id);
        Ok(tiles)
    }

    /// Drop every tile of a city; returns how many were removed
    pub async fn evict_city_tiles(&self, city_id: &str) -> Result<usize> {
        let mut evicted = 0;
        for tile in self.tiles_for_city(city_id).await? {
            self.delete(Collection::OfflineTiles, &tile.key()).await?;
            evicted += 1;
        }

        tracing::debug!("Evicted {} tiles for city {}", evicted, city_id);
        Ok(evicted)
    }
}
