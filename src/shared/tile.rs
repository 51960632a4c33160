//! Cached map tiles for offline route display.
//!
//! Tiles share the local store with the sync-relevant collections but have
//! their own lifecycle: downloaded and evicted per city.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineTile {
    pub city_id: String,
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
    pub data: Vec<u8>,
    pub downloaded_at: DateTime<Utc>,
}

impl OfflineTile {
    pub fn new(city_id: impl Into<String>, zoom: u8, x: u32, y: u32, data: Vec<u8>) -> Self {
        Self {
            city_id: city_id.into(),
            zoom,
            x,
            y,
            data,
            downloaded_at: Utc::now(),
        }
    }

    /// Store key, `zoom/x/y`
    pub fn key(&self) -> String {
        Self::key_for(self.zoom, self.x, self.y)
    }

    pub fn key_for(zoom: u8, x: u32, y: u32) -> String {
        format!("{}/{}/{}", zoom, x, y)
    }
}
