//! Delivery stop records
//!
//! A stop is one address on a driver's route. The remote API speaks
//! camelCase JSON; `sync_status` never leaves the device and defaults to
//! `synced` when a record is decoded from a server response.

use crate::shared::error::SharedError;
use crate::shared::sync_status::SyncStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use uuid::Uuid;

/// Delivery progress of a stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopStatus {
    #[default]
    Pending,
    Current,
    Delivered,
    Failed,
}

impl StopStatus {
    /// `delivered` and `failed` have no outgoing transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, StopStatus::Delivered | StopStatus::Failed)
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(self, next: StopStatus) -> bool {
        use StopStatus::*;
        matches!(
            (self, next),
            (Pending, Current) | (Pending, Delivered) | (Pending, Failed)
                | (Current, Delivered)
                | (Current, Failed)
        )
    }
}

impl fmt::Display for StopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StopStatus::Pending => "pending",
            StopStatus::Current => "current",
            StopStatus::Delivered => "delivered",
            StopStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A delivery stop as cached on the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRecord {
    pub id: String,
    #[serde(default)]
    pub itinerary_id: Option<String>,
    pub address_full: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Position in the itinerary's delivery order, starting at 1
    #[serde(default)]
    pub sequence: u32,
    #[serde(default)]
    pub status: StopStatus,
    #[serde(default)]
    pub package_count: u32,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sync_status: SyncStatus,
}

impl StopRecord {
    /// Build a locally created stop awaiting remote confirmation
    pub fn from_new(new_stop: NewStop, sequence: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            itinerary_id: new_stop.itinerary_id,
            address_full: new_stop.address_full.trim().to_string(),
            latitude: new_stop.latitude,
            longitude: new_stop.longitude,
            sequence,
            status: StopStatus::Pending,
            package_count: new_stop.package_count,
            delivered_at: None,
            created_at: Utc::now(),
            sync_status: SyncStatus::Pending,
        }
    }

    /// Body of `POST /api/stops`
    pub fn create_payload(&self) -> Value {
        json!({
            "addressFull": self.address_full,
            "latitude": self.latitude,
            "longitude": self.longitude,
        })
    }

    /// Move to `next`, stamping the delivery time on completion.
    ///
    /// Returns `Ok(false)` when the stop already has that status.
    pub fn transition(&mut self, next: StopStatus) -> Result<bool, SharedError> {
        if self.status == next {
            return Ok(false);
        }
        if !self.status.can_transition_to(next) {
            return Err(SharedError::invalid_transition(self.status, next));
        }
        self.status = next;
        if next == StopStatus::Delivered {
            self.delivered_at = Some(Utc::now());
        }
        Ok(true)
    }
}

/// Input for creating a stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStop {
    pub itinerary_id: Option<String>,
    pub address_full: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub package_count: u32,
}

impl NewStop {
    pub fn new(address_full: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            itinerary_id: None,
            address_full: address_full.into(),
            latitude,
            longitude,
            package_count: 1,
        }
    }

    pub fn in_itinerary(mut self, itinerary_id: impl Into<String>) -> Self {
        self.itinerary_id = Some(itinerary_id.into());
        self
    }

    pub fn with_packages(mut self, package_count: u32) -> Self {
        self.package_count = package_count;
        self
    }

    pub fn validate(&self) -> Result<(), SharedError> {
        if self.address_full.trim().is_empty() {
            return Err(SharedError::validation("address_full", "Address cannot be empty"));
        }
        validate_coordinates(self.latitude, self.longitude)
    }
}

/// Partial update of a stop's editable fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_full: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_count: Option<u32>,
}

impl StopPatch {
    pub fn is_empty(&self) -> bool {
        self.address_full.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.package_count.is_none()
    }

    /// Validate the patch against the stop it will be applied to
    pub fn validate(&self, stop: &StopRecord) -> Result<(), SharedError> {
        if let Some(address) = &self.address_full {
            if address.trim().is_empty() {
                return Err(SharedError::validation("address_full", "Address cannot be empty"));
            }
        }
        validate_coordinates(
            self.latitude.unwrap_or(stop.latitude),
            self.longitude.unwrap_or(stop.longitude),
        )
    }

    pub fn apply(&self, stop: &mut StopRecord) {
        if let Some(address) = &self.address_full {
            stop.address_full = address.trim().to_string();
        }
        if let Some(latitude) = self.latitude {
            stop.latitude = latitude;
        }
        if let Some(longitude) = self.longitude {
            stop.longitude = longitude;
        }
        if let Some(count) = self.package_count {
            stop.package_count = count;
        }
    }
}

fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), SharedError> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(SharedError::validation("latitude", "must be within [-90, 90]"));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(SharedError::validation("longitude", "must be within [-180, 180]"));
    }
    Ok(())
}
