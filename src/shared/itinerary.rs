//! Itinerary records: one driver's route for one day.

use crate::shared::error::SharedError;
use crate::shared::sync_status::SyncStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItineraryStatus {
    #[default]
    Active,
    Completed,
}

/// A day's route as cached on the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryRecord {
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub name: String,
    #[serde(default)]
    pub status: ItineraryStatus,
    #[serde(default)]
    pub total_earnings: f64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sync_status: SyncStatus,
}

impl ItineraryRecord {
    pub fn from_new(new_itinerary: NewItinerary) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: new_itinerary.user_id,
            date: new_itinerary.date,
            name: new_itinerary.name.trim().to_string(),
            status: ItineraryStatus::Active,
            total_earnings: 0.0,
            created_at: Utc::now(),
            sync_status: SyncStatus::Pending,
        }
    }

    /// Body of `POST /api/itinerary`
    pub fn create_payload(&self) -> Value {
        json!({
            "userId": self.user_id,
            "date": self.date,
            "name": self.name,
            "status": self.status,
        })
    }
}

/// Input for creating an itinerary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItinerary {
    pub user_id: String,
    pub date: NaiveDate,
    pub name: String,
}

impl NewItinerary {
    pub fn validate(&self) -> Result<(), SharedError> {
        if self.user_id.trim().is_empty() {
            return Err(SharedError::validation("user_id", "Owner is required"));
        }
        if self.name.trim().is_empty() {
            return Err(SharedError::validation("name", "Name cannot be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_itinerary() -> NewItinerary {
        NewItinerary {
            user_id: "driver-7".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            name: " Monday north ".to_string(),
        }
    }

    #[test]
    fn test_from_new_is_pending_and_active() {
        let itinerary = ItineraryRecord::from_new(new_itinerary());
        assert_eq!(itinerary.sync_status, SyncStatus::Pending);
        assert_eq!(itinerary.status, ItineraryStatus::Active);
        assert_eq!(itinerary.name, "Monday north");
    }

    #[test]
    fn test_create_payload_uses_iso_date() {
        let itinerary = ItineraryRecord::from_new(new_itinerary());
        let payload = itinerary.create_payload();
        assert_eq!(payload["date"], "2026-10-19");
        assert_eq!(payload["status"], "active");
    }

    #[test]
    fn test_validation() {
        let mut input = new_itinerary();
        assert!(input.validate().is_ok());
        input.name = "  ".to_string();
        assert!(input.validate().is_err());
    }
}
