//! Shared Module
//!
//! This module contains the record types and configuration that every part of
//! the synchronization core agrees on. Records serialize to the same camelCase
//! JSON the remote API speaks, plus the local-only `syncStatus` marker.
//!
//! # Overview
//!
//! - **Records**: stops, itineraries and offline map tiles
//! - **Sync status**: the local marker of remote confirmation
//! - **Configuration**: validated settings, loadable from TOML
//! - **Errors**: record-level failures shared by every layer

/// Delivery stop records
pub mod stop;

/// Itinerary records
pub mod itinerary;

/// Offline map tiles
pub mod tile;

/// Derived delivery figures
pub mod stats;

/// Local-only sync marker
pub mod sync_status;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use config::{AppConfig, AppConfigBuilder, BadRequestPolicy, ConfigError};
pub use error::SharedError;
pub use itinerary::{ItineraryRecord, ItineraryStatus, NewItinerary};
pub use stats::DeliveryStats;
pub use stop::{NewStop, StopPatch, StopRecord, StopStatus};
pub use sync_status::SyncStatus;
pub use tile::OfflineTile;
