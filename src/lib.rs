//! Route Sync - Main Library
//!
//! Route Sync is the offline-first synchronization core of a delivery-route
//! planner. Couriers keep editing stops and itineraries with no connection;
//! every change is stored locally first and replayed to the server once the
//! device is back online.
//!
//! # Overview
//!
//! This library provides:
//! - A durable local store with an embedded SQLite primary and a key-value
//!   fallback, so writes are never lost when the database is unavailable
//! - A persistent sync queue of pending mutations, replayed in creation order
//! - Network state tracking with a settle delay before reconnect syncs
//! - A reconciliation engine that classifies server responses and retries
//!   transient failures a bounded number of times
//! - The `SYNC_REQUESTED` message contract with the asset/API cache proxy
//!
//! # Module Structure
//!
//! - **`shared`** - Records, configuration and errors every layer agrees on
//!   - Stops, itineraries, offline tiles, sync status
//!   - Validated configuration loadable from TOML
//!
//! - **`client`** - The device-side runtime
//!   - Local store, sync queue, reconciliation
//!   - Network monitor, scheduler, background sync service
//!   - Remote API client
//!
//! # Usage
//!
//! ```rust,no_run
//! use route_sync::client::sync::{HttpProbe, SyncService};
//! use route_sync::client::{Config, HttpRemote, LocalStore};
//! use route_sync::shared::NewStop;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(None)?;
//! let store = Arc::new(LocalStore::new(config.store_config()));
//! let remote = Arc::new(HttpRemote::new(config.clone())?);
//!
//! let mut service = SyncService::new(config.app(), store, remote);
//! service.start(&HttpProbe::new(config.server_url())).await;
//!
//! let stop = service
//!     .manager()
//!     .create_stop(NewStop::new("12 High St", 51.5, -0.12))
//!     .await?;
//! println!("{:?}", stop.delivery);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! - `shared::SharedError` for invalid records and state transitions
//! - `client::StoreError` for storage failures
//! - `client::OfflineError` for mutations, wrapping both of the above
//! - `client::RemoteError` for transport failures; HTTP statuses are data

/// Shared types and data structures
pub mod shared;

/// Device-side synchronization runtime
pub mod client;
