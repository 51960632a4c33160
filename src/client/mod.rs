//! Client-side Synchronization Core
//!
//! Everything that runs on the courier's device: the durable local store,
//! the sync queue and its replay, connectivity tracking and the background
//! service that ties them together.
//!
//! # Architecture
//!
//! The client module is organized into focused submodules:
//!
//! - **`config`** - Configuration loading (server URL, token, store paths)
//! - **`local_db`** - Dual-backend local store (SQLite, key-value fallback)
//! - **`offline`** - Two-phase mutations, sync queue, reconciliation
//! - **`sync`** - Network monitor, scheduler, proxy messages, sync service
//! - **`remote`** - Remote API seam and its reqwest implementation
//! - **`query_cache`** - Read cache invalidated after confirmed writes
//! - **`notify`** - Completion notifications for reconciliation passes
//!
//! # Module Structure
//!
//! ```text
//! client/
//! ├── mod.rs          - Module exports and documentation
//! ├── config.rs       - Configuration management
//! ├── remote.rs       - Remote API client
//! ├── query_cache.rs  - Read cache
//! ├── notify.rs       - Sync notifications
//! ├── local_db/       - Local store and its backends
//! ├── offline/        - Offline mutations and queue replay
//! └── sync/           - Background sync service
//! ```

pub mod config;
pub mod local_db;
pub mod notify;
pub mod offline;
pub mod query_cache;
pub mod remote;
pub mod sync;

// Re-export commonly used types
pub use config::Config;
pub use local_db::{BackendKind, Collection, LocalStore, StoreConfig, StoreError};
pub use notify::{ChannelNotifier, LogNotifier, SyncNotifier};
pub use offline::{Delivery, Mutation, OfflineError, OfflineManager, SyncQueue, SyncReport};
pub use query_cache::{QueryCache, QueryKey};
pub use remote::{HttpRemote, RemoteApi, RemoteError, RemoteRequest, RemoteResponse};
pub use sync::{SyncHandle, SyncService, SyncState};
