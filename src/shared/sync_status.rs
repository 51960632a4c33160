//! Local-only synchronization marker carried by every cached record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether the remote side is known to reflect a local record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Confirmed by the server
    #[default]
    Synced,
    /// Applied locally, remote confirmation outstanding
    Pending,
}

impl SyncStatus {
    pub fn is_pending(self) -> bool {
        self == SyncStatus::Pending
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Synced => f.write_str("synced"),
            SyncStatus::Pending => f.write_str("pending"),
        }
    }
}
