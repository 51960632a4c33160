//! Messages from the asset/API cache proxy
//!
//! The proxy posts a single message type, `SYNC_REQUESTED`, when its own
//! background-sync trigger fires. It arrives either as a JSON object tagged
//! by `type` or as the bare type name; anything else is ignored.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProxyMessage {
    SyncRequested,
}

impl ProxyMessage {
    /// Wire name of the message type
    pub fn type_name(self) -> &'static str {
        match self {
            Self::SyncRequested => "SYNC_REQUESTED",
        }
    }

    /// Parse a raw channel message; unknown or malformed input yields `None`
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();

        if let Ok(message) = serde_json::from_str::<ProxyMessage>(raw) {
            return Some(message);
        }

        let name = serde_json::from_str::<String>(raw).unwrap_or_else(|_| raw.to_string());
        match name.as_str() {
            "SYNC_REQUESTED" => Some(Self::SyncRequested),
            _ => {
                tracing::debug!("Ignoring unrecognised proxy message: {}", raw);
                None
            }
        }
    }
}
