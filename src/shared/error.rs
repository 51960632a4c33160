//! Shared Error Types
//!
//! This module defines error types that describe invalid data or invalid
//! requests against the delivery records, independent of where they are
//! stored or how they reach the server.
//!
//! # Error Categories
//!
//! - `SerializationError` - JSON serialization/deserialization failures
//! - `ValidationError` - Data validation failures
//! - `InvalidTransition` - A stop status change that the lifecycle forbids
//! - `NotFound` - A referenced record does not exist locally
//!
//! # Usage
//!
//! ```rust
//! use route_sync::shared::error::SharedError;
//!
//! let error = SharedError::validation("address_full", "Address cannot be empty");
//! assert!(error.to_string().contains("address_full"));
//! ```
use thiserror::Error;

/// Shared error types for record-level failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SharedError {
    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Human-readable error message
        message: String,
    },

    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// Stop status change outside the delivery lifecycle
    #[error("Invalid status transition from '{from}' to '{to}'")]
    InvalidTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// Record missing from the local store
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Record family, e.g. "stop"
        entity: &'static str,
        /// Requested key
        id: String,
    },
}

impl SharedError {
    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid transition error
    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Create a new not-found error
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}
