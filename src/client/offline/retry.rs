//! # Retry Policy
//!
//! Decides what a replayed mutation's response means for its queue item.
//!
//! ## Features
//!
//! - **Classification**: success, already-applied conflict, rejection, or transient
//! - **Max Retries**: an item is dropped on its final tolerated failure so one
//!   dead request never blocks the rest of the queue
//!
//! There is no backoff between attempts: the periodic poll and reconnect
//! triggers space retries out.

use crate::shared::{AppConfig, BadRequestPolicy};

/// Meaning of a remote response for the queue item that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayVerdict {
    /// 2xx: applied now
    Applied,
    /// Conflict status: the server already reflects the intended state
    AlreadyApplied,
    /// The server will never accept this mutation
    Rejected,
    /// Try again later
    Transient,
}

impl ReplayVerdict {
    /// Whether the item leaves the queue
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Transient)
    }

    /// Whether the server now holds the intended state
    pub fn is_success(self) -> bool {
        matches!(self, Self::Applied | Self::AlreadyApplied)
    }
}

/// What to do with an item after a transient failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Keep it queued with the given retry count
    Retry { attempts: u32 },
    /// Retries exhausted; remove it
    Drop { attempts: u32 },
}

/// Retry policy for queued mutations
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Consecutive transient failures tolerated per item
    pub max_retries: u32,
    /// Statuses meaning "already applied"
    pub conflict_statuses: Vec<u16>,
    /// Treatment of HTTP 400
    pub bad_request_policy: BadRequestPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            conflict_statuses: config.conflict_statuses.clone(),
            bad_request_policy: config.bad_request_policy,
        }
    }

    /// Classify an HTTP status
    pub fn classify(&self, status: u16) -> ReplayVerdict {
        if (200..300).contains(&status) {
            return ReplayVerdict::Applied;
        }
        if status == 400 && self.bad_request_policy == BadRequestPolicy::Rejected {
            return ReplayVerdict::Rejected;
        }
        if self.conflict_statuses.contains(&status) {
            return ReplayVerdict::AlreadyApplied;
        }
        ReplayVerdict::Transient
    }

    /// Decide the fate of an item that has failed `retry_count` times before
    /// and has just failed again
    pub fn after_failure(&self, retry_count: u32) -> RetryDecision {
        let attempts = retry_count.saturating_add(1);
        if attempts >= self.max_retries {
            RetryDecision::Drop { attempts }
        } else {
            RetryDecision::Retry { attempts }
        }
    }
}
