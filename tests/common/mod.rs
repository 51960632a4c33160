//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - A scripted remote API that records what it was sent
//! - Store backends that fail on demand
//! - Harnesses wiring a queue, reconciler and manager together
//! - Custom assertion macros
#![allow(dead_code)]

#[macro_use]
pub mod assertions;
pub mod fixtures;
pub mod mock_remote;

// Re-export commonly used utilities
pub use fixtures::*;
pub use mock_remote::*;
