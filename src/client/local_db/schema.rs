//! Database Schema Definitions
//!
//! Migrations for the SQLite backend. Every collection is a plain
//! key/JSON table; records are opaque to SQL and decoded by the typed
//! helpers in the sibling modules.

use super::Collection;

/// Current database schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Ordered migrations: `(version, statements)`
pub const MIGRATIONS: &[(i32, &[&str])] = &[(
    1,
    &[
        "CREATE TABLE IF NOT EXISTS stops (
            key TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS itinerary (
            key TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS sync_queue (
            key TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS offline_tiles (
            key TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ],
)];

/// Check if database needs migration
pub fn needs_migration(current_version: i32) -> bool {
    current_version < CURRENT_SCHEMA_VERSION
}

/// Migrations newer than `current_version`, oldest first
pub fn pending_migrations(current_version: i32) -> impl Iterator<Item = &'static (i32, &'static [&'static str])> {
    MIGRATIONS
        .iter()
        .filter(move |(version, _)| *version > current_version)
}

/// Table holding a collection
pub fn table_for(collection: Collection) -> &'static str {
    collection.name()
}
