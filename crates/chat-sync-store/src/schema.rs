//! Database schema definitions and column families.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Cache entries as JSON text, keyed by `chat:<chat_id>`.
    pub const ENTRIES: &str = "entries";

    /// Index: entries by last update, keyed by `updated_at (u64 BE) || chat_id`.
    pub const ENTRIES_BY_UPDATED: &str = "entries_by_updated";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::ENTRIES, cf::ENTRIES_BY_UPDATED]
}
