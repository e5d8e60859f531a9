//! Durable local cache for chat-sync.
//!
//! The cache keeps one denormalized entry per chat so a chat view can render
//! before any network round-trip, and so a turn that was interrupted before
//! it was persisted remotely can be resumed.
//!
//! # Architecture
//!
//! Backends implement [`CacheStore`]. [`RocksCache`] uses these column families:
//!
//! - `entries`: cache entries as JSON text, keyed by `chat:<chat_id>`
//! - `entries_by_updated`: index ordering entries by last write, used for eviction
//!
//! [`MemoryCache`] keeps entries in process. Application code goes through
//! [`DurableCache`], which merges, stamps and bounds entries and never
//! surfaces backend errors.
//!
//! # Example
//!
//! ```no_run
//! use chat_sync_core::{ChatId, Message};
//! use chat_sync_store::{CacheConfig, CachePatch, DurableCache, RocksCache};
//! use std::sync::Arc;
//!
//! let backend = RocksCache::open("/tmp/chat-sync-cache").unwrap();
//! let cache = DurableCache::new(Arc::new(backend), CacheConfig::default());
//!
//! let chat_id = ChatId::new("abc123").unwrap();
//! let _ = cache.write(
//!     &chat_id,
//!     CachePatch::messages(vec![Message::user("Hi")]).with_pending(true),
//! );
//! assert!(cache.read(&chat_id).unwrap().pending);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod durable;
pub mod error;
pub mod keys;
pub mod memory;
pub mod rocks;
pub mod schema;
pub mod types;

pub use durable::{CacheWrite, DurableCache};
pub use error::{Result, StoreError};
pub use memory::MemoryCache;
pub use rocks::RocksCache;
pub use types::{CacheConfig, CacheEntry, CachePatch, DEFAULT_MAX_ENTRIES};

use chat_sync_core::ChatId;

/// Storage backend for cache entries.
///
/// Backends store entries verbatim; merging and timestamping are done by
/// [`DurableCache`].
pub trait CacheStore: Send + Sync {
    /// Get the entry for a chat.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    fn get_entry(&self, chat_id: &ChatId) -> Result<Option<CacheEntry>>;

    /// Insert or replace an entry.
    ///
    /// This also maintains the recency index.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    fn put_entry(&self, entry: &CacheEntry) -> Result<()>;

    /// Delete the entry for a chat. Deleting a missing entry is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    fn delete_entry(&self, chat_id: &ChatId) -> Result<()>;

    /// List all entries, least recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    fn list_entries(&self) -> Result<Vec<CacheEntry>>;

    /// Count stored entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    fn count_entries(&self) -> Result<usize>;
}
