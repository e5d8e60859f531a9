//! The cache as seen by the rest of the application.
//!
//! `DurableCache` wraps a [`CacheStore`] backend with the write contract the
//! session controller relies on:
//!
//! - writes are shallow merges over the stored entry
//! - every write stamps an `updatedAt` strictly newer than any stamp this
//!   cache has issued before, and newer than the stored entry's
//! - no operation returns an error; failures are logged and reported as a
//!   [`CacheWrite::Degraded`] outcome or a cache miss
//! - the number of entries is bounded, evicting the least recently updated
//!   entry that is not pending

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chat_sync_core::{unix_millis, ChatId};
use parking_lot::Mutex;

use crate::error::Result;
use crate::memory::MemoryCache;
use crate::types::{CacheConfig, CacheEntry, CachePatch};
use crate::CacheStore;

/// Outcome of a cache write.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum CacheWrite {
    /// The merged entry was stored with this timestamp.
    Written {
        /// Stamp given to the entry.
        updated_at: u64,
    },
    /// The backend failed; nothing was stored.
    Degraded(String),
}

impl CacheWrite {
    /// Whether the write reached the backend.
    #[must_use]
    pub const fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// Merge-on-write cache over a pluggable backend.
pub struct DurableCache {
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
    /// Last issued `updatedAt`; also serializes read-merge-write cycles.
    last_stamp: Mutex<u64>,
    /// The last eviction scan found nothing but pending entries.
    saturated: AtomicBool,
}

impl std::fmt::Debug for DurableCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DurableCache {
    /// Wrap a backend.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            last_stamp: Mutex::new(0),
            saturated: AtomicBool::new(false),
        }
    }

    /// A cache over a fresh in-memory backend.
    #[must_use]
    pub fn in_memory(config: CacheConfig) -> Self {
        Self::new(Arc::new(MemoryCache::new()), config)
    }

    /// Cache configuration.
    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Read the entry for a chat. Backend failures read as a miss.
    #[must_use]
    pub fn read(&self, chat_id: &ChatId) -> Option<CacheEntry> {
        match self.store.get_entry(chat_id) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Merge `patch` over the stored entry and stamp it.
    pub fn write(&self, chat_id: &ChatId, patch: CachePatch) -> CacheWrite {
        let mut last_stamp = self.last_stamp.lock();

        let result = self.merge_and_put(chat_id, patch, *last_stamp);
        match result {
            Ok((updated_at, pending)) => {
                *last_stamp = updated_at;
                tracing::debug!(chat_id = %chat_id, updated_at, "Cache entry written");
                if !pending {
                    self.saturated.store(false, Ordering::SeqCst);
                }
                self.evict(chat_id);
                CacheWrite::Written { updated_at }
            }
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Cache write failed, continuing without cache");
                CacheWrite::Degraded(e.to_string())
            }
        }
    }

    /// Remove the entry for a chat. Returns whether the backend accepted it.
    pub fn remove(&self, chat_id: &ChatId) -> bool {
        let _guard = self.last_stamp.lock();
        match self.store.delete_entry(chat_id) {
            Ok(()) => {
                tracing::debug!(chat_id = %chat_id, "Cache entry removed");
                true
            }
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Cache remove failed");
                false
            }
        }
    }

    /// Move the entry stored under `from` to `to`, merging it over any entry
    /// already stored under `to`, then remove `from`.
    ///
    /// Nothing is written when `from` has no entry.
    pub fn alias(&self, from: &ChatId, to: &ChatId) -> Option<CacheWrite> {
        let entry = self.read(from)?;
        let outcome = self.write(to, CachePatch::from_entry(entry));
        if outcome.is_written() {
            self.remove(from);
            tracing::debug!(from = %from, to = %to, "Cache entry re-keyed");
        }
        Some(outcome)
    }

    /// Number of stored entries, or zero if the backend fails.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.count_entries().unwrap_or(0)
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the new stamp and whether the entry is pending.
    fn merge_and_put(
        &self,
        chat_id: &ChatId,
        patch: CachePatch,
        last_stamp: u64,
    ) -> Result<(u64, bool)> {
        let previous = self.store.get_entry(chat_id)?;
        let previous_stamp = previous.as_ref().map_or(0, |e| e.updated_at);

        let mut entry = previous.unwrap_or_else(|| CacheEntry::empty(chat_id.clone()));
        entry.apply(patch);
        entry.updated_at = unix_millis()
            .max(last_stamp.saturating_add(1))
            .max(previous_stamp.saturating_add(1));

        self.store.put_entry(&entry)?;
        Ok((entry.updated_at, entry.pending))
    }

    /// Drop the least recently updated non-pending entries above the bound.
    ///
    /// While every entry is pending the scan is skipped until a write leaves
    /// a non-pending entry behind.
    fn evict(&self, keep: &ChatId) {
        if self.saturated.load(Ordering::SeqCst) {
            return;
        }
        match self.try_evict(keep) {
            Ok(0) => {}
            Ok(evicted) => tracing::debug!(evicted, "Evicted cache entries"),
            Err(e) => tracing::warn!(error = %e, "Cache eviction failed"),
        }
    }

    fn try_evict(&self, keep: &ChatId) -> Result<usize> {
        let mut count = self.store.count_entries()?;
        if count <= self.config.max_entries {
            return Ok(0);
        }

        let mut evicted = 0;
        let mut kept_evictable = false;
        for entry in self.store.list_entries()? {
            if count <= self.config.max_entries {
                break;
            }
            if entry.pending {
                continue;
            }
            if &entry.id == keep {
                kept_evictable = true;
                continue;
            }
            self.store.delete_entry(&entry.id)?;
            count -= 1;
            evicted += 1;
        }

        if count > self.config.max_entries
            && !kept_evictable
            && !self.saturated.swap(true, Ordering::SeqCst)
        {
            tracing::warn!(
                entries = count,
                max_entries = self.config.max_entries,
                "Cache over its bound with only pending entries"
            );
        }
        Ok(evicted)
    }
}
