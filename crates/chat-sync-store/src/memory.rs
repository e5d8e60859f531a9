//! In-process cache backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chat_sync_core::ChatId;
use parking_lot::RwLock;

use crate::error::{Result, StoreError};
use crate::types::CacheEntry;
use crate::CacheStore;

/// A `CacheStore` held in memory.
///
/// Used when no cache directory is configured, and in tests. The backend can
/// be switched off to simulate disabled or full storage.
#[derive(Debug)]
pub struct MemoryCache {
    entries: RwLock<HashMap<ChatId, CacheEntry>>,
    available: AtomicBool,
}

impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Switch the backend on or off. While off every operation fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryCache {
    fn get_entry(&self, chat_id: &ChatId) -> Result<Option<CacheEntry>> {
        self.check()?;
        Ok(self.entries.read().get(chat_id).cloned())
    }

    fn put_entry(&self, entry: &CacheEntry) -> Result<()> {
        self.check()?;
        self.entries.write().insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    fn delete_entry(&self, chat_id: &ChatId) -> Result<()> {
        self.check()?;
        self.entries.write().remove(chat_id);
        Ok(())
    }

    fn list_entries(&self) -> Result<Vec<CacheEntry>> {
        self.check()?;
        let mut entries: Vec<CacheEntry> = self.entries.read().values().cloned().collect();
        entries.sort_by(|a, b| (a.updated_at, &a.id).cmp(&(b.updated_at, &b.id)));
        Ok(entries)
    }

    fn count_entries(&self) -> Result<usize> {
        self.check()?;
        Ok(self.entries.read().len())
    }
}
