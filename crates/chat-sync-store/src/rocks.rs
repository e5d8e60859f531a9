//! `RocksDB` cache implementation.
//!
//! This module provides the `RocksCache` implementation of the `CacheStore` trait.

use std::path::Path;
use std::sync::Arc;

use chat_sync_core::ChatId;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::types::CacheEntry;
use crate::CacheStore;

/// RocksDB-backed cache.
pub struct RocksCache {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksCache {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize an entry as JSON text.
    fn serialize(entry: &CacheEntry) -> Result<Vec<u8>> {
        serde_json::to_vec(entry).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Deserialize an entry from JSON text.
    fn deserialize(data: &[u8]) -> Result<CacheEntry> {
        serde_json::from_slice(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

impl CacheStore for RocksCache {
    fn get_entry(&self, chat_id: &ChatId) -> Result<Option<CacheEntry>> {
        let cf = self.cf(cf::ENTRIES)?;

        self.db
            .get_cf(&cf, keys::entry_key(chat_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn put_entry(&self, entry: &CacheEntry) -> Result<()> {
        let cf_entries = self.cf(cf::ENTRIES)?;
        let cf_by_updated = self.cf(cf::ENTRIES_BY_UPDATED)?;

        let entry_key = keys::entry_key(&entry.id);
        let value = Self::serialize(entry)?;

        let mut batch = WriteBatch::default();

        // Replace the recency index key of the previous version
        if let Some(old) = self.get_entry(&entry.id)? {
            if old.updated_at != entry.updated_at {
                batch.delete_cf(&cf_by_updated, keys::recency_key(old.updated_at, &entry.id));
            }
        }
        batch.put_cf(&cf_entries, &entry_key, &value);
        batch.put_cf(
            &cf_by_updated,
            keys::recency_key(entry.updated_at, &entry.id),
            [],
        );

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn delete_entry(&self, chat_id: &ChatId) -> Result<()> {
        let cf_entries = self.cf(cf::ENTRIES)?;
        let cf_by_updated = self.cf(cf::ENTRIES_BY_UPDATED)?;

        let Some(entry) = self.get_entry(chat_id)? else {
            return Ok(());
        };

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_entries, keys::entry_key(chat_id));
        batch.delete_cf(&cf_by_updated, keys::recency_key(entry.updated_at, chat_id));

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn list_entries(&self) -> Result<Vec<CacheEntry>> {
        let cf_by_updated = self.cf(cf::ENTRIES_BY_UPDATED)?;

        let mut entries = Vec::new();
        for item in self.db.iterator_cf(&cf_by_updated, IteratorMode::Start) {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let chat_id = keys::extract_chat_id_from_recency_key(&key)?;
            if let Some(entry) = self.get_entry(&chat_id)? {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    fn count_entries(&self) -> Result<usize> {
        let cf_by_updated = self.cf(cf::ENTRIES_BY_UPDATED)?;

        let mut count = 0;
        for item in self.db.iterator_cf(&cf_by_updated, IteratorMode::Start) {
            item.map_err(|e| StoreError::Database(e.to_string()))?;
            count += 1;
        }

        Ok(count)
    }
}
