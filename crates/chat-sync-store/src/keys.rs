//! Key encoding utilities for `RocksDB`.
//!
//! Entry keys are the `chat:<id>` strings a browser cache would use, so a
//! dump of the database reads the same as the original key layout. Recency
//! keys sort by big-endian timestamp to make an ascending scan oldest-first.

use chat_sync_core::ChatId;

use crate::error::{Result, StoreError};

/// Prefix of every entry key.
pub const ENTRY_PREFIX: &str = "chat:";

/// Width of the timestamp part of a recency key.
const TIMESTAMP_LEN: usize = 8;

/// Encode an entry key: `chat:<chat_id>`.
#[must_use]
pub fn entry_key(chat_id: &ChatId) -> Vec<u8> {
    format!("{ENTRY_PREFIX}{chat_id}").into_bytes()
}

/// Encode a recency index key: `updated_at (u64 BE) || chat_id`.
#[must_use]
pub fn recency_key(updated_at: u64, chat_id: &ChatId) -> Vec<u8> {
    let id = chat_id.as_str().as_bytes();
    let mut key = Vec::with_capacity(TIMESTAMP_LEN + id.len());
    key.extend_from_slice(&updated_at.to_be_bytes());
    key.extend_from_slice(id);
    key
}

/// Extract the chat id from a recency index key.
///
/// # Errors
///
/// Returns `StoreError::CorruptKey` if the key is too short or the id part
/// is not a valid chat id.
pub fn extract_chat_id_from_recency_key(key: &[u8]) -> Result<ChatId> {
    let id = key
        .get(TIMESTAMP_LEN..)
        .ok_or_else(|| StoreError::CorruptKey(format!("recency key of {} bytes", key.len())))?;
    let id = std::str::from_utf8(id).map_err(|e| StoreError::CorruptKey(e.to_string()))?;
    ChatId::new(id).map_err(|e| StoreError::CorruptKey(e.to_string()))
}
