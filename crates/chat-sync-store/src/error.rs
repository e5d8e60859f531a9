//! Error types for the cache layer.

use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by a [`CacheStore`](crate::CacheStore) backend.
///
/// These never leave the crate through [`DurableCache`](crate::DurableCache),
/// which folds them into degraded outcomes.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stored key could not be decoded.
    #[error("corrupt key: {0}")]
    CorruptKey(String),

    /// The backend is switched off.
    #[error("storage unavailable")]
    Unavailable,
}
