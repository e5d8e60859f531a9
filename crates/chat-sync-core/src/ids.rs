//! Identifier types for chats and messages.
//!
//! Chat ids are opaque strings assigned by the remote store, except during the
//! optimistic-creation window where a temporary `temp-<millis>` id stands in.
//! Message ids are time-based and assigned client-side at creation time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix carried by temporary chat ids.
pub const TEMP_PREFIX: &str = "temp-";

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// An opaque chat identifier.
///
/// Ids are used as URL path segments and cache keys, so they must be non-empty
/// and may not contain `/` or whitespace.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChatId(String);

impl ChatId {
    /// Create a `ChatId` from a server- or client-assigned string.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is empty or contains `/` or whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdError::Empty);
        }
        if let Some(c) = id.chars().find(|c| *c == '/' || c.is_whitespace()) {
            return Err(IdError::InvalidCharacter(c));
        }
        Ok(Self(id))
    }

    /// Allocate a temporary id from the current time.
    #[must_use]
    pub fn temporary() -> Self {
        Self::temporary_at(unix_millis())
    }

    /// Build the temporary id for a given millisecond timestamp.
    #[must_use]
    pub fn temporary_at(millis: u64) -> Self {
        Self(format!("{TEMP_PREFIX}{millis}"))
    }

    /// Whether this id was allocated locally and not yet confirmed by the store.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_PREFIX)
    }

    /// Return the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChatId({})", self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChatId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ChatId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChatId> for String {
    fn from(id: ChatId) -> Self {
        id.0
    }
}

impl AsRef<str> for ChatId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Last issued message-id timestamp, so ids stay unique within one millisecond.
static LAST_MESSAGE_MILLIS: AtomicU64 = AtomicU64::new(0);

/// A message identifier.
///
/// Locally created messages get the creation time in milliseconds; records
/// round-tripped from the remote store keep whatever id the store returned.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap an existing id verbatim.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a time-based id, strictly greater than any id issued before
    /// by this process.
    #[must_use]
    pub fn generate() -> Self {
        let now = unix_millis();
        let mut last = LAST_MESSAGE_MILLIS.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match LAST_MESSAGE_MILLIS.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Self(next.to_string()),
                Err(actual) => last = actual,
            }
        }
    }

    /// Return the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The id is empty.
    #[error("identifier is empty")]
    Empty,

    /// The id contains a character that cannot appear in a path segment.
    #[error("identifier contains invalid character {0:?}")]
    InvalidCharacter(char),
}
