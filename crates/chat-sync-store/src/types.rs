//! Cache entry types.

use chat_sync_core::{Chat, ChatId, Message};
use serde::{Deserialize, Serialize};

/// Default bound on the number of cached chats.
pub const DEFAULT_MAX_ENTRIES: usize = 200;

/// A denormalized local mirror of one chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Chat id.
    pub id: ChatId,
    /// Chat title, if known.
    #[serde(default)]
    pub title: Option<String>,
    /// Selected completion model, if any.
    #[serde(default)]
    pub model: Option<String>,
    /// Message list as last seen locally.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Set while a turn has not been confirmed persisted remotely.
    #[serde(default)]
    pub pending: bool,
    /// Milliseconds since the Unix epoch of the last write.
    #[serde(default)]
    pub updated_at: u64,
}

impl CacheEntry {
    /// Create an empty entry for a chat id.
    #[must_use]
    pub fn empty(id: ChatId) -> Self {
        Self {
            id,
            title: None,
            model: None,
            messages: Vec::new(),
            pending: false,
            updated_at: 0,
        }
    }

    /// Apply a patch over this entry, keeping fields the patch leaves unset.
    pub fn apply(&mut self, patch: CachePatch) {
        if let Some(title) = patch.title {
            self.title = Some(title);
        }
        if let Some(model) = patch.model {
            self.model = Some(model);
        }
        if let Some(messages) = patch.messages {
            self.messages = messages;
        }
        if let Some(pending) = patch.pending {
            self.pending = pending;
        }
    }
}

/// A partial cache entry; `None` fields leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachePatch {
    /// New title.
    pub title: Option<String>,
    /// New model.
    pub model: Option<String>,
    /// Replacement message list.
    pub messages: Option<Vec<Message>>,
    /// New pending flag.
    pub pending: Option<bool>,
}

impl CachePatch {
    /// Patch that replaces the message list.
    #[must_use]
    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Some(messages),
            ..Self::default()
        }
    }

    /// Patch that only sets the model.
    #[must_use]
    pub fn model(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Self::default()
        }
    }

    /// Patch that only sets the pending flag.
    #[must_use]
    pub fn pending(pending: bool) -> Self {
        Self {
            pending: Some(pending),
            ..Self::default()
        }
    }

    /// Full overwrite from an authoritative chat record, clearing `pending`.
    ///
    /// The model is left out when the record does not carry one, so a locally
    /// selected model survives a remote refresh.
    #[must_use]
    pub fn from_chat(chat: &Chat) -> Self {
        Self {
            title: chat.title.clone(),
            model: chat.model.clone(),
            messages: Some(chat.messages.clone()),
            pending: Some(false),
        }
    }

    /// Every field of an existing entry, used to move an entry to a new key.
    #[must_use]
    pub fn from_entry(entry: CacheEntry) -> Self {
        Self {
            title: entry.title,
            model: entry.model,
            messages: Some(entry.messages),
            pending: Some(entry.pending),
        }
    }

    /// Set the title.
    #[must_use]
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    /// Set the pending flag.
    #[must_use]
    pub fn with_pending(mut self, pending: bool) -> Self {
        self.pending = Some(pending);
        self
    }

    /// Set the model.
    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries kept before eviction.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

const fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}
