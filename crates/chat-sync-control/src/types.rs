//! Configuration, view state and outcome types for chat sessions.

use std::time::Duration;

use chat_sync_core::{ChatId, Message, TITLE_MAX_CHARS};
use chat_sync_store::CacheConfig;
use serde::{Deserialize, Serialize};

/// A selectable completion model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOption {
    /// Model id sent to the completion endpoint.
    pub id: String,
    /// Display name.
    pub name: String,
}

impl ModelOption {
    /// Create a catalog entry.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Configuration for chat sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Model used when a chat has none selected.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Models a chat may select.
    #[serde(default = "default_models")]
    pub models: Vec<ModelOption>,

    /// Maximum length, in characters, of a derived title.
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,

    /// Settle time before a pending turn is resumed on mount (milliseconds).
    #[serde(default = "default_resume_delay_ms")]
    pub resume_delay_ms: u64,

    /// Maximum number of cached chats.
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Timeout for chat store requests (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Connection timeout for all requests (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

fn default_model() -> String {
    "google/gemini-2.5-flash".to_string()
}

fn default_models() -> Vec<ModelOption> {
    vec![
        ModelOption::new("google/gemini-2.5-flash", "Gemini 2.5 Flash"),
        ModelOption::new(
            "mistralai/mistral-small-3.2-24b-instruct",
            "Mistral Small 3.2 24B",
        ),
        ModelOption::new("qwen/qwen3-4b:free", "Qwen3 4B"),
    ]
}

const fn default_title_max_chars() -> usize {
    TITLE_MAX_CHARS
}

const fn default_resume_delay_ms() -> u64 {
    150
}

const fn default_cache_max_entries() -> usize {
    chat_sync_store::DEFAULT_MAX_ENTRIES
}

const fn default_request_timeout() -> u64 {
    60
}

const fn default_connect_timeout() -> u64 {
    5
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            models: default_models(),
            title_max_chars: default_title_max_chars(),
            resume_delay_ms: default_resume_delay_ms(),
            cache_max_entries: default_cache_max_entries(),
            request_timeout_seconds: default_request_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl SessionConfig {
    /// Get the resume settle delay as a Duration.
    #[must_use]
    pub const fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }

    /// Get the store request timeout as a Duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Get the connection timeout as a Duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Cache settings derived from this configuration.
    #[must_use]
    pub const fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.cache_max_entries,
        }
    }

    /// Look up a model in the catalog.
    #[must_use]
    pub fn model(&self, id: &str) -> Option<&ModelOption> {
        self.models.iter().find(|m| m.id == id)
    }
}

/// What a chat view renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
    /// Chat shown, or `None` before the first message of a new chat.
    pub chat_id: Option<ChatId>,
    /// Chat title, if known.
    pub title: Option<String>,
    /// Selected model.
    pub model: String,
    /// Transcript including any in-progress assistant message.
    pub messages: Vec<Message>,
    /// A completion request is out and no delta has arrived yet.
    pub waiting: bool,
    /// A turn is streaming.
    pub streaming: bool,
    /// Error of the last failed turn, cleared when a new turn starts.
    pub error: Option<String>,
}

impl SessionView {
    /// An empty view using the given model.
    #[must_use]
    pub fn blank(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }
}

/// Result of a completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Chat the turn belongs to.
    pub chat_id: ChatId,
    /// The assistant reply, or `None` if the stream carried no text.
    pub reply: Option<Message>,
    /// Number of deltas folded.
    pub deltas: usize,
    /// Whether the final transcript was accepted by the remote store.
    pub persisted: bool,
}

/// Result of mounting a chat view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOutcome {
    /// The remote record was loaded and replaced the cached state.
    Fetched,
    /// The remote fetch failed; the view shows cached state, if any.
    Offline,
    /// The chat does not exist or belongs to someone else.
    NotFound,
    /// A pending turn was resumed from the cache.
    Resumed(TurnOutcome),
    /// A pending turn was already resumed for this mount.
    AlreadyResumed,
    /// The chat is already mounted with a turn streaming; nothing changed.
    Streaming,
}
