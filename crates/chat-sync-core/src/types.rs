//! Chat and message types.
//!
//! These types mirror the records held by the remote chat store and the
//! request bodies used to create and patch them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChatId, MessageId};

/// Title used when a chat has neither an explicit title nor any messages.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Maximum length, in characters, of a title derived from message content.
pub const TITLE_MAX_CHARS: usize = 80;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Typed by the user.
    User,
    /// Generated by the completion model.
    Assistant,
}

impl Role {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message id.
    pub id: MessageId,
    /// Message author.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl Message {
    /// Create a user message with a fresh time-based id.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message with a fresh time-based id.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Check if this is a user message.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Check if this is an assistant message.
    #[must_use]
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// A chat record as held by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    /// Chat id.
    pub id: ChatId,
    /// Explicit title, if set.
    #[serde(default)]
    pub title: Option<String>,
    /// Ordered message list.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Selected completion model, if the store tracks it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Owning user identity as reported by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Chat {
    /// Title to show in a chat list.
    #[must_use]
    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| derive_title(&self.messages, TITLE_MAX_CHARS))
            .unwrap_or_else(|| "Untitled Chat".to_string())
    }
}

/// Request body for creating a chat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewChat {
    /// Client-supplied id; the store assigns one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ChatId>,
    /// Title; the store derives one from the first message when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Initial messages.
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Partial update applied to a stored chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPatch {
    /// Full replacement message list.
    pub messages: Vec<Message>,
    /// New title; only applied when present and non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Truncate a string to at most `max_chars` characters.
#[must_use]
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Derive a title from the first user message, truncated to `max_chars`.
///
/// Returns `None` when there is no user message with non-blank content.
#[must_use]
pub fn derive_title(messages: &[Message], max_chars: usize) -> Option<String> {
    messages
        .iter()
        .find(|m| m.is_user())
        .map(|m| m.content.trim())
        .filter(|content| !content.is_empty())
        .map(|content| truncate_chars(content, max_chars))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let msg = Message {
            id: MessageId::new("1"),
            role: Role::Assistant,
            content: "hi".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["id"], "1");
    }

    #[test]
    fn title_truncates_by_characters() {
        let long = "é".repeat(100);
        let title = derive_title(&[Message::user(long)], TITLE_MAX_CHARS).unwrap();
        assert_eq!(title.chars().count(), 80);
    }

    #[test]
    fn title_skips_assistant_messages() {
        let messages = vec![Message::assistant("Welcome"), Message::user("Plan a trip")];
        assert_eq!(derive_title(&messages, 80).as_deref(), Some("Plan a trip"));
        assert_eq!(derive_title(&[], 80), None);
        assert_eq!(derive_title(&[Message::user("   ")], 80), None);
    }

    #[test]
    fn chat_parses_store_record() {
        let json = serde_json::json!({
            "id": "abc123",
            "user_id": "user_2x",
            "title": null,
            "messages": [{"id": "1700000000000", "role": "user", "content": "Hello"}],
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:05Z"
        });
        let chat: Chat = serde_json::from_value(json).unwrap();
        assert_eq!(chat.id.as_str(), "abc123");
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(chat.display_title(), "Hello");
        assert!(chat.model.is_none());
    }

    #[test]
    fn new_chat_omits_absent_fields() {
        let body = NewChat {
            messages: vec![Message::user("hi")],
            ..NewChat::default()
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("title").is_none());
        assert_eq!(json["messages"][0]["content"], "hi");
    }
}
