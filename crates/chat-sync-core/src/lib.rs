//! Core types and utilities for chat-sync.
//!
//! This crate provides the foundational types shared by every other crate:
//!
//! - **Identifiers**: opaque chat ids (including temporary `temp-<millis>` ids
//!   used during optimistic creation) and time-based message ids
//! - **Chat model**: messages, chats, and the request shapes used to create
//!   and patch chats in the remote store
//!
//! # Example
//!
//! ```
//! use chat_sync_core::{derive_title, ChatId, Message};
//!
//! let temp = ChatId::temporary_at(1_700_000_000_000);
//! assert_eq!(temp.as_str(), "temp-1700000000000");
//! assert!(temp.is_temporary());
//!
//! let messages = vec![Message::user("How do lifetimes work?")];
//! assert_eq!(derive_title(&messages, 80).as_deref(), Some("How do lifetimes work?"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;
pub mod types;

pub use ids::{unix_millis, ChatId, IdError, MessageId};
pub use types::{
    derive_title, truncate_chars, Chat, ChatPatch, Message, NewChat, Role, DEFAULT_TITLE,
    TITLE_MAX_CHARS,
};
