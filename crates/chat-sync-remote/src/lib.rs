//! Remote chat-history store client for chat-sync.
//!
//! The remote store is the authoritative copy of every chat. All operations
//! are scoped to the calling user: a chat owned by someone else reads as
//! [`RemoteError::NotFound`], exactly like a missing one.
//!
//! # Example
//!
//! ```no_run
//! use chat_sync_core::{Message, NewChat};
//! use chat_sync_remote::{ChatStore, HttpChatStore};
//! use std::time::Duration;
//!
//! # async fn example() -> chat_sync_remote::Result<()> {
//! let store = HttpChatStore::new(
//!     "http://localhost:3000",
//!     Duration::from_secs(60),
//!     Duration::from_secs(5),
//! )?;
//! let chat = store
//!     .create(&NewChat {
//!         messages: vec![Message::user("Hello")],
//!         ..NewChat::default()
//!     })
//!     .await?;
//! let fetched = store.get(&chat.id).await?;
//! assert_eq!(fetched.messages.len(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod http;
pub mod memory;

pub use error::{RemoteError, Result};
pub use http::HttpChatStore;
pub use memory::MemoryChatStore;

use async_trait::async_trait;
use chat_sync_core::{Chat, ChatId, ChatPatch, NewChat};

/// Operations on the remote chat store.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Create a chat and return the stored record, including its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the store rejects it.
    async fn create(&self, chat: &NewChat) -> Result<Chat>;

    /// Fetch a chat by id.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::NotFound` if the chat is missing or not owned by
    /// the caller, or another error if the request fails.
    async fn get(&self, chat_id: &ChatId) -> Result<Chat>;

    /// Replace the message list of a chat and, when a non-empty title is
    /// given, its title. Bumps the update timestamp.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::NotFound` if the chat is missing or not owned by
    /// the caller, or another error if the request fails.
    async fn patch(&self, chat_id: &ChatId, patch: &ChatPatch) -> Result<()>;

    /// List the caller's chats, newest created first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn list(&self) -> Result<Vec<Chat>>;
}
