//! The chat list region.
//!
//! Shows the caller's chats newest first. Rows for optimistic creations are
//! inserted on announcement and reconciled when the creation resolves.

use std::sync::Arc;

use chat_sync_core::{Chat, ChatId, NewChat, DEFAULT_TITLE};
use chat_sync_remote::ChatStore;
use parking_lot::RwLock;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::error::Result;
use crate::events::ChatEvent;

/// One row of the chat list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSummary {
    /// Chat id; temporary while a creation is unresolved.
    pub id: ChatId,
    /// Display title.
    pub title: String,
    /// Whether the row stands in for an unconfirmed creation.
    pub temporary: bool,
}

impl ChatSummary {
    fn from_chat(chat: &Chat) -> Self {
        Self {
            id: chat.id.clone(),
            title: chat.display_title(),
            temporary: false,
        }
    }
}

/// Chat list kept in step with the remote store and creation events.
pub struct ChatList {
    store: Arc<dyn ChatStore>,
    rows: RwLock<Vec<ChatSummary>>,
}

impl std::fmt::Debug for ChatList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatList")
            .field("rows", &*self.rows.read())
            .finish_non_exhaustive()
    }
}

impl ChatList {
    /// Create an empty list.
    #[must_use]
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self {
            store,
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Current rows, newest first.
    #[must_use]
    pub fn rows(&self) -> Vec<ChatSummary> {
        self.rows.read().clone()
    }

    /// Reload the list from the remote store.
    ///
    /// Rows of unresolved creations survive the reload.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    pub async fn refresh(&self) -> Result<usize> {
        let chats = match self.store.list().await {
            Ok(chats) => chats,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load chat list");
                return Err(e.into());
            }
        };

        let mut rows = self.rows.write();
        let mut fresh: Vec<ChatSummary> = rows.iter().filter(|r| r.temporary).cloned().collect();
        fresh.extend(chats.iter().map(ChatSummary::from_chat));
        *rows = fresh;
        Ok(rows.len())
    }

    /// Apply a creation event.
    pub fn apply(&self, event: &ChatEvent) {
        let mut rows = self.rows.write();
        match event {
            ChatEvent::CreationAnnounced { temp_id, title } => {
                if !rows.iter().any(|r| &r.id == temp_id) {
                    rows.insert(
                        0,
                        ChatSummary {
                            id: temp_id.clone(),
                            title: title.clone(),
                            temporary: true,
                        },
                    );
                }
            }
            ChatEvent::CreationConfirmed { temp_id, chat, .. } => {
                let confirmed = ChatSummary::from_chat(chat);
                // The real row may already be there from a refresh
                if rows.iter().any(|r| r.id == confirmed.id) {
                    rows.retain(|r| &r.id != temp_id);
                }
                match rows
                    .iter_mut()
                    .find(|r| &r.id == temp_id || r.id == confirmed.id)
                {
                    Some(row) => *row = confirmed,
                    None => rows.insert(0, confirmed),
                }
            }
            ChatEvent::CreationFailed { temp_id } => {
                rows.retain(|r| &r.id != temp_id);
            }
        }
    }

    /// Insert or update the row for a stored chat.
    pub fn upsert(&self, chat: &Chat) {
        let summary = ChatSummary::from_chat(chat);
        let mut rows = self.rows.write();
        match rows.iter_mut().find(|r| r.id == summary.id) {
            Some(row) => *row = summary,
            None => rows.insert(0, summary),
        }
    }

    /// Create an empty chat directly in the remote store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the chat.
    pub async fn new_blank_chat(&self) -> Result<Chat> {
        let chat = self
            .store
            .create(&NewChat {
                title: Some(DEFAULT_TITLE.to_string()),
                ..NewChat::default()
            })
            .await?;
        tracing::info!(chat_id = %chat.id, "Created blank chat");
        self.upsert(&chat);
        Ok(chat)
    }

    /// Apply events until the channel closes.
    pub async fn follow(&self, mut rx: broadcast::Receiver<ChatEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => self.apply(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Chat list fell behind creation events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChatEvents;
    use chat_sync_core::Message;
    use chat_sync_remote::MemoryChatStore;

    fn list_for(store: &MemoryChatStore) -> ChatList {
        ChatList::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn refresh_lists_newest_first() {
        let store = MemoryChatStore::new("user_1");
        for title in ["one", "two"] {
            store
                .create(&NewChat {
                    title: Some(title.to_string()),
                    ..NewChat::default()
                })
                .await
                .unwrap();
        }
        let list = list_for(&store);

        assert_eq!(list.refresh().await.unwrap(), 2);
        let titles: Vec<String> = list.rows().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["two", "one"]);
    }

    #[test]
    fn announcement_then_confirmation_replaces_row() {
        let store = MemoryChatStore::new("user_1");
        let list = list_for(&store);
        let temp_id = ChatId::temporary_at(1_700_000_000_000);

        list.apply(&ChatEvent::CreationAnnounced {
            temp_id: temp_id.clone(),
            title: "Hello".to_string(),
        });
        assert!(list.rows()[0].temporary);

        let chat = Chat {
            id: ChatId::new("abc123").unwrap(),
            title: Some("Hello".to_string()),
            messages: vec![Message::user("Hello")],
            model: None,
            user_id: Some("user_1".to_string()),
            created_at: None,
            updated_at: None,
        };
        list.apply(&ChatEvent::CreationConfirmed {
            temp_id,
            real_id: chat.id.clone(),
            chat: chat.clone(),
        });

        let rows = list.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id.as_str(), "abc123");
        assert!(!rows[0].temporary);
    }

    #[test]
    fn failure_retracts_row() {
        let list = list_for(&MemoryChatStore::new("user_1"));
        let temp_id = ChatId::temporary_at(7);

        list.apply(&ChatEvent::CreationAnnounced {
            temp_id: temp_id.clone(),
            title: "Hello".to_string(),
        });
        list.apply(&ChatEvent::CreationFailed { temp_id });
        assert!(list.rows().is_empty());
    }

    #[tokio::test]
    async fn refresh_keeps_unresolved_rows() {
        let store = MemoryChatStore::new("user_1");
        store.create(&NewChat::default()).await.unwrap();
        let list = list_for(&store);
        list.apply(&ChatEvent::CreationAnnounced {
            temp_id: ChatId::temporary_at(9),
            title: "Draft".to_string(),
        });

        assert_eq!(list.refresh().await.unwrap(), 2);
        assert!(list.rows()[0].temporary);
    }

    #[tokio::test]
    async fn new_blank_chat_appears_first() {
        let store = MemoryChatStore::new("user_1");
        let list = list_for(&store);

        let chat = list.new_blank_chat().await.unwrap();
        assert!(chat.messages.is_empty());
        assert_eq!(list.rows()[0].title, DEFAULT_TITLE);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn follow_applies_published_events() {
        let events = ChatEvents::default();
        let list = Arc::new(list_for(&MemoryChatStore::new("user_1")));
        let rx = events.subscribe();
        let follower = {
            let list = Arc::clone(&list);
            tokio::spawn(async move { list.follow(rx).await })
        };

        let temp_id = ChatId::temporary_at(11);
        events.publish(ChatEvent::CreationAnnounced {
            temp_id: temp_id.clone(),
            title: "Hi".to_string(),
        });
        events.publish(ChatEvent::CreationFailed { temp_id });
        drop(events);

        follower.await.unwrap();
        assert!(list.rows().is_empty());
    }
}
