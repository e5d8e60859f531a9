//! In-process chat store.
//!
//! Behaves like the storage endpoints: records are owner-scoped, ids are
//! assigned when the caller does not supply one, titles default from the
//! first message, and listing is newest-created first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chat_sync_core::{Chat, ChatId, ChatPatch, NewChat, DEFAULT_TITLE};
use chrono::Utc;
use parking_lot::RwLock;

use crate::error::{RemoteError, Result};
use crate::ChatStore;

#[derive(Debug, Clone)]
struct StoredChat {
    chat: Chat,
    /// Insertion order, breaking ties between equal creation times.
    seq: u64,
}

#[derive(Debug, Default)]
struct Table {
    chats: HashMap<ChatId, StoredChat>,
    next_seq: u64,
}

/// A `ChatStore` held in memory, scoped to one owner.
///
/// Handles created with [`MemoryChatStore::for_owner`] share the same
/// records, which lets tests exercise ownership checks.
#[derive(Debug, Clone)]
pub struct MemoryChatStore {
    owner: String,
    table: Arc<RwLock<Table>>,
    available: Arc<AtomicBool>,
}

impl MemoryChatStore {
    /// Create an empty store acting as `owner`.
    #[must_use]
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            table: Arc::new(RwLock::new(Table::default())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A handle on the same records acting as another owner.
    #[must_use]
    pub fn for_owner(&self, owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            table: Arc::clone(&self.table),
            available: Arc::clone(&self.available),
        }
    }

    /// The owner this handle acts as.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Switch the store on or off. While off every call fails with a 503.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Api {
                status: 503,
                message: "store unavailable".to_string(),
            })
        }
    }

    fn owns(&self, chat: &Chat) -> bool {
        chat.user_id.as_deref() == Some(self.owner.as_str())
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn create(&self, new_chat: &NewChat) -> Result<Chat> {
        self.check()?;

        let id = match &new_chat.id {
            Some(id) => id.clone(),
            None => ChatId::new(uuid::Uuid::new_v4().to_string())
                .map_err(|e| RemoteError::Parse(e.to_string()))?,
        };
        let title = new_chat
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| new_chat.messages.first().map(|m| m.content.clone()))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let mut table = self.table.write();
        if table.chats.contains_key(&id) {
            return Err(RemoteError::Api {
                status: 409,
                message: format!("chat {id} already exists"),
            });
        }

        let now = Utc::now();
        let chat = Chat {
            id: id.clone(),
            title: Some(title),
            messages: new_chat.messages.clone(),
            model: None,
            user_id: Some(self.owner.clone()),
            created_at: Some(now),
            updated_at: Some(now),
        };
        let seq = table.next_seq;
        table.next_seq += 1;
        table.chats.insert(
            id,
            StoredChat {
                chat: chat.clone(),
                seq,
            },
        );
        Ok(chat)
    }

    async fn get(&self, chat_id: &ChatId) -> Result<Chat> {
        self.check()?;
        self.table
            .read()
            .chats
            .get(chat_id)
            .map(|stored| &stored.chat)
            .filter(|chat| self.owns(chat))
            .cloned()
            .ok_or(RemoteError::NotFound)
    }

    async fn patch(&self, chat_id: &ChatId, patch: &ChatPatch) -> Result<()> {
        self.check()?;
        let mut table = self.table.write();
        let stored = table
            .chats
            .get_mut(chat_id)
            .filter(|stored| self.owns(&stored.chat))
            .ok_or(RemoteError::NotFound)?;

        stored.chat.messages.clone_from(&patch.messages);
        if let Some(title) = patch.title.as_ref().filter(|t| !t.is_empty()) {
            stored.chat.title = Some(title.clone());
        }
        stored.chat.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Chat>> {
        self.check()?;
        let table = self.table.read();
        let mut owned: Vec<&StoredChat> = table
            .chats
            .values()
            .filter(|stored| self.owns(&stored.chat))
            .collect();
        owned.sort_by(|a, b| {
            (b.chat.created_at, b.seq).cmp(&(a.chat.created_at, a.seq))
        });
        Ok(owned.into_iter().map(|stored| stored.chat.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_sync_core::{Message, MessageId, Role};

    #[tokio::test]
    async fn create_then_get_preserves_messages() {
        let store = MemoryChatStore::new("user_1");
        let messages = vec![
            Message::user("Plan a trip"),
            Message {
                id: MessageId::new("srv-9"),
                role: Role::Assistant,
                content: "Where to?".to_string(),
            },
        ];

        let created = store
            .create(&NewChat {
                messages: messages.clone(),
                ..NewChat::default()
            })
            .await
            .unwrap();
        assert!(!created.id.is_temporary());

        let fetched = store.get(&created.id).await.unwrap();
        assert_eq!(fetched.messages, messages);
        assert_eq!(fetched.title.as_deref(), Some("Plan a trip"));
    }

    #[tokio::test]
    async fn client_supplied_id_is_kept() {
        let store = MemoryChatStore::new("user_1");
        let id = ChatId::new("abc123").unwrap();
        let created = store
            .create(&NewChat {
                id: Some(id.clone()),
                ..NewChat::default()
            })
            .await
            .unwrap();
        assert_eq!(created.id, id);
        assert_eq!(created.title.as_deref(), Some(DEFAULT_TITLE));

        let duplicate = store
            .create(&NewChat {
                id: Some(id),
                ..NewChat::default()
            })
            .await;
        assert!(matches!(duplicate, Err(RemoteError::Api { status: 409, .. })));
    }

    #[tokio::test]
    async fn other_owners_see_not_found() {
        let alice = MemoryChatStore::new("alice");
        let bob = alice.for_owner("bob");
        let chat = alice.create(&NewChat::default()).await.unwrap();

        assert!(bob.get(&chat.id).await.unwrap_err().is_not_found());
        let patch = ChatPatch {
            messages: vec![],
            title: None,
        };
        assert!(bob.patch(&chat.id, &patch).await.unwrap_err().is_not_found());
        assert!(bob.list().await.unwrap().is_empty());
        assert_eq!(alice.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn patch_keeps_title_unless_given() {
        let store = MemoryChatStore::new("user_1");
        let chat = store
            .create(&NewChat {
                title: Some("Original".to_string()),
                ..NewChat::default()
            })
            .await
            .unwrap();

        let mut patch = ChatPatch {
            messages: vec![Message::user("hi")],
            title: Some(String::new()),
        };
        store.patch(&chat.id, &patch).await.unwrap();
        let fetched = store.get(&chat.id).await.unwrap();
        assert_eq!(fetched.title.as_deref(), Some("Original"));
        assert_eq!(fetched.messages.len(), 1);
        assert!(fetched.updated_at >= chat.updated_at);

        patch.title = Some("Renamed".to_string());
        store.patch(&chat.id, &patch).await.unwrap();
        assert_eq!(
            store.get(&chat.id).await.unwrap().title.as_deref(),
            Some("Renamed")
        );
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = MemoryChatStore::new("user_1");
        for title in ["first", "second", "third"] {
            store
                .create(&NewChat {
                    title: Some(title.to_string()),
                    ..NewChat::default()
                })
                .await
                .unwrap();
        }
        let titles: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .filter_map(|c| c.title)
            .collect();
        assert_eq!(titles, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn unavailable_store_fails() {
        let store = MemoryChatStore::new("user_1");
        store.set_available(false);
        let err = store.create(&NewChat::default()).await.unwrap_err();
        assert!(err.is_retriable());
    }
}
