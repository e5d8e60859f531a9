//! Cross-region notifications about chat creation.
//!
//! Delivery is fire-and-forget: events are not persisted, and a region that
//! is not subscribed when an event is published never sees it.

use chat_sync_core::{Chat, ChatId};
use tokio::sync::broadcast;

/// Default number of undelivered events kept per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// A notification published by the creation flow.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A chat was created locally under a temporary id.
    CreationAnnounced {
        /// Temporary id.
        temp_id: ChatId,
        /// Title to show until the record is confirmed.
        title: String,
    },
    /// The remote store accepted the chat.
    CreationConfirmed {
        /// Temporary id being replaced.
        temp_id: ChatId,
        /// Id assigned by the store.
        real_id: ChatId,
        /// Stored record.
        chat: Chat,
    },
    /// The remote store rejected the chat; the temporary id is retracted.
    CreationFailed {
        /// Temporary id being retracted.
        temp_id: ChatId,
    },
}

impl ChatEvent {
    /// Temporary id the event refers to.
    #[must_use]
    pub const fn temp_id(&self) -> &ChatId {
        match self {
            Self::CreationAnnounced { temp_id, .. }
            | Self::CreationConfirmed { temp_id, .. }
            | Self::CreationFailed { temp_id } => temp_id,
        }
    }
}

/// Publish/subscribe channel shared by the chat view and the chat list.
#[derive(Debug, Clone)]
pub struct ChatEvents {
    tx: broadcast::Sender<ChatEvent>,
}

impl ChatEvents {
    /// Create a channel keeping up to `capacity` undelivered events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.tx.subscribe()
    }

    /// Publish an event, returning how many subscribers it reached.
    pub fn publish(&self, event: ChatEvent) -> usize {
        let temp_id = event.temp_id().clone();
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!(temp_id = %temp_id, "No listeners for chat event");
                0
            }
        }
    }
}

impl Default for ChatEvents {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
