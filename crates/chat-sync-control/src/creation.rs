//! Optimistic chat creation.
//!
//! A new chat is shown under a temporary id before the remote store has
//! assigned a real one. The creation then resolves exactly once:
//!
//! ```text
//!                ┌─────────────┐
//!                │  Announced  │  temp id allocated, announcement published
//!                └──────┬──────┘
//!           create ok   │   create failed
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐           ┌─────────────┐
//!   │  Confirmed  │           │   Failed    │
//!   └─────────────┘           └─────────────┘
//!    temp → real published     temp retracted
//! ```
//!
//! There is no automatic retry; after a failure the user resubmits.

use chat_sync_core::{Chat, ChatId, NewChat};
use chat_sync_remote::ChatStore;

use crate::error::{ControlError, Result};
use crate::events::{ChatEvent, ChatEvents};

/// State of an optimistic creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreationState {
    /// Temporary id announced, remote create not yet resolved.
    Announced,
    /// Remote create succeeded.
    Confirmed,
    /// Remote create failed.
    Failed,
}

/// Check if a creation state transition is valid.
#[must_use]
pub const fn is_valid_transition(from: CreationState, to: CreationState) -> bool {
    use CreationState::{Announced, Confirmed, Failed};

    matches!((from, to), (Announced, Confirmed | Failed))
}

/// Returns true if no further transition is possible.
#[must_use]
pub const fn is_terminal(state: CreationState) -> bool {
    matches!(state, CreationState::Confirmed | CreationState::Failed)
}

/// Validates a state transition and returns the target state if valid.
///
/// # Errors
///
/// Returns `ControlError::InvalidTransition` if the transition is not allowed.
pub fn validate_transition(
    temp_id: &ChatId,
    from: CreationState,
    to: CreationState,
) -> Result<CreationState> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(ControlError::InvalidTransition {
            temp_id: temp_id.clone(),
            from,
            to,
        })
    }
}

/// One chat creation, from announcement to resolution.
#[derive(Debug)]
pub struct OptimisticCreation {
    temp_id: ChatId,
    title: String,
    state: CreationState,
    real_id: Option<ChatId>,
}

impl OptimisticCreation {
    /// Allocate a temporary id and publish the announcement.
    #[must_use]
    pub fn announce(events: &ChatEvents, title: impl Into<String>) -> Self {
        Self::announce_as(events, ChatId::temporary(), title)
    }

    /// Publish the announcement for a given temporary id.
    #[must_use]
    pub fn announce_as(events: &ChatEvents, temp_id: ChatId, title: impl Into<String>) -> Self {
        let title = title.into();
        events.publish(ChatEvent::CreationAnnounced {
            temp_id: temp_id.clone(),
            title: title.clone(),
        });
        tracing::debug!(temp_id = %temp_id, "Announced chat creation");

        Self {
            temp_id,
            title,
            state: CreationState::Announced,
            real_id: None,
        }
    }

    /// Temporary id.
    #[must_use]
    pub const fn temp_id(&self) -> &ChatId {
        &self.temp_id
    }

    /// Announced title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> CreationState {
        self.state
    }

    /// Real id, once confirmed.
    #[must_use]
    pub const fn real_id(&self) -> Option<&ChatId> {
        self.real_id.as_ref()
    }

    /// Record a successful create and publish the temp → real pairing.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidTransition` if the creation already resolved.
    pub fn confirm(&mut self, events: &ChatEvents, chat: &Chat) -> Result<()> {
        self.state = validate_transition(&self.temp_id, self.state, CreationState::Confirmed)?;
        self.real_id = Some(chat.id.clone());

        events.publish(ChatEvent::CreationConfirmed {
            temp_id: self.temp_id.clone(),
            real_id: chat.id.clone(),
            chat: chat.clone(),
        });
        tracing::info!(temp_id = %self.temp_id, chat_id = %chat.id, "Chat creation confirmed");
        Ok(())
    }

    /// Record a failed create and publish the retraction.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidTransition` if the creation already resolved.
    pub fn fail(&mut self, events: &ChatEvents) -> Result<()> {
        self.state = validate_transition(&self.temp_id, self.state, CreationState::Failed)?;

        events.publish(ChatEvent::CreationFailed {
            temp_id: self.temp_id.clone(),
        });
        Ok(())
    }

    /// Run the remote create and resolve accordingly.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::CreationFailed` if the store rejects the chat,
    /// or `ControlError::InvalidTransition` if the creation already resolved.
    pub async fn resolve(
        &mut self,
        store: &dyn ChatStore,
        events: &ChatEvents,
        request: &NewChat,
    ) -> Result<Chat> {
        validate_transition(&self.temp_id, self.state, CreationState::Confirmed)?;

        match store.create(request).await {
            Ok(chat) => {
                self.confirm(events, &chat)?;
                Ok(chat)
            }
            Err(e) => {
                tracing::error!(temp_id = %self.temp_id, error = %e, "Chat creation failed");
                self.fail(events)?;
                Err(ControlError::CreationFailed {
                    temp_id: self.temp_id.clone(),
                    source: e,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_sync_core::Message;
    use chat_sync_remote::MemoryChatStore;

    #[test]
    fn valid_transitions() {
        use CreationState::*;

        assert!(is_valid_transition(Announced, Confirmed));
        assert!(is_valid_transition(Announced, Failed));
    }

    #[test]
    fn terminal_states_do_not_move() {
        use CreationState::*;

        for from in [Confirmed, Failed] {
            assert!(is_terminal(from));
            for to in [Announced, Confirmed, Failed] {
                assert!(!is_valid_transition(from, to));
            }
        }
        assert!(!is_terminal(Announced));
        assert!(!is_valid_transition(Announced, Announced));
    }

    #[test]
    fn validate_transition_err() {
        let temp_id = ChatId::temporary_at(5);
        match validate_transition(&temp_id, CreationState::Failed, CreationState::Confirmed) {
            Err(ControlError::InvalidTransition { from, to, .. }) => {
                assert_eq!(from, CreationState::Failed);
                assert_eq!(to, CreationState::Confirmed);
            }
            _ => panic!("expected InvalidTransition error"),
        }
    }

    #[tokio::test]
    async fn confirmed_creation_pairs_ids() {
        let events = ChatEvents::default();
        let mut rx = events.subscribe();
        let store = MemoryChatStore::new("user_1");
        let temp_id = ChatId::temporary_at(1_700_000_000_000);

        let mut creation = OptimisticCreation::announce_as(&events, temp_id.clone(), "Hello");
        let request = NewChat {
            id: Some(ChatId::new("abc123").unwrap()),
            title: Some("Hello".to_string()),
            messages: vec![Message::user("Hello")],
        };
        let chat = creation.resolve(&store, &events, &request).await.unwrap();

        assert_eq!(creation.state(), CreationState::Confirmed);
        assert_eq!(creation.real_id().map(ChatId::as_str), Some("abc123"));
        assert!(matches!(
            rx.recv().await.unwrap(),
            ChatEvent::CreationAnnounced { title, .. } if title == "Hello"
        ));
        match rx.recv().await.unwrap() {
            ChatEvent::CreationConfirmed {
                temp_id: t,
                real_id,
                chat: record,
            } => {
                assert_eq!(t.as_str(), "temp-1700000000000");
                assert_eq!(real_id.as_str(), "abc123");
                assert_eq!(record, chat);
            }
            other => panic!("unexpected event {other:?}"),
        }

        // Resolution happens once
        assert!(creation.resolve(&store, &events, &request).await.is_err());
    }

    #[tokio::test]
    async fn failed_creation_retracts() {
        let events = ChatEvents::default();
        let mut rx = events.subscribe();
        let store = MemoryChatStore::new("user_1");
        store.set_available(false);

        let mut creation = OptimisticCreation::announce(&events, "Hello");
        let err = creation
            .resolve(&store, &events, &NewChat::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ControlError::CreationFailed { .. }));
        assert_eq!(creation.state(), CreationState::Failed);
        assert!(creation.real_id().is_none());

        let _announced = rx.recv().await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            ChatEvent::CreationFailed {
                temp_id: creation.temp_id().clone()
            }
        );
    }
}
