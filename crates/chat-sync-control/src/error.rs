//! Error types for the session controller.

use chat_sync_core::ChatId;
use chat_sync_remote::RemoteError;
use chat_sync_stream::StreamError;
use thiserror::Error;

use crate::creation::CreationState;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in session operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// A turn is already streaming in this session.
    #[error("a turn is already in progress")]
    TurnInProgress,

    /// The submitted message has no content.
    #[error("message is empty")]
    EmptyMessage,

    /// The model is not in the configured catalog.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// The requested creation state transition is not valid.
    #[error("invalid creation transition for chat {temp_id}: cannot transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// Temporary id of the creation.
        temp_id: ChatId,
        /// The current state.
        from: CreationState,
        /// The requested target state.
        to: CreationState,
    },

    /// The remote store rejected an optimistic creation.
    #[error("failed to create chat {temp_id}: {source}")]
    CreationFailed {
        /// Temporary id that was retracted.
        temp_id: ChatId,
        /// Underlying store error.
        #[source]
        source: RemoteError,
    },

    /// Remote store error.
    #[error("remote store error: {0}")]
    Remote(#[from] RemoteError),

    /// Completion stream error.
    #[error("completion stream error: {0}")]
    Stream(#[from] StreamError),

    /// The session was unmounted while the turn was running.
    #[error("turn aborted")]
    Aborted,
}

impl ControlError {
    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Remote(e) | Self::CreationFailed { source: e, .. } => e.is_retriable(),
            Self::Stream(StreamError::Http(_)) => true,
            Self::Stream(StreamError::Upstream { status, .. }) => *status >= 500 || *status == 429,
            Self::TurnInProgress
            | Self::EmptyMessage
            | Self::UnknownModel(_)
            | Self::InvalidTransition { .. }
            | Self::Aborted => false,
        }
    }
}
