//! Error types for the remote chat store.

use thiserror::Error;

/// A result type using `RemoteError`.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Errors that can occur when talking to the chat store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The chat does not exist or is not owned by the caller.
    ///
    /// The two cases are deliberately indistinguishable.
    #[error("chat not found")]
    NotFound,

    /// The store returned another non-success response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl RemoteError {
    /// Map a non-success status to an error, folding ownership failures
    /// into `NotFound`.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 | 403 | 404 => Self::NotFound,
            _ => Self::Api {
                status,
                message: message.into(),
            },
        }
    }

    /// Returns true if the chat is missing or not visible to the caller.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            Self::NotFound | Self::Parse(_) => false,
        }
    }
}
