//! Error types for completion streaming.

use thiserror::Error;

/// A result type using `StreamError`.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors that abort a completion stream.
///
/// Malformed chunks are not errors: the decoder logs and skips them.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The request or the body read failed at the transport level.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The completion endpoint answered with a non-success status.
    #[error("completion endpoint returned {status}: {body}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Upstream response body.
        body: String,
    },
}
