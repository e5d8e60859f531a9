//! Completion stream handling for chat-sync.
//!
//! The completion endpoint answers with a `text/event-stream` body of
//! `data: <json>` lines terminated by `data: [DONE]`. This crate turns that
//! body into text deltas and folds them into a growing assistant message:
//!
//! ```text
//!  bytes ──▶ SseDecoder ──▶ LineOutcome ──▶ decode_stream ──▶ Delta ──▶ fold_delta
//!            (utf-8 carry,                  (malformed lines          (append to last
//!             line split)                    logged + skipped)         assistant message)
//! ```
//!
//! # Example
//!
//! ```
//! use chat_sync_core::Message;
//! use chat_sync_stream::{LineOutcome, SseDecoder, TranscriptBuilder};
//!
//! let mut decoder = SseDecoder::new();
//! let mut transcript = TranscriptBuilder::new(vec![Message::user("Hi")]);
//!
//! let body = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\
//!              data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\
//!              data: [DONE]\n";
//! for outcome in decoder.feed(body) {
//!     if let LineOutcome::Delta(delta) = outcome {
//!         transcript.push(&delta);
//!     }
//! }
//! assert_eq!(transcript.reply_text(), Some("Hello"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod completion;
pub mod decoder;
pub mod error;
pub mod transcript;

pub use completion::{
    ByteStream, CompletionClient, CompletionRequest, HttpCompletionClient, PromptMessage,
};
pub use decoder::{decode_stream, parse_line, Delta, LineOutcome, SseDecoder};
pub use error::{Result, StreamError};
pub use transcript::{fold_delta, TranscriptBuilder};
