//! Session control for chat-sync.
//!
//! This crate ties the completion stream, the local cache and the remote
//! store together behind two regions:
//!
//! - [`ChatSession`]: the chat view. Mounts a chat, submits turns, streams
//!   replies and resumes turns that were interrupted before being persisted.
//! - [`ChatList`]: the list of the caller's chats, reconciled with
//!   optimistic creations through [`ChatEvents`].
//!
//! ```text
//!             submit                        deltas
//!   user ───────────────▶ ChatSession ◀─────────────── CompletionClient
//!                          │  │    │
//!            every delta   │  │    │ final transcript
//!          ┌───────────────┘  │    └──────────────────▶ ChatStore
//!          ▼                  │ announce / confirm / fail
//!     DurableCache            ▼
//!     (pending flag)      ChatEvents ──────────────────▶ ChatList
//! ```
//!
//! The cache entry of a chat is marked pending from the moment a user turn is
//! written until the remote store accepts the final transcript. Mounting a
//! chat with a pending entry re-issues the completion from the cached
//! transcript instead of fetching the remote record.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod creation;
pub mod error;
pub mod events;
pub mod list;
pub mod session;
pub mod types;

pub use creation::{CreationState, OptimisticCreation};
pub use error::{ControlError, Result};
pub use events::{ChatEvent, ChatEvents, DEFAULT_EVENT_CAPACITY};
pub use list::{ChatList, ChatSummary};
pub use session::ChatSession;
pub use types::{ModelOption, MountOutcome, SessionConfig, SessionView, TurnOutcome};
