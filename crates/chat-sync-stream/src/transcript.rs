//! Folding deltas into a growing assistant message.

use chat_sync_core::Message;

use crate::decoder::Delta;

/// Fold one delta into a message list.
///
/// Appends to the last message when it is an assistant message, otherwise
/// pushes a new assistant message seeded with the delta.
#[must_use]
pub fn fold_delta(mut messages: Vec<Message>, delta: &Delta) -> Vec<Message> {
    match messages.last_mut() {
        Some(last) if last.is_assistant() => last.content.push_str(&delta.text),
        _ => messages.push(Message::assistant(delta.text.clone())),
    }
    messages
}

/// Accumulates one assistant turn on top of a fixed prompt.
///
/// The prompt is kept so a failed or abandoned turn can be rolled back to
/// it without re-reading any other state.
#[derive(Debug, Clone)]
pub struct TranscriptBuilder {
    prompt: Vec<Message>,
    messages: Vec<Message>,
    deltas: usize,
}

impl TranscriptBuilder {
    /// Start a turn from the given prompt transcript.
    #[must_use]
    pub fn new(prompt: Vec<Message>) -> Self {
        Self {
            messages: prompt.clone(),
            prompt,
            deltas: 0,
        }
    }

    /// Fold a delta and return the full reply text so far.
    pub fn push(&mut self, delta: &Delta) -> &str {
        let messages = std::mem::take(&mut self.messages);
        self.messages = fold_delta(messages, delta);
        self.deltas += 1;
        self.messages.last().map_or("", |m| m.content.as_str())
    }

    /// The in-progress assistant message, if any delta has arrived.
    #[must_use]
    pub fn reply(&self) -> Option<&Message> {
        if self.deltas == 0 {
            return None;
        }
        self.messages.last().filter(|m| m.is_assistant())
    }

    /// Text of the in-progress assistant message.
    #[must_use]
    pub fn reply_text(&self) -> Option<&str> {
        self.reply().map(|m| m.content.as_str())
    }

    /// Current transcript: the prompt plus the reply so far.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The transcript the turn started from.
    #[must_use]
    pub fn prompt(&self) -> &[Message] {
        &self.prompt
    }

    /// Number of deltas folded so far.
    #[must_use]
    pub const fn delta_count(&self) -> usize {
        self.deltas
    }

    /// Consume the builder, returning the current transcript.
    #[must_use]
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Consume the builder, returning the prompt and discarding the reply.
    #[must_use]
    pub fn into_prompt(self) -> Vec<Message> {
        self.prompt
    }
}
