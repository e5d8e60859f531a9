//! Plain-text rendering of chat transcripts.

use chat_sync_control::{ChatSummary, SessionView};
use chat_sync_core::{ChatId, Message};

/// Prints a streaming reply as it grows.
///
/// Fed with successive view snapshots; returns only the text that has not
/// been printed yet. Snapshots may be coalesced, so every call diffs against
/// what was already written.
#[derive(Debug, Default)]
pub struct LivePrinter {
    /// Index of the reply being printed, if any.
    reply_index: Option<usize>,
    /// Bytes of the reply already printed.
    printed: usize,
}

impl LivePrinter {
    /// Text to print for the new snapshot, if any.
    pub fn observe(&mut self, view: &SessionView) -> Option<String> {
        let reply = view
            .messages
            .last()
            .filter(|m| view.streaming && m.is_assistant())
            .map(|m| (view.messages.len() - 1, m.content.as_str()));

        match (reply, self.reply_index) {
            (Some((index, content)), Some(current)) if index == current => {
                let fresh = content.get(self.printed..).unwrap_or_default();
                self.printed = content.len();
                (!fresh.is_empty()).then(|| fresh.to_string())
            }
            (Some((index, content)), _) => {
                self.reply_index = Some(index);
                self.printed = content.len();
                Some(format!("assistant> {content}"))
            }
            (None, Some(current)) => {
                // Stream ended, failed or was abandoned
                let tail = view
                    .messages
                    .get(current)
                    .filter(|m| m.is_assistant())
                    .and_then(|m| m.content.get(self.printed..))
                    .unwrap_or_default()
                    .to_string();
                self.reply_index = None;
                self.printed = 0;
                Some(format!("{tail}\n"))
            }
            (None, None) => None,
        }
    }
}

/// Render a whole transcript, one message per paragraph.
pub fn transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}> {}\n", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the chat list, marking the current chat.
pub fn chat_list(rows: &[ChatSummary], current: Option<&ChatId>) -> String {
    if rows.is_empty() {
        return "No chats yet.\n".to_string();
    }

    let mut out = String::new();
    for row in rows {
        let marker = if Some(&row.id) == current { '*' } else { ' ' };
        let suffix = if row.temporary { " (saving...)" } else { "" };
        out.push_str(&format!("{marker} {}  {}{suffix}\n", row.id, row.title));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(messages: Vec<Message>, streaming: bool) -> SessionView {
        SessionView {
            messages,
            streaming,
            ..SessionView::blank("m")
        }
    }

    #[test]
    fn prints_only_new_text() {
        let mut printer = LivePrinter::default();
        let user = Message::user("hi");

        assert_eq!(printer.observe(&view(vec![user.clone()], true)), None);
        assert_eq!(
            printer
                .observe(&view(vec![user.clone(), Message::assistant("Hel")], true))
                .as_deref(),
            Some("assistant> Hel")
        );
        assert_eq!(
            printer
                .observe(&view(vec![user.clone(), Message::assistant("Hello")], true))
                .as_deref(),
            Some("lo")
        );
        assert_eq!(
            printer
                .observe(&view(vec![user.clone(), Message::assistant("Hello!")], false))
                .as_deref(),
            Some("!\n")
        );
        assert_eq!(printer.observe(&view(vec![user], false)), None);
    }

    #[test]
    fn rollback_ends_the_line() {
        let mut printer = LivePrinter::default();
        let user = Message::user("hi");

        printer.observe(&view(vec![user.clone(), Message::assistant("Hel")], true));
        assert_eq!(
            printer.observe(&view(vec![user], false)).as_deref(),
            Some("\n")
        );
    }

    #[test]
    fn coalesced_snapshots_print_whole_reply() {
        let mut printer = LivePrinter::default();
        let user = Message::user("hi");

        // The first snapshot seen already carries several deltas
        assert_eq!(
            printer
                .observe(&view(vec![user.clone(), Message::assistant("Hello")], true))
                .as_deref(),
            Some("assistant> Hello")
        );
        // The last deltas and the end of the stream arrive together
        assert_eq!(
            printer
                .observe(&view(
                    vec![user.clone(), Message::assistant("Hello, world.")],
                    false
                ))
                .as_deref(),
            Some(", world.\n")
        );

        // A later turn starts a fresh line
        let history = vec![user, Message::assistant("Hello, world."), Message::user("more")];
        let mut next = history.clone();
        next.push(Message::assistant("Sure"));
        assert_eq!(printer.observe(&view(history, false)), None);
        assert_eq!(
            printer.observe(&view(next, true)).as_deref(),
            Some("assistant> Sure")
        );
    }

    #[test]
    fn chat_list_marks_current_and_unsaved() {
        let current = ChatId::new("abc123").unwrap();
        let rows = vec![
            ChatSummary {
                id: ChatId::temporary_at(5),
                title: "Draft".to_string(),
                temporary: true,
            },
            ChatSummary {
                id: current.clone(),
                title: "Trip".to_string(),
                temporary: false,
            },
        ];

        let out = chat_list(&rows, Some(&current));
        assert_eq!(out, "  temp-5  Draft (saving...)\n* abc123  Trip\n");
        assert_eq!(chat_list(&[], None), "No chats yet.\n");
    }

    #[test]
    fn transcript_lists_roles() {
        let out = transcript(&[Message::user("hi"), Message::assistant("hello")]);
        assert_eq!(out, "user> hi\n\nassistant> hello\n");
    }
}
