//! REPL state and command handling.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use chat_sync_control::{ChatList, ChatSession, ControlError, MountOutcome};
use chat_sync_core::ChatId;
use thiserror::Error;

use crate::render::{self, LivePrinter};

pub const HELP: &str = "\
Type a message to send it. Commands:
  /new            start a new chat
  /blank          create an empty chat and open it
  /open <id>      open a chat
  /list           list your chats
  /model [id]     show models or select one
  /help           show this help
  /quit           exit
Ctrl-C while a reply streams abandons it; reopening the chat resumes it.
";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    New,
    Blank,
    Open(String),
    List,
    Model(Option<String>),
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: /{0} (try /help)")]
    Unknown(String),

    #[error("/{0} needs an argument")]
    MissingArgument(&'static str),
}

impl Command {
    /// Parse one line of input. Returns `None` for blank lines.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Ok(Some(Self::Say(line.trim_end_matches(['\r', '\n']).to_string())));
        };

        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

        let command = match name {
            "new" => Self::New,
            "blank" => Self::Blank,
            "open" => Self::Open(arg.ok_or(CommandError::MissingArgument("open"))?.to_string()),
            "list" => Self::List,
            "model" => Self::Model(arg.map(str::to_string)),
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

/// Terminal front end over one chat session.
pub struct App {
    session: ChatSession,
    list: Arc<ChatList>,
}

impl App {
    pub fn new(session: ChatSession, list: Arc<ChatList>) -> Self {
        Self { session, list }
    }

    /// Run a command. Returns false when the user asked to quit.
    pub async fn handle(&self, command: Command) -> bool {
        match command {
            Command::Say(text) => self.say(&text).await,
            Command::New => {
                self.session.unmount();
                println!("New chat. Your first message creates it.");
            }
            Command::Blank => match self.list.new_blank_chat().await {
                Ok(chat) => self.open(chat.id).await,
                Err(e) => println!("error: {e}"),
            },
            Command::Open(id) => match ChatId::new(id) {
                Ok(chat_id) => self.open(chat_id).await,
                Err(e) => println!("error: {e}"),
            },
            Command::List => {
                if let Err(e) = self.list.refresh().await {
                    println!("error: {e} (showing last known list)");
                }
                print!(
                    "{}",
                    render::chat_list(&self.list.rows(), self.session.chat_id().as_ref())
                );
            }
            Command::Model(None) => {
                let current = self.session.view().model;
                for model in &self.session.config().models {
                    let marker = if model.id == current { '*' } else { ' ' };
                    println!("{marker} {}  ({})", model.id, model.name);
                }
            }
            Command::Model(Some(id)) => match self.session.select_model(&id) {
                Ok(()) => println!("Model set to {id}."),
                Err(e) => println!("error: {e}"),
            },
            Command::Help => print!("{HELP}"),
            Command::Quit => return false,
        }
        true
    }

    /// Open a chat and show its transcript.
    pub async fn open(&self, chat_id: ChatId) {
        match self.drive(self.session.mount(chat_id.clone())).await {
            Ok(MountOutcome::Fetched) => self.show_transcript(&chat_id, None),
            Ok(MountOutcome::Offline) => {
                self.show_transcript(&chat_id, Some("store unreachable, showing cached copy"));
            }
            Ok(MountOutcome::NotFound) => println!("Chat {chat_id} not found."),
            Ok(MountOutcome::Resumed(turn)) => {
                if !turn.persisted {
                    println!("(reply not saved yet, it will be retried)");
                }
                println!("(resumed an unfinished reply in {chat_id})");
            }
            Ok(MountOutcome::AlreadyResumed) => {}
            Ok(MountOutcome::Streaming) => println!("(a reply is still streaming in {chat_id})"),
            Err(e) => report(&e),
        }
    }

    async fn say(&self, text: &str) {
        match self.drive(self.session.submit(text)).await {
            Ok(turn) => {
                if turn.reply.is_none() {
                    println!("(no reply)");
                }
                if !turn.persisted {
                    println!("(reply not saved yet, it will be retried when you reopen {})", turn.chat_id);
                }
            }
            Err(e) => report(&e),
        }
    }

    fn show_transcript(&self, chat_id: &ChatId, note: Option<&str>) {
        let view = self.session.view();
        let title = view.title.as_deref().unwrap_or("Untitled Chat");
        println!("== {title} ({chat_id}) ==");
        if let Some(note) = note {
            println!("({note})");
        }
        print!("{}", render::transcript(&view.messages));
    }

    /// Await a session operation while echoing the streaming reply.
    ///
    /// Ctrl-C unmounts the session; the operation then ends with
    /// `ControlError::Aborted`.
    async fn drive<T>(
        &self,
        operation: impl Future<Output = chat_sync_control::Result<T>>,
    ) -> chat_sync_control::Result<T> {
        let mut rx = self.session.subscribe();
        let mut printer = LivePrinter::default();
        let mut cancelled = false;
        tokio::pin!(operation);

        loop {
            tokio::select! {
                result = &mut operation => {
                    emit(printer.observe(&self.session.view()));
                    return result;
                }
                changed = rx.changed() => {
                    if changed.is_ok() {
                        let text = printer.observe(&rx.borrow_and_update());
                        emit(text);
                    }
                }
                signal = tokio::signal::ctrl_c(), if !cancelled => {
                    if let Err(e) = signal {
                        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                    }
                    cancelled = true;
                    self.session.unmount();
                }
            }
        }
    }
}

fn emit(text: Option<String>) {
    if let Some(text) = text {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }
}

fn report(error: &ControlError) {
    match error {
        ControlError::Aborted => println!("(abandoned)"),
        ControlError::CreationFailed { .. } => {
            println!("error: {error}\nThe chat was not created; please send your message again.");
        }
        _ if error.is_retriable() => println!("error: {error} (try again)"),
        _ => println!("error: {error}"),
    }
}
