//! The chat view controller.
//!
//! A `ChatSession` owns the in-memory state of one chat view and keeps it in
//! step with the local cache and the remote store. It drives two entry paths:
//!
//! - **mount**: seed from the cache, then either resume a pending turn from
//!   the cached transcript or overwrite local state with the remote record
//! - **submit**: append a user turn, stream the reply, mirror every delta
//!   into the cache and persist the final transcript. The first turn of a new
//!   chat goes through optimistic creation first.
//!
//! At most one turn streams per session. [`ChatSession::unmount`] abandons
//! whatever is in flight: the response body is dropped and the partial reply
//! is rolled back, leaving the cache entry pending so a later mount resumes.

use std::sync::Arc;

use chat_sync_core::{derive_title, ChatId, ChatPatch, Message, NewChat, DEFAULT_TITLE};
use chat_sync_remote::ChatStore;
use chat_sync_store::{CacheEntry, CachePatch, DurableCache};
use chat_sync_stream::{decode_stream, CompletionClient, CompletionRequest, TranscriptBuilder};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::creation::OptimisticCreation;
use crate::error::{ControlError, Result};
use crate::events::ChatEvents;
use crate::types::{MountOutcome, SessionConfig, SessionView, TurnOutcome};

/// Frees the turn slot when a turn ends, however it ends.
struct TurnGuard<'a>(&'a watch::Sender<Option<u64>>);

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(None);
    }
}

/// Controller for one chat view.
pub struct ChatSession {
    store: Arc<dyn ChatStore>,
    completions: Arc<dyn CompletionClient>,
    cache: Arc<DurableCache>,
    events: ChatEvents,
    config: SessionConfig,
    view: watch::Sender<SessionView>,
    /// Bumped by `unmount`; work started under an older value is abandoned.
    mount_epoch: watch::Sender<u64>,
    /// Chat whose pending turn has already been resumed in this mount.
    resumed: Mutex<Option<ChatId>>,
    /// Key of the mounted chat in the cache. Moves from the temporary id to
    /// the real one as soon as a creation is confirmed.
    cache_id: Mutex<Option<ChatId>>,
    /// Mount epoch of the turn holding the slot, if any.
    turn: watch::Sender<Option<u64>>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("view", &*self.view.borrow())
            .field("turn", &*self.turn.borrow())
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    /// Create a session with no chat mounted.
    #[must_use]
    pub fn new(
        store: Arc<dyn ChatStore>,
        completions: Arc<dyn CompletionClient>,
        cache: Arc<DurableCache>,
        events: ChatEvents,
        config: SessionConfig,
    ) -> Self {
        let (view, _) = watch::channel(SessionView::blank(config.default_model.clone()));
        let (mount_epoch, _) = watch::channel(0);
        let (turn, _) = watch::channel(None);
        Self {
            store,
            completions,
            cache,
            events,
            config,
            view,
            mount_epoch,
            resumed: Mutex::new(None),
            cache_id: Mutex::new(None),
            turn,
        }
    }

    /// Watch the view state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.subscribe()
    }

    /// Snapshot of the view state.
    #[must_use]
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Chat currently shown.
    #[must_use]
    pub fn chat_id(&self) -> Option<ChatId> {
        self.view.borrow().chat_id.clone()
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Event channel shared with other regions.
    #[must_use]
    pub const fn events(&self) -> &ChatEvents {
        &self.events
    }

    /// Whether a turn is streaming.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.turn.borrow().is_some()
    }

    // =========================================================================
    // Mount / Unmount
    // =========================================================================

    /// Show an existing chat.
    ///
    /// The cached entry, if any, is rendered immediately. A pending entry is
    /// resumed by streaming a reply to its transcript without contacting the
    /// chat store; otherwise the remote record is fetched and replaces the
    /// cached state.
    ///
    /// Mounting another chat abandons the current one first. A resume waits
    /// for the abandoned turn to unwind. Mounting the chat that is streaming
    /// leaves the view alone.
    ///
    /// # Errors
    ///
    /// Returns an error if a resumed turn fails, or `ControlError::Aborted` if
    /// the session is unmounted first.
    pub async fn mount(&self, chat_id: ChatId) -> Result<MountOutcome> {
        let mounted = self.cache_id.lock().clone();
        if mounted.as_ref() == Some(&chat_id) {
            if *self.turn.borrow() == Some(self.current_epoch()) {
                tracing::debug!(chat_id = %chat_id, "Chat is already streaming");
                return Ok(MountOutcome::Streaming);
            }
        } else {
            self.unmount();
        }

        let cached = self.cache.read(&chat_id);
        let pending = cached.as_ref().is_some_and(|e| e.pending);
        if pending && self.resumed.lock().as_ref() == Some(&chat_id) {
            tracing::debug!(chat_id = %chat_id, "Pending turn already resumed for this mount");
            return Ok(MountOutcome::AlreadyResumed);
        }

        let epoch = self.current_epoch();
        self.seed_view(&chat_id, cached.as_ref());

        match cached {
            Some(entry) if entry.pending => self.resume(chat_id, entry, epoch).await,
            _ => self.fetch(chat_id, epoch).await,
        }
    }

    /// Abandon the current chat view.
    ///
    /// Any in-flight fetch or turn stops at its next suspension point and
    /// its response is dropped. The view is reset to a blank new chat.
    pub fn unmount(&self) {
        {
            let mut cache_id = self.cache_id.lock();
            self.mount_epoch.send_modify(|epoch| *epoch += 1);
            *cache_id = None;
        }
        *self.resumed.lock() = None;
        self.view
            .send_replace(SessionView::blank(self.config.default_model.clone()));
    }

    fn seed_view(&self, chat_id: &ChatId, cached: Option<&CacheEntry>) {
        *self.cache_id.lock() = Some(chat_id.clone());

        let model = cached
            .and_then(|e| e.model.clone())
            .filter(|m| self.config.model(m).is_some())
            .unwrap_or_else(|| self.config.default_model.clone());

        self.view.send_replace(SessionView {
            chat_id: Some(chat_id.clone()),
            title: cached.and_then(|e| e.title.clone()),
            model,
            messages: cached.map(|e| e.messages.clone()).unwrap_or_default(),
            waiting: false,
            streaming: false,
            error: None,
        });
    }

    async fn fetch(&self, chat_id: ChatId, epoch: u64) -> Result<MountOutcome> {
        let fetched = tokio::select! {
            biased;
            () = self.aborted(epoch) => return Err(ControlError::Aborted),
            fetched = self.store.get(&chat_id) => fetched,
        };

        match fetched {
            Ok(chat) => {
                let model = chat
                    .model
                    .clone()
                    .unwrap_or_else(|| self.view.borrow().model.clone());
                self.update_view(epoch, |v| {
                    v.messages.clone_from(&chat.messages);
                    v.title.clone_from(&chat.title);
                    v.model.clone_from(&model);
                });
                let _ = self.cache.write(
                    &chat_id,
                    CachePatch::from_chat(&chat).with_model(Some(model)),
                );
                tracing::debug!(chat_id = %chat_id, messages = chat.messages.len(), "Loaded chat");
                Ok(MountOutcome::Fetched)
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(chat_id = %chat_id, "Chat not found");
                Ok(MountOutcome::NotFound)
            }
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Failed to load chat, showing cached state");
                Ok(MountOutcome::Offline)
            }
        }
    }

    async fn resume(&self, chat_id: ChatId, entry: CacheEntry, epoch: u64) -> Result<MountOutcome> {
        *self.resumed.lock() = Some(chat_id.clone());
        let _turn = self.begin_turn(epoch).await?;

        let settled = tokio::select! {
            biased;
            () = self.aborted(epoch) => false,
            () = tokio::time::sleep(self.config.resume_delay()) => true,
        };
        if !settled {
            return Err(ControlError::Aborted);
        }

        // A trailing assistant message is a reply that was never confirmed
        let mut prompt = entry.messages;
        if prompt.last().is_some_and(Message::is_assistant) {
            prompt.pop();
        }
        if !prompt.last().is_some_and(Message::is_user) {
            tracing::debug!(chat_id = %chat_id, "Pending entry has nothing to answer");
            let _ = self.cache.write(&chat_id, CachePatch::pending(false));
            return self.fetch(chat_id, epoch).await;
        }

        tracing::info!(chat_id = %chat_id, messages = prompt.len(), "Resuming pending turn");
        let outcome = self.stream_turn(&chat_id, prompt, epoch).await?;
        Ok(MountOutcome::Resumed(outcome))
    }

    // =========================================================================
    // Turns
    // =========================================================================

    /// Submit a user message and stream the reply.
    ///
    /// With no chat mounted this creates a chat first.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::EmptyMessage` for blank input,
    /// `ControlError::TurnInProgress` if a turn is already streaming in this
    /// mount,
    /// `ControlError::CreationFailed` if a new chat cannot be created, and
    /// stream errors from the completion endpoint.
    pub async fn submit(&self, text: &str) -> Result<TurnOutcome> {
        if text.trim().is_empty() {
            return Err(ControlError::EmptyMessage);
        }
        let epoch = self.current_epoch();
        let _turn = self.begin_turn(epoch).await?;

        match self.chat_id() {
            None => self.create_and_stream(text, epoch).await,
            Some(chat_id) => self.continue_chat(chat_id, text, epoch).await,
        }
    }

    /// Select the completion model for this chat.
    ///
    /// The choice is stored with the chat's cache entry, under its real id
    /// once a creation has been confirmed.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::UnknownModel` if the model is not in the catalog.
    pub fn select_model(&self, model: &str) -> Result<()> {
        if self.config.model(model).is_none() {
            return Err(ControlError::UnknownModel(model.to_string()));
        }

        self.view.send_modify(|v| v.model = model.to_string());
        let cache_id = self.cache_id.lock().clone();
        if let Some(chat_id) = cache_id {
            let _ = self.cache.write(&chat_id, CachePatch::model(model));
        }
        Ok(())
    }

    async fn create_and_stream(&self, text: &str, epoch: u64) -> Result<TurnOutcome> {
        let user = Message::user(text);
        let title = derive_title(std::slice::from_ref(&user), self.config.title_max_chars)
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let model = self.view.borrow().model.clone();
        let prompt = vec![user];

        let mut creation = OptimisticCreation::announce(&self.events, title.clone());
        let temp_id = creation.temp_id().clone();

        self.set_cache_id(epoch, Some(temp_id.clone()));
        self.update_view(epoch, |v| {
            v.chat_id = Some(temp_id.clone());
            v.title = Some(title.clone());
            v.messages.clone_from(&prompt);
            v.waiting = true;
            v.error = None;
        });
        let _ = self.cache.write(
            &temp_id,
            CachePatch::messages(prompt.clone())
                .with_title(Some(title.clone()))
                .with_model(Some(model))
                .with_pending(true),
        );

        let request = NewChat {
            id: None,
            title: Some(title),
            messages: prompt.clone(),
        };
        let chat = match creation
            .resolve(self.store.as_ref(), &self.events, &request)
            .await
        {
            Ok(chat) => chat,
            Err(e) => {
                self.cache.remove(&temp_id);
                self.set_cache_id(epoch, None);
                let message = e.to_string();
                self.update_view(epoch, |v| {
                    v.chat_id = None;
                    v.title = None;
                    v.messages.clear();
                    v.waiting = false;
                    v.error = Some(message.clone());
                });
                return Err(e);
            }
        };

        let real_id = chat.id.clone();
        *self.resumed.lock() = Some(real_id.clone());
        let _ = self.cache.alias(&temp_id, &real_id);
        self.set_cache_id(epoch, Some(real_id.clone()));
        if self.is_aborted(epoch) {
            return Err(ControlError::Aborted);
        }

        let result = self.stream_turn(&real_id, prompt, epoch).await;
        self.update_view(epoch, |v| {
            v.chat_id = Some(real_id.clone());
            v.title.clone_from(&chat.title);
        });
        result
    }

    async fn continue_chat(&self, chat_id: ChatId, text: &str, epoch: u64) -> Result<TurnOutcome> {
        let (mut messages, title_unset) = {
            let view = self.view.borrow();
            let unset = view
                .title
                .as_deref()
                .map_or(true, |t| t.is_empty() || t == DEFAULT_TITLE);
            (view.messages.clone(), unset)
        };
        messages.push(Message::user(text));
        let title = if title_unset {
            derive_title(&messages, self.config.title_max_chars)
        } else {
            None
        };

        self.update_view(epoch, |v| {
            v.messages.clone_from(&messages);
            if title.is_some() {
                v.title.clone_from(&title);
            }
            v.waiting = true;
            v.error = None;
        });
        let _ = self.cache.write(
            &chat_id,
            CachePatch::messages(messages.clone())
                .with_title(title.clone())
                .with_pending(true),
        );

        let patch = ChatPatch {
            messages: messages.clone(),
            title,
        };
        if let Err(e) = self.store.patch(&chat_id, &patch).await {
            tracing::warn!(chat_id = %chat_id, error = %e, "Failed to persist user turn, continuing");
        }
        if self.is_aborted(epoch) {
            return Err(ControlError::Aborted);
        }

        self.stream_turn(&chat_id, messages, epoch).await
    }

    /// Stream one assistant reply to `prompt`, then persist the result.
    async fn stream_turn(
        &self,
        chat_id: &ChatId,
        prompt: Vec<Message>,
        epoch: u64,
    ) -> Result<TurnOutcome> {
        let model = self.view.borrow().model.clone();
        let request = CompletionRequest::new(&prompt, model);
        self.update_view(epoch, |v| {
            v.waiting = true;
            v.streaming = true;
            v.error = None;
        });

        let opened = tokio::select! {
            biased;
            () = self.aborted(epoch) => return Err(self.abandon(chat_id, &prompt)),
            opened = self.completions.open(&request) => opened,
        };
        let body = match opened {
            Ok(body) => body,
            Err(e) => return Err(self.fail_turn(chat_id, &prompt, epoch, e.into())),
        };
        tracing::debug!(chat_id = %chat_id, model = %request.model, "Streaming reply");

        let mut deltas = std::pin::pin!(decode_stream(body));
        let mut transcript = TranscriptBuilder::new(prompt);
        loop {
            let next = tokio::select! {
                biased;
                () = self.aborted(epoch) => return Err(self.abandon(chat_id, transcript.prompt())),
                next = deltas.next() => next,
            };
            match next {
                Some(Ok(delta)) => {
                    transcript.push(&delta);
                    let messages = transcript.messages().to_vec();
                    self.update_view(epoch, |v| {
                        v.waiting = false;
                        v.messages.clone_from(&messages);
                    });
                    let _ = self.cache.write(chat_id, CachePatch::messages(messages));
                }
                Some(Err(e)) => {
                    return Err(self.fail_turn(chat_id, transcript.prompt(), epoch, e.into()));
                }
                None => break,
            }
        }

        let deltas = transcript.delta_count();
        let reply = transcript.reply().cloned();
        let messages = transcript.into_messages();
        self.update_view(epoch, |v| {
            v.waiting = false;
            v.streaming = false;
            v.messages.clone_from(&messages);
        });
        let _ = self.cache.write(chat_id, CachePatch::messages(messages.clone()));

        let patch = ChatPatch {
            messages,
            title: None,
        };
        let persisted = match self.store.patch(chat_id, &patch).await {
            Ok(()) => {
                let _ = self.cache.write(chat_id, CachePatch::pending(false));
                true
            }
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Failed to persist reply, keeping it pending locally");
                false
            }
        };

        tracing::debug!(chat_id = %chat_id, deltas, persisted, "Turn complete");
        Ok(TurnOutcome {
            chat_id: chat_id.clone(),
            reply,
            deltas,
            persisted,
        })
    }

    /// Roll back a failed turn to its prompt and surface the error.
    fn fail_turn(
        &self,
        chat_id: &ChatId,
        prompt: &[Message],
        epoch: u64,
        error: ControlError,
    ) -> ControlError {
        tracing::warn!(chat_id = %chat_id, error = %error, "Turn failed");
        let message = error.to_string();
        self.update_view(epoch, |v| {
            v.messages = prompt.to_vec();
            v.waiting = false;
            v.streaming = false;
            v.error = Some(message.clone());
        });
        let _ = self.cache.write(chat_id, CachePatch::messages(prompt.to_vec()));
        error
    }

    /// Roll back the cache after an unmount; the view already moved on.
    fn abandon(&self, chat_id: &ChatId, prompt: &[Message]) -> ControlError {
        tracing::debug!(chat_id = %chat_id, "Turn abandoned");
        let _ = self.cache.write(chat_id, CachePatch::messages(prompt.to_vec()));
        ControlError::Aborted
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Claim the turn slot for `epoch`.
    ///
    /// A turn left over from an earlier mount is waited out; it unwinds as
    /// soon as it observes the unmount.
    async fn begin_turn(&self, epoch: u64) -> Result<TurnGuard<'_>> {
        let mut rx = self.turn.subscribe();
        let settled = tokio::select! {
            biased;
            () = self.aborted(epoch) => false,
            settled = async {
                rx.wait_for(|turn| !matches!(turn, Some(owner) if *owner != epoch))
                    .await
                    .is_ok()
            } => settled,
        };
        if !settled {
            return Err(ControlError::Aborted);
        }

        let claimed = self.turn.send_if_modified(|turn| {
            if turn.is_some() {
                return false;
            }
            *turn = Some(epoch);
            true
        });
        if claimed {
            Ok(TurnGuard(&self.turn))
        } else {
            Err(ControlError::TurnInProgress)
        }
    }

    /// Point the cache key at `chat_id`, unless the mount has moved on.
    fn set_cache_id(&self, epoch: u64, chat_id: Option<ChatId>) {
        let mut cache_id = self.cache_id.lock();
        if !self.is_aborted(epoch) {
            *cache_id = chat_id;
        }
    }

    fn current_epoch(&self) -> u64 {
        *self.mount_epoch.borrow()
    }

    fn is_aborted(&self, epoch: u64) -> bool {
        self.current_epoch() != epoch
    }

    /// Resolves once the session is unmounted after `epoch` was taken.
    async fn aborted(&self, epoch: u64) {
        let mut rx = self.mount_epoch.subscribe();
        if rx.wait_for(|current| *current != epoch).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Apply a view change unless the session was unmounted since `epoch`.
    fn update_view(&self, epoch: u64, f: impl FnOnce(&mut SessionView)) {
        if !self.is_aborted(epoch) {
            self.view.send_modify(f);
        }
    }
}
