//! HTTP client for the chat storage endpoints.

use std::time::Duration;

use async_trait::async_trait;
use chat_sync_core::{Chat, ChatId, ChatPatch, NewChat};
use reqwest::{Client, Response};
use serde::Deserialize;

use crate::error::{RemoteError, Result};
use crate::ChatStore;

/// Error body returned by the storage endpoints.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: String,
}

/// Client for the chat storage REST API.
#[derive(Debug, Clone)]
pub struct HttpChatStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpChatStore {
    /// Create a new store client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the chat service (e.g., "http://localhost:3000")
    /// * `timeout` - Overall request timeout
    /// * `connect_timeout` - Connection timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a store client around an existing reqwest client.
    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Forward a bearer credential with every request.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Get the base URL of the chat service.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chats_url(&self) -> String {
        format!("{}/api/chats", self.base_url)
    }

    fn chat_url(&self, chat_id: &ChatId) -> String {
        format!("{}/api/chats/{}", self.base_url, chat_id)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Handle API error responses.
    async fn handle_error(response: Response) -> RemoteError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorResponse>(&text)
            .map(|e| e.error)
            .unwrap_or(text);
        RemoteError::from_status(status, message)
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ChatStore for HttpChatStore {
    async fn create(&self, chat: &NewChat) -> Result<Chat> {
        let response = self
            .authorize(self.client.post(self.chats_url()))
            .json(chat)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        let created: Chat = Self::parse(response).await?;
        tracing::debug!(chat_id = %created.id, "Created chat");
        Ok(created)
    }

    async fn get(&self, chat_id: &ChatId) -> Result<Chat> {
        let response = self
            .authorize(self.client.get(self.chat_url(chat_id)))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        Self::parse(response).await
    }

    async fn patch(&self, chat_id: &ChatId, patch: &ChatPatch) -> Result<()> {
        let response = self
            .authorize(self.client.patch(self.chat_url(chat_id)))
            .json(patch)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        tracing::debug!(chat_id = %chat_id, messages = patch.messages.len(), "Patched chat");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Chat>> {
        let response = self
            .authorize(self.client.get(self.chats_url()))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        Self::parse(response).await
    }
}
