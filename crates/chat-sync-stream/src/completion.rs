//! HTTP client for the completion endpoint.
//!
//! The endpoint accepts `{ messages, model }` and answers with a chunked
//! event-stream body. The client only opens the request and hands back the
//! raw byte stream; decoding lives in [`crate::decoder`].

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chat_sync_core::{Message, Role};
use futures::{Stream, StreamExt};
use serde::Serialize;

use crate::error::{Result, StreamError};

/// Path of the completion endpoint relative to the base URL.
const COMPLETION_PATH: &str = "/api/chat";

/// Raw response body of a completion request.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// One prompt message as sent to the completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    /// Message author.
    pub role: Role,
    /// Message text.
    pub content: String,
}

/// Request body of the completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionRequest {
    /// Ordered prompt transcript.
    pub messages: Vec<PromptMessage>,
    /// Completion model id.
    pub model: String,
    /// Always true; the client only consumes streamed responses.
    pub stream: bool,
}

impl CompletionRequest {
    /// Build a request from a transcript, dropping message ids.
    #[must_use]
    pub fn new(messages: &[Message], model: impl Into<String>) -> Self {
        Self {
            messages: messages
                .iter()
                .map(|m| PromptMessage {
                    role: m.role,
                    content: m.content.clone(),
                })
                .collect(),
            model: model.into(),
            stream: true,
        }
    }
}

/// Opens completion streams.
///
/// This trait abstracts the completion endpoint, allowing scripted
/// implementations in tests.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Issue a completion request and return the response body as a byte stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the endpoint answers
    /// with a non-success status.
    async fn open(&self, request: &CompletionRequest) -> Result<ByteStream>;
}

/// Completion client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpCompletionClient {
    /// Create a client with the given connect timeout.
    ///
    /// No overall request timeout is set, since a response body may stream
    /// for as long as the model keeps generating.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client around an existing reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
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

    /// Get the base URL of the completion service.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn open(&self, request: &CompletionRequest) -> Result<ByteStream> {
        let url = format!("{}{COMPLETION_PATH}", self.base_url);

        let mut builder = self.client.post(&url).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Completion endpoint rejected request");
            return Err(StreamError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Opened completion stream"
        );
        Ok(Box::pin(response.bytes_stream().map(|chunk| chunk.map_err(StreamError::from))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode_stream;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SSE_BODY: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\
                            data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\
                            data: [DONE]\n";

    #[test]
    fn request_drops_message_ids() {
        let request = CompletionRequest::new(&[Message::user("Hi")], "google/gemini-2.5-flash");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "messages": [{"role": "user", "content": "Hi"}],
                "model": "google/gemini-2.5-flash",
                "stream": true
            })
        );
    }

    #[tokio::test]
    async fn streams_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(header("authorization", "Bearer tok"))
            .and(body_partial_json(serde_json::json!({"model": "m"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(SSE_BODY),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(format!("{}/", server.uri()), Duration::from_secs(5))
            .unwrap()
            .with_token(Some("tok".to_string()));
        let body = client
            .open(&CompletionRequest::new(&[Message::user("Hi")], "m"))
            .await
            .unwrap();

        let text: Vec<String> = decode_stream(body)
            .map(|d| d.unwrap().text)
            .collect()
            .await;
        assert_eq!(text, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn non_success_carries_upstream_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let result = client
            .open(&CompletionRequest::new(&[Message::user("Hi")], "m"))
            .await;

        match result {
            Err(StreamError::Upstream { status, body }) => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }
}
