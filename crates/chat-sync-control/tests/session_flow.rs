//! End-to-end session flows over HTTP with a RocksDB-backed cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chat_sync_control::{
    ChatEvent, ChatEvents, ChatList, ChatSession, ControlError, MountOutcome, SessionConfig,
};
use chat_sync_core::{ChatId, Message};
use chat_sync_remote::HttpChatStore;
use chat_sync_store::{CacheConfig, CachePatch, DurableCache, RocksCache};
use chat_sync_stream::{
    ByteStream, CompletionClient, CompletionRequest, HttpCompletionClient, StreamError,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SSE_BODY: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\
                        data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\
                        data: [DONE]\n";

fn chat_json(id: &str, messages: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "user_id": "user_1",
        "title": "Plan a trip",
        "messages": messages,
        "created_at": "2025-01-01T00:00:00Z",
        "updated_at": "2025-01-01T00:00:00Z"
    })
}

struct Harness {
    session: ChatSession,
    cache: Arc<DurableCache>,
    events: ChatEvents,
    store: Arc<HttpChatStore>,
    _dir: TempDir,
}

fn harness_with(server: &MockServer, completions: Arc<dyn CompletionClient>) -> Harness {
    let dir = TempDir::new().unwrap();
    let backend = RocksCache::open(dir.path()).unwrap();
    let cache = Arc::new(DurableCache::new(Arc::new(backend), CacheConfig::default()));
    let store = Arc::new(
        HttpChatStore::new(server.uri(), Duration::from_secs(5), Duration::from_secs(5)).unwrap(),
    );
    let events = ChatEvents::default();
    let config = SessionConfig {
        resume_delay_ms: 0,
        ..SessionConfig::default()
    };
    let session = ChatSession::new(
        store.clone(),
        completions,
        cache.clone(),
        events.clone(),
        config,
    );
    Harness {
        session,
        cache,
        events,
        store,
        _dir: dir,
    }
}

fn harness(server: &MockServer) -> Harness {
    let completions =
        HttpCompletionClient::new(server.uri(), Duration::from_secs(5)).unwrap();
    harness_with(server, Arc::new(completions))
}

async fn mock_completion(server: &MockServer, expect: u64) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(SSE_BODY),
        )
        .expect(expect)
        .mount(server)
        .await;
}

async fn mock_patch(server: &MockServer, id: &str, status: u16) {
    Mock::given(method("PATCH"))
        .and(path(format!("/api/chats/{id}")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

#[tokio::test]
async fn first_message_pairs_temp_and_real_ids() {
    let server = MockServer::start().await;
    let stored = chat_json(
        "abc123",
        &serde_json::json!([{"id": "1", "role": "user", "content": "Plan a trip"}]),
    );
    Mock::given(method("POST"))
        .and(path("/api/chats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stored))
        .expect(1)
        .mount(&server)
        .await;
    mock_completion(&server, 1).await;
    mock_patch(&server, "abc123", 200).await;

    let h = harness(&server);
    let mut rx = h.events.subscribe();
    let list = ChatList::new(h.store.clone());

    let outcome = h.session.submit("Plan a trip").await.unwrap();
    assert_eq!(outcome.chat_id.as_str(), "abc123");
    assert!(outcome.persisted);

    let announced = rx.recv().await.unwrap();
    let confirmed = rx.recv().await.unwrap();
    assert!(announced.temp_id().is_temporary());
    assert_eq!(announced.temp_id(), confirmed.temp_id());
    assert!(matches!(
        &confirmed,
        ChatEvent::CreationConfirmed { real_id, .. } if real_id.as_str() == "abc123"
    ));

    list.apply(&announced);
    list.apply(&confirmed);
    assert_eq!(list.rows().len(), 1);
    assert_eq!(list.rows()[0].id.as_str(), "abc123");

    assert_eq!(h.cache.len(), 1);
    assert!(h.cache.read(announced.temp_id()).is_none());
    let entry = h.cache.read(&outcome.chat_id).unwrap();
    assert!(!entry.pending);
    assert_eq!(entry.messages.len(), 2);
    assert_eq!(entry.messages[1].content, "Hello");
    assert_eq!(h.session.chat_id(), Some(outcome.chat_id));
}

#[tokio::test]
async fn pending_mount_streams_without_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chats/abc123"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    mock_completion(&server, 1).await;
    mock_patch(&server, "abc123", 200).await;

    let h = harness(&server);
    let chat_id = ChatId::new("abc123").unwrap();
    let _ = h.cache.write(
        &chat_id,
        CachePatch::messages(vec![Message::user("Plan a trip")]).with_pending(true),
    );

    let outcome = h.session.mount(chat_id.clone()).await.unwrap();
    let MountOutcome::Resumed(turn) = outcome else {
        panic!("expected resume, got {outcome:?}");
    };
    assert!(turn.persisted);
    assert_eq!(turn.reply.unwrap().content, "Hello");

    let entry = h.cache.read(&chat_id).unwrap();
    assert!(!entry.pending);
    assert_eq!(entry.messages.len(), 2);
}

#[tokio::test]
async fn mount_replaces_cache_with_remote_record() {
    let server = MockServer::start().await;
    let messages = serde_json::json!([
        {"id": "1", "role": "user", "content": "Plan a trip"},
        {"id": "2", "role": "assistant", "content": "Where to?"}
    ]);
    Mock::given(method("GET"))
        .and(path("/api/chats/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_json("abc123", &messages)))
        .expect(1)
        .mount(&server)
        .await;
    mock_completion(&server, 0).await;

    let h = harness(&server);
    let chat_id = ChatId::new("abc123").unwrap();
    let _ = h.cache.write(
        &chat_id,
        CachePatch::messages(vec![Message::user("stale")]),
    );

    assert_eq!(
        h.session.mount(chat_id.clone()).await.unwrap(),
        MountOutcome::Fetched
    );
    let entry = h.cache.read(&chat_id).unwrap();
    assert_eq!(entry.messages.len(), 2);
    assert_eq!(entry.messages[1].content, "Where to?");
    assert_eq!(h.session.view().title.as_deref(), Some("Plan a trip"));
}

#[tokio::test]
async fn unreachable_store_shows_cached_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chats/abc123"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let h = harness(&server);
    let chat_id = ChatId::new("abc123").unwrap();
    let _ = h.cache.write(
        &chat_id,
        CachePatch::messages(vec![Message::user("cached")]),
    );

    assert_eq!(
        h.session.mount(chat_id).await.unwrap(),
        MountOutcome::Offline
    );
    assert_eq!(h.session.view().messages[0].content, "cached");
}

#[tokio::test]
async fn creation_failure_is_retracted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chats"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({"error": "db down"})))
        .mount(&server)
        .await;
    mock_completion(&server, 0).await;

    let h = harness(&server);
    let mut rx = h.events.subscribe();

    let err = h.session.submit("Plan a trip").await.unwrap_err();
    assert!(matches!(err, ControlError::CreationFailed { .. }));
    assert!(err.is_retriable());
    assert!(h.cache.is_empty());

    let announced = rx.recv().await.unwrap();
    assert_eq!(
        rx.recv().await.unwrap(),
        ChatEvent::CreationFailed {
            temp_id: announced.temp_id().clone()
        }
    );
}

#[tokio::test]
async fn failed_user_turn_patch_does_not_block_streaming() {
    let server = MockServer::start().await;
    let messages = serde_json::json!([]);
    Mock::given(method("GET"))
        .and(path("/api/chats/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_json("abc123", &messages)))
        .mount(&server)
        .await;
    mock_completion(&server, 1).await;
    mock_patch(&server, "abc123", 500).await;

    let h = harness(&server);
    let chat_id = ChatId::new("abc123").unwrap();
    h.session.mount(chat_id.clone()).await.unwrap();

    let turn = h.session.submit("Plan a trip").await.unwrap();
    assert_eq!(turn.reply.unwrap().content, "Hello");
    assert!(!turn.persisted);

    // Unconfirmed locally: the next mount resumes instead of fetching
    let entry = h.cache.read(&chat_id).unwrap();
    assert!(entry.pending);
    assert_eq!(entry.messages.len(), 2);
}

#[tokio::test]
async fn upstream_rejection_rolls_back_to_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chats/abc123"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_json("abc123", &serde_json::json!([]))),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;
    mock_patch(&server, "abc123", 200).await;

    let h = harness(&server);
    let chat_id = ChatId::new("abc123").unwrap();
    h.session.mount(chat_id.clone()).await.unwrap();

    let err = h.session.submit("Plan a trip").await.unwrap_err();
    assert!(matches!(
        err,
        ControlError::Stream(StreamError::Upstream { status: 502, .. })
    ));

    let view = h.session.view();
    assert_eq!(view.messages.len(), 1);
    assert!(view.error.is_some());
    assert!(!view.streaming);
    assert!(h.cache.read(&chat_id).unwrap().pending);
}

/// Yields one delta, then fails.
struct BrokenStream;

#[async_trait]
impl CompletionClient for BrokenStream {
    async fn open(&self, _request: &CompletionRequest) -> chat_sync_stream::Result<ByteStream> {
        let items: Vec<chat_sync_stream::Result<Bytes>> = vec![
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
            )),
            Err(StreamError::Upstream {
                status: 502,
                body: "connection reset".to_string(),
            }),
        ];
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

#[tokio::test]
async fn mid_stream_error_discards_partial_reply() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chats/abc123"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_json("abc123", &serde_json::json!([]))),
        )
        .mount(&server)
        .await;
    mock_patch(&server, "abc123", 200).await;

    let h = harness_with(&server, Arc::new(BrokenStream));
    let chat_id = ChatId::new("abc123").unwrap();
    h.session.mount(chat_id.clone()).await.unwrap();

    assert!(h.session.submit("Plan a trip").await.is_err());

    let entry = h.cache.read(&chat_id).unwrap();
    assert_eq!(entry.messages.len(), 1);
    assert!(entry.messages[0].is_user());
    assert!(entry.pending);
    assert_eq!(h.session.view().messages.len(), 1);
}
