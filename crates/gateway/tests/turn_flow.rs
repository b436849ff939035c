//! End-to-end turn pipeline tests against an in-memory store and a
//! scripted generation provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use quill_domain::config::Config;
use quill_domain::stream::{BoxStream, StreamEvent};
use quill_domain::{Error, Result};
use quill_gateway::runtime::limiter::RateLimiter;
use quill_gateway::runtime::turn::{start_turn, TurnInput};
use quill_gateway::state::AppState;
use quill_providers::{CompletionRequest, GenerationProvider, PromptMessage};
use quill_store::{Conversation, ConversationStore, Document, JsonStore, Role, TurnMessage};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Test doubles
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Replays a fixed list of events, counting how often it is called.
struct ScriptedProvider {
    events: Vec<Result<StreamEvent>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(events: Vec<Result<StreamEvent>>) -> Self {
        Self {
            events,
            calls: AtomicUsize::new(0),
        }
    }

    fn tokens(texts: &[&str]) -> Self {
        let mut events: Vec<Result<StreamEvent>> = texts
            .iter()
            .map(|t| {
                Ok(StreamEvent::Token {
                    text: (*t).to_owned(),
                })
            })
            .collect();
        events.push(Ok(StreamEvent::Done {
            usage: None,
            finish_reason: Some("stop".into()),
        }));
        Self::new(events)
    }
}

#[async_trait::async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn stream_completion(
        &self,
        _req: &CompletionRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let events: Vec<Result<StreamEvent>> = self
            .events
            .iter()
            .map(|e| match e {
                Ok(ev) => Ok(ev.clone()),
                Err(err) => Err(Error::Other(err.to_string())),
            })
            .collect();
        Ok(Box::pin(futures_util::stream::iter(events)))
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "test-model"
    }
}

/// Fails the initial completion call, as a hosted endpoint rejecting the
/// request would.
struct RejectingProvider;

#[async_trait::async_trait]
impl GenerationProvider for RejectingProvider {
    async fn stream_completion(
        &self,
        _req: &CompletionRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        Err(Error::Provider {
            provider: "rejecting".into(),
            message: "upstream unavailable".into(),
        })
    }

    fn provider_id(&self) -> &str {
        "rejecting"
    }

    fn default_model(&self) -> &str {
        "test-model"
    }
}

struct AllowAll;

impl RateLimiter for AllowAll {
    fn allow(&self, _key: &str) -> bool {
        true
    }
}

struct DenyAll;

impl RateLimiter for DenyAll {
    fn allow(&self, _key: &str) -> bool {
        false
    }
}

/// Errors every call; stands in for an unreachable database.
struct BrokenStore;

#[async_trait::async_trait]
impl ConversationStore for BrokenStore {
    async fn get_conversation(&self, _id: &str) -> Result<Option<Conversation>> {
        Err(Error::Store("connection refused".into()))
    }
    async fn create_conversation(&self, _c: Conversation) -> Result<Conversation> {
        Err(Error::Store("connection refused".into()))
    }
    async fn list_conversations(&self, _d: &str) -> Result<Vec<Conversation>> {
        Err(Error::Store("connection refused".into()))
    }
    async fn rename_conversation(&self, _id: &str, _t: &str) -> Result<()> {
        Err(Error::Store("connection refused".into()))
    }
    async fn set_pinned(&self, _id: &str, _p: bool) -> Result<()> {
        Err(Error::Store("connection refused".into()))
    }
    async fn set_share_token(&self, _id: &str, _t: &str) -> Result<()> {
        Err(Error::Store("connection refused".into()))
    }
    async fn deactivate_conversation(&self, _id: &str) -> Result<()> {
        Err(Error::Store("connection refused".into()))
    }
    async fn touch_conversation(&self, _id: &str) -> Result<()> {
        Err(Error::Store("connection refused".into()))
    }
    async fn create_message(&self, _m: TurnMessage) -> Result<TurnMessage> {
        Err(Error::Store("connection refused".into()))
    }
    async fn update_message_content(
        &self,
        _c: &str,
        _m: &str,
        _content: &str,
        _s: Option<Vec<String>>,
    ) -> Result<()> {
        Err(Error::Store("connection refused".into()))
    }
    async fn list_messages(&self, _c: &str) -> Result<Vec<TurnMessage>> {
        Err(Error::Store("connection refused".into()))
    }
    async fn get_document(&self, _id: &str) -> Result<Option<Document>> {
        Err(Error::Store("connection refused".into()))
    }
    async fn list_documents(&self, _d: &str) -> Result<Vec<Document>> {
        Err(Error::Store("connection refused".into()))
    }
    async fn link_documents(&self, _c: &str, _d: &[String]) -> Result<()> {
        Err(Error::Store("connection refused".into()))
    }
    async fn linked_documents(&self, _c: &str) -> Result<Vec<String>> {
        Err(Error::Store("connection refused".into()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn app_state(
    store: Arc<JsonStore>,
    provider: Arc<dyn GenerationProvider>,
    limiter: Arc<dyn RateLimiter>,
) -> AppState {
    AppState {
        config: Arc::new(Config::default()),
        store,
        provider,
        limiter,
    }
}

fn turn_input(conversation_id: Option<&str>, text: &str, document_ids: &[&str]) -> TurnInput {
    TurnInput {
        device_id: "dev-1".into(),
        conversation_id: conversation_id.map(str::to_owned),
        history: vec![PromptMessage::user(text)],
        document_ids: document_ids.iter().map(|s| (*s).to_owned()).collect(),
    }
}

async fn drain(mut deltas: tokio::sync::mpsc::Receiver<String>) -> String {
    let mut out = String::new();
    while let Some(text) = deltas.recv().await {
        out.push_str(&text);
    }
    out
}

fn seed_document(store: &JsonStore, id: &str, name: &str, content: &str) {
    store.insert_document(Document {
        id: id.into(),
        name: name.into(),
        content: content.into(),
        byte_size: content.len() as u64,
        active: true,
        device_id: "dev-1".into(),
    });
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn first_turn_creates_conversation_and_persists_both_rows() {
    let store = Arc::new(JsonStore::in_memory());
    let provider = Arc::new(ScriptedProvider::tokens(&["Hello", ", ", "world"]));
    let state = app_state(store.clone(), provider, Arc::new(AllowAll));

    let handle = start_turn(&state, turn_input(None, "greet me", &[]))
        .await
        .unwrap();
    let conversation_id = handle.conversation_id.to_string();
    let streamed = drain(handle.deltas).await;
    assert_eq!(streamed, "Hello, world");

    let conversation = store
        .get_conversation(&conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.title, "greet me");

    let messages = store.list_messages(&conversation_id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "greet me");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "Hello, world");
}

#[tokio::test]
async fn second_turn_reuses_conversation_without_new_links() {
    let store = Arc::new(JsonStore::in_memory());
    seed_document(&store, "doc-1", "notes.txt", "some facts");
    let provider = Arc::new(ScriptedProvider::tokens(&["ok"]));
    let state = app_state(store.clone(), provider, Arc::new(AllowAll));

    let first = start_turn(&state, turn_input(None, "first", &["doc-1"]))
        .await
        .unwrap();
    let conversation_id = first.conversation_id.to_string();
    drain(first.deltas).await;

    // Different selection on the second turn must not change the links.
    let second = start_turn(
        &state,
        turn_input(Some(&conversation_id), "second", &[]),
    )
    .await
    .unwrap();
    assert_eq!(second.conversation_id.as_str(), conversation_id);
    drain(second.deltas).await;

    let conversations = store.list_conversations("dev-1").await.unwrap();
    assert_eq!(conversations.len(), 1);
    let links = store.linked_documents(&conversation_id).await.unwrap();
    assert_eq!(links, vec!["doc-1".to_string()]);

    let messages = store.list_messages(&conversation_id).await.unwrap();
    assert_eq!(messages.len(), 4);
}

#[tokio::test]
async fn grounded_turn_reports_sources_and_stores_them() {
    let store = Arc::new(JsonStore::in_memory());
    seed_document(&store, "doc-1", "notes.txt", "some facts");
    let provider = Arc::new(ScriptedProvider::tokens(&["grounded answer"]));
    let state = app_state(store.clone(), provider, Arc::new(AllowAll));

    let handle = start_turn(&state, turn_input(None, "what do my notes say?", &["doc-1"]))
        .await
        .unwrap();
    assert_eq!(handle.source_names, vec!["notes.txt".to_string()]);
    let conversation_id = handle.conversation_id.to_string();
    drain(handle.deltas).await;

    let messages = store.list_messages(&conversation_id).await.unwrap();
    assert_eq!(
        messages[1].sources.as_deref(),
        Some(&["notes.txt".to_string()][..])
    );
}

#[tokio::test]
async fn unknown_document_ids_are_skipped() {
    let store = Arc::new(JsonStore::in_memory());
    seed_document(&store, "doc-1", "notes.txt", "some facts");
    let provider = Arc::new(ScriptedProvider::tokens(&["ok"]));
    let state = app_state(store.clone(), provider, Arc::new(AllowAll));

    let handle = start_turn(
        &state,
        turn_input(None, "hi", &["doc-1", "missing-doc"]),
    )
    .await
    .unwrap();
    assert_eq!(handle.source_names, vec!["notes.txt".to_string()]);
    drain(handle.deltas).await;
}

#[tokio::test]
async fn empty_stream_finalizes_to_empty_content() {
    let store = Arc::new(JsonStore::in_memory());
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(StreamEvent::Done {
        usage: None,
        finish_reason: Some("stop".into()),
    })]));
    let state = app_state(store.clone(), provider, Arc::new(AllowAll));

    let handle = start_turn(&state, turn_input(None, "say nothing", &[]))
        .await
        .unwrap();
    let conversation_id = handle.conversation_id.to_string();
    let streamed = drain(handle.deltas).await;
    assert_eq!(streamed, "");

    let messages = store.list_messages(&conversation_id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "");
}

#[tokio::test]
async fn mid_stream_error_finalizes_partial_answer() {
    let store = Arc::new(JsonStore::in_memory());
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(StreamEvent::Token {
            text: "partial".into(),
        }),
        Err(Error::Http("connection reset".into())),
        Ok(StreamEvent::Token {
            text: " never seen".into(),
        }),
    ]));
    let state = app_state(store.clone(), provider, Arc::new(AllowAll));

    let handle = start_turn(&state, turn_input(None, "hi", &[])).await.unwrap();
    let conversation_id = handle.conversation_id.to_string();
    let streamed = drain(handle.deltas).await;
    assert_eq!(streamed, "partial");

    let messages = store.list_messages(&conversation_id).await.unwrap();
    assert_eq!(messages[1].content, "partial");
}

#[tokio::test]
async fn provider_rejection_leaves_no_rows_behind() {
    let store = Arc::new(JsonStore::in_memory());
    let state = app_state(store.clone(), Arc::new(RejectingProvider), Arc::new(AllowAll));

    let err = start_turn(&state, turn_input(None, "hi", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Provider { .. }));

    // The conversation exists (resolution precedes generation), but no
    // turn rows were written.
    let conversations = store.list_conversations("dev-1").await.unwrap();
    assert_eq!(conversations.len(), 1);
    let messages = store
        .list_messages(&conversations[0].id)
        .await
        .unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn denied_device_never_reaches_store_or_provider() {
    let store = Arc::new(JsonStore::in_memory());
    let provider = Arc::new(ScriptedProvider::tokens(&["never"]));
    let calls = &provider.calls;
    let state = app_state(store.clone(), provider.clone(), Arc::new(DenyAll));

    let err = start_turn(&state, turn_input(None, "hi", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RateLimited(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(store.list_conversations("dev-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn broken_store_fails_the_turn_before_streaming() {
    let provider = Arc::new(ScriptedProvider::tokens(&["never"]));
    let state = AppState {
        config: Arc::new(Config::default()),
        store: Arc::new(BrokenStore),
        provider: provider.clone(),
        limiter: Arc::new(AllowAll),
    };

    let err = start_turn(&state, turn_input(None, "hi", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Store(_)));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stale_conversation_id_repoints_to_a_fresh_one() {
    let store = Arc::new(JsonStore::in_memory());
    let provider = Arc::new(ScriptedProvider::tokens(&["ok"]));
    let state = app_state(store.clone(), provider, Arc::new(AllowAll));

    let handle = start_turn(
        &state,
        turn_input(Some("gone1234ab"), "hello again", &[]),
    )
    .await
    .unwrap();
    assert_ne!(handle.conversation_id.as_str(), "gone1234ab");
    drain(handle.deltas).await;

    let conversations = store.list_conversations("dev-1").await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].id, handle.conversation_id.as_str());
}

#[tokio::test(start_paused = true)]
async fn stalled_client_does_not_hold_the_turn_past_its_deadline() {
    let store = Arc::new(JsonStore::in_memory());
    // Far more tokens than the delta channel buffers, so an unread
    // receiver eventually blocks delivery.
    let texts: Vec<String> = (0..200).map(|i| format!("token-{i} ")).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let provider = Arc::new(ScriptedProvider::tokens(&refs));
    let state = app_state(store.clone(), provider, Arc::new(AllowAll));

    let handle = start_turn(&state, turn_input(None, "hi", &[]))
        .await
        .unwrap();
    let conversation_id = handle.conversation_id.to_string();
    // Keep the receiver open but never read from it.
    let deltas = handle.deltas;

    let deadline = std::time::Duration::from_secs(state.config.limits.turn_timeout_secs + 1);
    tokio::time::sleep(deadline).await;

    let mut content = String::new();
    for _ in 0..100 {
        tokio::task::yield_now().await;
        let messages = store.list_messages(&conversation_id).await.unwrap();
        if messages.len() == 2 && messages[1].content.starts_with("token-0") {
            content = messages[1].content.clone();
            break;
        }
    }
    drop(deltas);

    assert!(content.starts_with("token-0 token-1 "), "partial answer was not finalized: {content:?}");
    assert!(!content.contains("token-199"));
}
