use quill_domain::error::Result;
use quill_domain::stream::{BoxStream, StreamEvent};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

/// One entry of the ordered prompt sent to the generation endpoint.
#[derive(Debug, Clone)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
        }
    }
}

/// An endpoint-agnostic completion request.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// The ordered prompt. Never reordered downstream.
    pub messages: Vec<PromptMessage>,
    /// Sampling temperature. `None` lets the endpoint choose.
    pub temperature: Option<f32>,
    /// Maximum tokens in the response. `None` lets the endpoint choose.
    pub max_tokens: Option<u32>,
    /// Model identifier override. When `None`, the adapter uses its default.
    pub model: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The generation-endpoint capability.
///
/// The endpoint is an opaque token-stream producer: one request in, a
/// chunked stream of text deltas out. Implementations translate between our
/// internal types and the wire format of a concrete hosted API.
#[async_trait::async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Issue one completion request and return the decoded delta stream.
    async fn stream_completion(
        &self,
        req: &CompletionRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;

    /// The model this provider targets when the request does not override it.
    fn default_model(&self) -> &str;
}
