//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Ollama, vLLM, LM Studio, Together, and any other
//! endpoint that follows the OpenAI chat completions contract.

use serde_json::Value;

use quill_domain::config::GenerationConfig;
use quill_domain::error::{Error, Result};
use quill_domain::stream::{BoxStream, StreamEvent, Usage};
use quill_domain::trace::TraceEvent;

use crate::traits::{CompletionRequest, GenerationProvider, PromptMessage, PromptRole};
use crate::util::from_reqwest;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    /// `None` = unauthenticated endpoint (local Ollama/vLLM).
    api_key: Option<String>,
    default_model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create an adapter from the generation section of the config.
    ///
    /// The API key is read from the environment variable named in the
    /// config; a missing variable is tolerated (local endpoints need none)
    /// but logged.
    pub fn from_config(cfg: &GenerationConfig) -> Result<Self> {
        let api_key = match std::env::var(&cfg.api_key_env) {
            Ok(key) if !key.is_empty() => Some(key),
            _ => {
                tracing::warn!(
                    env = %cfg.api_key_env,
                    "no API key in environment — sending unauthenticated requests"
                );
                None
            }
        };

        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: "openai_compat".into(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model: cfg.model.clone(),
            client,
        })
    }

    fn effective_model(&self, req: &CompletionRequest) -> String {
        req.model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    fn build_body(&self, req: &CompletionRequest) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();

        let mut body = serde_json::json!({
            "model": self.effective_model(req),
            "messages": messages,
            "stream": true,
            "stream_options": {"include_usage": true},
        });
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        body
    }
}

fn role_to_str(role: PromptRole) -> &'static str {
    match role {
        PromptRole::System => "system",
        PromptRole::User => "user",
        PromptRole::Assistant => "assistant",
    }
}

fn msg_to_openai(msg: &PromptMessage) -> Value {
    serde_json::json!({
        "role": role_to_str(msg.role),
        "content": msg.content,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE payload parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

/// Parse one `data:` payload into stream events.
///
/// Malformed payloads are logged and skipped — a corrupt frame must never
/// abort the turn, so this returns an empty vec instead of an error.
fn parse_sse_data(data: &str) -> Vec<quill_domain::error::Result<StreamEvent>> {
    if data.trim() == "[DONE]" {
        return vec![Ok(StreamEvent::Done {
            usage: None,
            finish_reason: Some("stop".into()),
        })];
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "skipping malformed delta frame");
            return Vec::new();
        }
    };

    let choice = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first());

    // Usage-only chunk (stream_options.include_usage).
    let Some(choice) = choice else {
        if let Some(usage) = v.get("usage").and_then(parse_usage) {
            return vec![Ok(StreamEvent::Done {
                usage: Some(usage),
                finish_reason: None,
            })];
        }
        return Vec::new();
    };

    if let Some(fr) = choice.get("finish_reason").and_then(|f| f.as_str()) {
        let usage = v.get("usage").and_then(parse_usage);
        return vec![Ok(StreamEvent::Done {
            usage,
            finish_reason: Some(fr.to_string()),
        })];
    }

    let delta = choice.get("delta").unwrap_or(&Value::Null);
    if let Some(text) = delta.get("content").and_then(|c| c.as_str()) {
        if !text.is_empty() {
            return vec![Ok(StreamEvent::Token {
                text: text.to_string(),
            })];
        }
    }

    Vec::new()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl GenerationProvider for OpenAiCompatProvider {
    async fn stream_completion(
        &self,
        req: &CompletionRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(req);

        TraceEvent::GenerationRequest {
            provider: self.id.clone(),
            model: self.effective_model(req),
            message_count: req.messages.len(),
        }
        .emit();

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(ref key) = self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let resp = builder.json(&body).send().await.map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.unwrap_or_default();
            // Rate-limit signals get their own error so the caller can
            // answer with a distinguishable status.
            if status.as_u16() == 429 {
                return Err(Error::RateLimited(err_text));
            }
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }

        Ok(crate::sse::sse_response_stream(resp, parse_sse_data))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(events: &[quill_domain::error::Result<StreamEvent>]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                Ok(StreamEvent::Token { text }) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn parses_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        let events = parse_sse_data(data);
        assert_eq!(text_of(&events), "Hel");
    }

    #[test]
    fn done_sentinel_ends_stream() {
        let events = parse_sse_data("[DONE]");
        assert!(matches!(events[0], Ok(StreamEvent::Done { .. })));
    }

    #[test]
    fn malformed_frame_is_skipped_not_erred() {
        let events = parse_sse_data("{not json at all");
        assert!(events.is_empty());
    }

    #[test]
    fn finish_reason_maps_to_done() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let events = parse_sse_data(data);
        match &events[0] {
            Ok(StreamEvent::Done { finish_reason, .. }) => {
                assert_eq!(finish_reason.as_deref(), Some("stop"));
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[test]
    fn usage_only_chunk_maps_to_done_with_usage() {
        let data = r#"{"choices":[],"usage":{"prompt_tokens":5,"completion_tokens":7,"total_tokens":12}}"#;
        let events = parse_sse_data(data);
        match &events[0] {
            Ok(StreamEvent::Done { usage: Some(u), .. }) => {
                assert_eq!(u.total_tokens, 12);
            }
            other => panic!("expected Done with usage, got {other:?}"),
        }
    }

    #[test]
    fn empty_delta_yields_nothing() {
        let data = r#"{"choices":[{"delta":{}}]}"#;
        assert!(parse_sse_data(data).is_empty());
    }

    #[test]
    fn corrupt_frame_between_valid_frames_preserves_order() {
        let frames = [
            r#"{"choices":[{"delta":{"content":"a"}}]}"#,
            "garbage{{{",
            r#"{"choices":[{"delta":{"content":"b"}}]}"#,
        ];
        let mut events = Vec::new();
        for f in frames {
            events.extend(parse_sse_data(f));
        }
        assert_eq!(text_of(&events), "ab");
    }
}
