use serde::Serialize;

/// Structured trace events emitted across all Quill crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ConversationResolved {
        conversation_id: String,
        device_id: String,
        is_new: bool,
    },
    ContextAssembled {
        documents_requested: usize,
        documents_included: usize,
        injected_chars: usize,
        truncated: usize,
    },
    GenerationRequest {
        provider: String,
        model: String,
        message_count: usize,
    },
    TurnPersisted {
        conversation_id: String,
        assistant_message_id: String,
        content_chars: usize,
        sources: usize,
    },
    TurnFinalizeFailed {
        conversation_id: String,
        assistant_message_id: String,
        error: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "quill_event");
    }
}
