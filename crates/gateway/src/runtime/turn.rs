//! The streaming turn loop.
//!
//! `start_turn` performs every step that can still fail with a proper
//! status code — admission, resolution, context assembly, opening the
//! generation stream, and the pre-stream persistence writes — then spawns
//! the decode loop onto its own task. The spawned task forwards deltas
//! through a channel and finalizes persistence when the stream ends, so a
//! client that disconnects mid-answer never aborts the final update.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;

use quill_contextpack::{assemble, SourceDocument};
use quill_domain::stream::StreamEvent;
use quill_domain::{Error, Result};
use quill_providers::{CompletionRequest, PromptMessage};

use crate::runtime::resolver::{ConfirmedId, ProvisionalId};
use crate::runtime::{finalize, prompt, resolver};
use crate::state::AppState;

/// Channel depth for delta forwarding. Deep enough that a briefly slow
/// client does not stall decoding.
const DELTA_CHANNEL_DEPTH: usize = 64;

/// One turn as submitted by the client, already validated at the API edge.
#[derive(Debug)]
pub struct TurnInput {
    pub device_id: String,
    pub conversation_id: Option<String>,
    /// Prior turns plus the new user message, in order. The last entry is
    /// the new user message.
    pub history: Vec<PromptMessage>,
    pub document_ids: Vec<String>,
}

impl TurnInput {
    fn latest_user_text(&self) -> &str {
        self.history
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

/// Handle returned once the turn is admitted and streaming has begun.
#[derive(Debug)]
pub struct TurnHandle {
    /// Confirmed conversation id, for the response header.
    pub conversation_id: ConfirmedId,
    /// Names of the grounding documents used, for the response header.
    pub source_names: Vec<String>,
    /// Incremental answer text.
    pub deltas: mpsc::Receiver<String>,
}

/// Run everything up to the first streamed byte, then hand off.
///
/// Errors returned here map cleanly to a status code because nothing has
/// been sent to the client yet. Once this returns `Ok`, the only failure
/// channel left is early termination of the delta stream.
pub async fn start_turn(state: &AppState, input: TurnInput) -> Result<TurnHandle> {
    if !state.limiter.allow(&input.device_id) {
        return Err(Error::RateLimited(format!(
            "device {} exceeded its turn budget",
            input.device_id
        )));
    }

    let resolved = resolver::resolve(
        &state.store,
        ProvisionalId::new(input.conversation_id.clone()),
        &input.device_id,
        input.latest_user_text(),
        &input.document_ids,
    )
    .await?;
    let conversation_id = resolved.id;

    // Unknown or deactivated document ids are skipped, not errors.
    let mut docs = Vec::new();
    for doc_id in &input.document_ids {
        match state.store.get_document(doc_id).await? {
            Some(doc) if doc.active => docs.push(SourceDocument {
                name: doc.name,
                content: doc.content,
            }),
            Some(_) | None => {
                tracing::debug!(document_id = %doc_id, "skipping unavailable document");
            }
        }
    }
    let grounding = assemble(&docs, state.config.context.max_chars_per_document);
    let source_names = grounding.source_names.clone();

    let user_text = input.latest_user_text().to_owned();
    let messages = prompt::build_messages(&state.config.persona, &grounding, input.history);

    let request = CompletionRequest {
        messages,
        temperature: Some(state.config.generation.temperature),
        max_tokens: Some(state.config.generation.max_output_tokens),
        model: Some(state.config.generation.model.clone()),
    };

    // One deadline covers the whole turn: opening the stream, decoding,
    // and delivery to the client all draw from the same budget.
    let timeout = Duration::from_secs(state.config.limits.turn_timeout_secs);
    let deadline = tokio::time::Instant::now() + timeout;
    let stream = tokio::time::timeout_at(deadline, state.provider.stream_completion(&request))
        .await
        .map_err(|_| Error::Timeout("generation endpoint did not respond".into()))??;

    // The endpoint has accepted the request; persist the turn bracket
    // before the first byte goes out.
    let writes = finalize::begin_turn(
        &state.store,
        conversation_id.as_str(),
        &user_text,
        &state.config.generation.model,
    )
    .await?;

    let (tx, rx) = mpsc::channel::<String>(DELTA_CHANNEL_DEPTH);
    let store = state.store.clone();
    let task_conversation_id = conversation_id.clone();
    let task_sources = source_names.clone();

    tokio::spawn(async move {
        let mut stream = stream;
        let mut answer = String::new();

        loop {
            let next = tokio::time::timeout_at(deadline, stream.next()).await;
            match next {
                Err(_) => {
                    tracing::warn!(
                        conversation_id = %task_conversation_id,
                        "turn deadline exceeded mid-stream, finalizing partial answer"
                    );
                    break;
                }
                Ok(None) => break,
                Ok(Some(Ok(StreamEvent::Token { text }))) => {
                    answer.push_str(&text);
                    // A closed receiver returns immediately; keep draining
                    // so the final update still happens. A live receiver
                    // that has stopped reading only holds us until the
                    // deadline, then the partial answer is finalized.
                    match tokio::time::timeout_at(deadline, tx.send(text)).await {
                        Ok(_) => {}
                        Err(_) => {
                            tracing::warn!(
                                conversation_id = %task_conversation_id,
                                "turn deadline exceeded delivering deltas, finalizing partial answer"
                            );
                            break;
                        }
                    }
                }
                Ok(Some(Ok(StreamEvent::Done { .. }))) => break,
                Ok(Some(Ok(StreamEvent::Error { message }))) => {
                    tracing::warn!(
                        conversation_id = %task_conversation_id,
                        error = %message,
                        "generation stream reported an error"
                    );
                    break;
                }
                Ok(Some(Err(err))) => {
                    tracing::warn!(
                        conversation_id = %task_conversation_id,
                        error = %err,
                        "generation stream failed mid-turn"
                    );
                    break;
                }
            }
        }

        finalize::finalize_turn(
            &store,
            task_conversation_id.as_str(),
            &writes.placeholder_id,
            answer.trim(),
            &task_sources,
        )
        .await;
    });

    Ok(TurnHandle {
        conversation_id,
        source_names,
        deltas: rx,
    })
}
