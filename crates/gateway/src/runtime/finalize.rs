//! Persistence bracketing around a streamed turn.
//!
//! `begin_turn` runs before the first byte reaches the client and is
//! strictly ordered: user row, then the empty assistant placeholder, then
//! the conversation touch. Any failure aborts the turn. `finalize_turn`
//! runs after the stream ends; by then the response is already with the
//! client, so its errors are logged and swallowed.

use std::sync::Arc;

use quill_domain::trace::TraceEvent;
use quill_domain::Result;
use quill_store::{ConversationStore, TurnMessage};

/// Ids of the rows written by [`begin_turn`].
pub struct TurnWrites {
    pub user_message_id: String,
    pub placeholder_id: String,
}

/// Persist the user turn and the assistant placeholder, then bump the
/// conversation's activity timestamp. Each write must succeed before the
/// next begins.
pub async fn begin_turn(
    store: &Arc<dyn ConversationStore>,
    conversation_id: &str,
    user_text: &str,
    model: &str,
) -> Result<TurnWrites> {
    let user_row = store
        .create_message(TurnMessage::user(conversation_id, user_text))
        .await?;
    let placeholder = store
        .create_message(TurnMessage::assistant_placeholder(conversation_id, model))
        .await?;
    store.touch_conversation(conversation_id).await?;

    Ok(TurnWrites {
        user_message_id: user_row.id,
        placeholder_id: placeholder.id,
    })
}

/// Overwrite the placeholder with the accumulated assistant text.
///
/// `sources` is attached only when grounding documents contributed to the
/// turn. A store failure here is logged and swallowed — the client already
/// received the streamed text, and the placeholder simply stays empty.
pub async fn finalize_turn(
    store: &Arc<dyn ConversationStore>,
    conversation_id: &str,
    placeholder_id: &str,
    final_text: &str,
    source_names: &[String],
) {
    let sources = if source_names.is_empty() {
        None
    } else {
        Some(source_names.to_vec())
    };
    let result = store
        .update_message_content(conversation_id, placeholder_id, final_text, sources)
        .await;
    match result {
        Ok(()) => TraceEvent::TurnPersisted {
            conversation_id: conversation_id.to_owned(),
            assistant_message_id: placeholder_id.to_owned(),
            content_chars: final_text.chars().count(),
            sources: source_names.len(),
        }
        .emit(),
        Err(err) => TraceEvent::TurnFinalizeFailed {
            conversation_id: conversation_id.to_owned(),
            assistant_message_id: placeholder_id.to_owned(),
            error: err.to_string(),
        }
        .emit(),
    }
}
