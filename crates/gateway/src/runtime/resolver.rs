//! Conversation resolution: take whatever identifier the client supplied
//! (possibly none, possibly stale) and land on a confirmed, persisted
//! conversation before any turn rows are written.

use std::sync::Arc;

use quill_domain::trace::TraceEvent;
use quill_domain::{Error, Result};
use quill_store::{Conversation, ConversationStore};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Identifier lifecycle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A client-supplied conversation identifier before resolution.
///
/// This is only a claim: it may be absent, unknown, or point at a
/// deactivated record. The sole way out of this state is
/// [`ProvisionalId::confirm`], which the resolver calls once it has a
/// store-backed record — downstream code never handles a provisional id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionalId(Option<String>);

impl ProvisionalId {
    /// Normalize the raw client claim: blank strings count as no claim.
    pub fn new(claim: Option<String>) -> Self {
        Self(claim.filter(|s| !s.trim().is_empty()))
    }

    pub fn claim(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Transition to the confirmed state with the id the store vouched
    /// for. When the claim did not resolve, `id` is the freshly minted
    /// replacement the response must carry back to the client.
    fn confirm(self, id: &str) -> ConfirmedId {
        ConfirmedId(id.to_owned())
    }
}

/// A conversation identifier vouched for by the store.
///
/// Terminal state: there is no way to mutate it, matching the rule that a
/// conversation never changes identifier after confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedId(String);

impl ConfirmedId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConfirmedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resolution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
pub struct Resolved {
    pub id: ConfirmedId,
    /// True when this turn created the conversation (and wrote its
    /// document links).
    pub created: bool,
}

/// Resolve or lazily create the conversation for a turn.
///
/// Unknown and deactivated ids are treated the same as no id at all: the
/// client's claim is simply dropped and a new conversation is created.
/// Document links are written exactly once, on the creation branch.
pub async fn resolve(
    store: &Arc<dyn ConversationStore>,
    claimed: ProvisionalId,
    device_id: &str,
    first_user_text: &str,
    document_ids: &[String],
) -> Result<Resolved> {
    if let Some(id) = claimed.claim() {
        match store.get_conversation(id).await? {
            Some(conversation) if conversation.active => {
                TraceEvent::ConversationResolved {
                    conversation_id: conversation.id.clone(),
                    device_id: device_id.to_owned(),
                    is_new: false,
                }
                .emit();
                return Ok(Resolved {
                    id: claimed.confirm(&conversation.id),
                    created: false,
                });
            }
            Some(_) => {
                tracing::debug!(conversation_id = %id, "claimed conversation is deactivated, creating fresh");
            }
            None => {
                tracing::debug!(conversation_id = %id, "claimed conversation unknown, creating fresh");
            }
        }
    }

    if first_user_text.trim().is_empty() {
        return Err(Error::Validation(
            "cannot create a conversation from an empty message".into(),
        ));
    }

    let conversation = store
        .create_conversation(Conversation::new(device_id, first_user_text))
        .await?;
    if !document_ids.is_empty() {
        store
            .link_documents(&conversation.id, document_ids)
            .await?;
    }
    TraceEvent::ConversationResolved {
        conversation_id: conversation.id.clone(),
        device_id: device_id.to_owned(),
        is_new: true,
    }
    .emit();

    Ok(Resolved {
        id: claimed.confirm(&conversation.id),
        created: true,
    })
}
