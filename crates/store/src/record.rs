use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quill_domain::id;

/// Maximum length of an auto-derived conversation title.
pub const TITLE_MAX_CHARS: usize = 100;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A conversation thread owned by one device.
///
/// Created lazily on the first turn; soft-deleted by clearing `active`,
/// never hard-deleted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub share_token: Option<String>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default = "d_true")]
    pub active: bool,
    pub device_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Build a fresh conversation: short opaque id, title derived from the
    /// first 100 characters of the opening user message.
    pub fn new(device_id: &str, first_user_text: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id::short_id(),
            title: derive_title(first_user_text),
            share_token: None,
            pinned: false,
            active: true,
            device_id: device_id.to_owned(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// First [`TITLE_MAX_CHARS`] characters of the opening message.
fn derive_title(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(TITLE_MAX_CHARS) {
        Some((byte_idx, _)) => trimmed[..byte_idx].to_owned(),
        None => trimmed.to_owned(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One side of a turn. Every user row is paired with exactly one assistant
/// row, written as an empty placeholder before streaming begins and updated
/// in place afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    /// Grounding-source names attached to an assistant row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    /// Model that produced an assistant row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TurnMessage {
    pub fn user(conversation_id: &str, content: &str) -> Self {
        Self {
            id: id::long_id(),
            conversation_id: conversation_id.to_owned(),
            role: Role::User,
            content: content.to_owned(),
            image_ref: None,
            sources: None,
            model: None,
            created_at: Utc::now(),
        }
    }

    /// An empty assistant placeholder, overwritten once the stream completes.
    pub fn assistant_placeholder(conversation_id: &str, model: &str) -> Self {
        Self {
            id: id::long_id(),
            conversation_id: conversation_id.to_owned(),
            role: Role::Assistant,
            content: String::new(),
            image_ref: None,
            sources: None,
            model: Some(model.to_owned()),
            created_at: Utc::now(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Documents
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An ingested knowledge unit. Read-only to the core — only `name` and
/// `content` matter here; extraction happens upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub byte_size: u64,
    #[serde(default = "d_true")]
    pub active: bool,
    pub device_id: String,
}

/// Conversation–document association, created once at conversation-creation
/// time from the caller's selection for that first turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLink {
    pub conversation_id: String,
    pub document_id: String,
}

fn d_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_first_100_chars() {
        let long = "q".repeat(250);
        let conv = Conversation::new("dev-1", &long);
        assert_eq!(conv.title.len(), TITLE_MAX_CHARS);
    }

    #[test]
    fn short_message_becomes_full_title() {
        let conv = Conversation::new("dev-1", "  What is Rust?  ");
        assert_eq!(conv.title, "What is Rust?");
    }

    #[test]
    fn title_respects_multibyte_chars() {
        let text = "é".repeat(150);
        let conv = Conversation::new("dev-1", &text);
        assert_eq!(conv.title.chars().count(), TITLE_MAX_CHARS);
    }

    #[test]
    fn placeholder_starts_empty() {
        let msg = TurnMessage::assistant_placeholder("c1", "gpt-4o-mini");
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content, "");
        assert_eq!(msg.model.as_deref(), Some("gpt-4o-mini"));
    }
}
