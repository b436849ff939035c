//! Conversation, turn, and document persistence.
//!
//! The core never talks to storage directly — it receives a
//! [`ConversationStore`] capability so the backing implementation can be
//! swapped (file-backed JSON in production, in-memory in tests) without
//! touching the orchestration code.

mod json;
mod record;
mod traits;

pub use json::JsonStore;
pub use record::{Conversation, Document, DocumentLink, Role, TurnMessage, TITLE_MAX_CHARS};
pub use traits::ConversationStore;
