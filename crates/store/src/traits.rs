use quill_domain::error::Result;

use crate::record::{Conversation, Document, TurnMessage};

/// The store capability injected into the turn pipeline.
///
/// Operations are the create/read/update-by-identifier and filtered-list
/// surface the core needs — never raw queries. Implementations must make
/// each call atomic: a failed call leaves no partial state behind.
#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    // ── Conversations ────────────────────────────────────────────────

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>>;

    async fn create_conversation(&self, conversation: Conversation) -> Result<Conversation>;

    /// Active conversations for one device, most recently updated first.
    async fn list_conversations(&self, device_id: &str) -> Result<Vec<Conversation>>;

    async fn rename_conversation(&self, id: &str, title: &str) -> Result<()>;

    async fn set_pinned(&self, id: &str, pinned: bool) -> Result<()>;

    async fn set_share_token(&self, id: &str, token: &str) -> Result<()>;

    /// Soft delete: clears the active flag, never removes the record.
    async fn deactivate_conversation(&self, id: &str) -> Result<()>;

    /// Bump the conversation's last-activity timestamp.
    async fn touch_conversation(&self, id: &str) -> Result<()>;

    // ── Turn messages ────────────────────────────────────────────────

    async fn create_message(&self, message: TurnMessage) -> Result<TurnMessage>;

    /// Overwrite a message's content in place (the placeholder update).
    async fn update_message_content(
        &self,
        conversation_id: &str,
        message_id: &str,
        content: &str,
        sources: Option<Vec<String>>,
    ) -> Result<()>;

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<TurnMessage>>;

    // ── Documents & links ────────────────────────────────────────────

    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    async fn list_documents(&self, device_id: &str) -> Result<Vec<Document>>;

    /// Create conversation–document links in one batch. Called exactly once
    /// per conversation, on the creation branch of the resolver.
    async fn link_documents(&self, conversation_id: &str, document_ids: &[String]) -> Result<()>;

    async fn linked_documents(&self, conversation_id: &str) -> Result<Vec<String>>;
}
