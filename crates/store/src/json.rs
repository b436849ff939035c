//! JSON-file-backed [`ConversationStore`].
//!
//! Tables live in memory behind a `parking_lot::RwLock` and are written
//! through to one JSON file per table under the configured data directory.
//! Disk writes happen on a blocking thread so the tokio runtime is never
//! stalled by file I/O. `JsonStore::in_memory()` skips disk entirely and is
//! what the tests use.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;

use quill_domain::error::{Error, Result};

use crate::record::{Conversation, Document, DocumentLink, TurnMessage};
use crate::traits::ConversationStore;

const CONVERSATIONS_FILE: &str = "conversations.json";
const MESSAGES_FILE: &str = "messages.json";
const DOCUMENTS_FILE: &str = "documents.json";
const LINKS_FILE: &str = "links.json";

#[derive(Default)]
struct Tables {
    conversations: HashMap<String, Conversation>,
    /// Turn rows per conversation, in creation order.
    messages: HashMap<String, Vec<TurnMessage>>,
    documents: HashMap<String, Document>,
    links: Vec<DocumentLink>,
}

pub struct JsonStore {
    /// `None` = in-memory mode (tests): mutations skip disk entirely.
    dir: Option<PathBuf>,
    tables: RwLock<Tables>,
}

impl JsonStore {
    /// Load or create the store under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir).map_err(Error::Io)?;

        let tables = Tables {
            conversations: load_table(&data_dir.join(CONVERSATIONS_FILE)),
            messages: load_table(&data_dir.join(MESSAGES_FILE)),
            documents: load_table(&data_dir.join(DOCUMENTS_FILE)),
            links: load_table(&data_dir.join(LINKS_FILE)),
        };

        tracing::info!(
            conversations = tables.conversations.len(),
            documents = tables.documents.len(),
            path = %data_dir.display(),
            "store loaded"
        );

        Ok(Self {
            dir: Some(data_dir.to_path_buf()),
            tables: RwLock::new(tables),
        })
    }

    /// A store with no backing files. Used in tests and as the fake the
    /// orchestration layer is exercised against.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Seed a document (ingestion is out of core scope; tests and tooling
    /// use this to register pre-extracted text).
    pub fn insert_document(&self, document: Document) {
        let mut tables = self.tables.write();
        tables.documents.insert(document.id.clone(), document);
    }

    /// Persist every table. Called on shutdown.
    pub async fn flush(&self) -> Result<()> {
        self.persist_conversations().await?;
        self.persist_messages().await?;
        self.persist_links().await?;
        Ok(())
    }

    // ── Private: write-through persistence ──────────────────────────

    async fn persist_conversations(&self) -> Result<()> {
        let snapshot = {
            let tables = self.tables.read();
            serde_json::to_string_pretty(&tables.conversations)?
        };
        self.write_table(CONVERSATIONS_FILE, snapshot).await
    }

    async fn persist_messages(&self) -> Result<()> {
        let snapshot = {
            let tables = self.tables.read();
            serde_json::to_string_pretty(&tables.messages)?
        };
        self.write_table(MESSAGES_FILE, snapshot).await
    }

    async fn persist_links(&self) -> Result<()> {
        let snapshot = {
            let tables = self.tables.read();
            serde_json::to_string_pretty(&tables.links)?
        };
        self.write_table(LINKS_FILE, snapshot).await
    }

    async fn write_table(&self, file: &str, json: String) -> Result<()> {
        let Some(ref dir) = self.dir else {
            return Ok(());
        };
        let path = dir.join(file);
        tokio::task::spawn_blocking(move || {
            std::fs::write(&path, json).map_err(Error::Io)
        })
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))?
    }
}

fn load_table<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "unreadable table, starting empty");
            T::default()
        }),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read table, starting empty");
            T::default()
        }
    }
}

#[async_trait::async_trait]
impl ConversationStore for JsonStore {
    // ── Conversations ────────────────────────────────────────────────

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self.tables.read().conversations.get(id).cloned())
    }

    async fn create_conversation(&self, conversation: Conversation) -> Result<Conversation> {
        {
            let mut tables = self.tables.write();
            tables
                .conversations
                .insert(conversation.id.clone(), conversation.clone());
        }
        self.persist_conversations().await?;
        Ok(conversation)
    }

    async fn list_conversations(&self, device_id: &str) -> Result<Vec<Conversation>> {
        let mut list: Vec<Conversation> = self
            .tables
            .read()
            .conversations
            .values()
            .filter(|c| c.active && c.device_id == device_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(list)
    }

    async fn rename_conversation(&self, id: &str, title: &str) -> Result<()> {
        self.update_conversation(id, |c| {
            c.title = title.to_owned();
        })
        .await
    }

    async fn set_pinned(&self, id: &str, pinned: bool) -> Result<()> {
        self.update_conversation(id, |c| {
            c.pinned = pinned;
        })
        .await
    }

    async fn set_share_token(&self, id: &str, token: &str) -> Result<()> {
        let token = token.to_owned();
        self.update_conversation(id, move |c| {
            c.share_token = Some(token);
        })
        .await
    }

    async fn deactivate_conversation(&self, id: &str) -> Result<()> {
        self.update_conversation(id, |c| {
            c.active = false;
        })
        .await
    }

    async fn touch_conversation(&self, id: &str) -> Result<()> {
        self.update_conversation(id, |_| {}).await
    }

    // ── Turn messages ────────────────────────────────────────────────

    async fn create_message(&self, message: TurnMessage) -> Result<TurnMessage> {
        {
            let mut tables = self.tables.write();
            tables
                .messages
                .entry(message.conversation_id.clone())
                .or_default()
                .push(message.clone());
        }
        self.persist_messages().await?;
        Ok(message)
    }

    async fn update_message_content(
        &self,
        conversation_id: &str,
        message_id: &str,
        content: &str,
        sources: Option<Vec<String>>,
    ) -> Result<()> {
        {
            let mut tables = self.tables.write();
            let rows = tables
                .messages
                .get_mut(conversation_id)
                .ok_or_else(|| Error::NotFound(format!("conversation {conversation_id}")))?;
            let row = rows
                .iter_mut()
                .find(|m| m.id == message_id)
                .ok_or_else(|| Error::NotFound(format!("message {message_id}")))?;
            row.content = content.to_owned();
            if sources.is_some() {
                row.sources = sources;
            }
        }
        self.persist_messages().await
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<TurnMessage>> {
        Ok(self
            .tables
            .read()
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    // ── Documents & links ────────────────────────────────────────────

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.tables.read().documents.get(id).cloned())
    }

    async fn list_documents(&self, device_id: &str) -> Result<Vec<Document>> {
        Ok(self
            .tables
            .read()
            .documents
            .values()
            .filter(|d| d.active && d.device_id == device_id)
            .cloned()
            .collect())
    }

    async fn link_documents(&self, conversation_id: &str, document_ids: &[String]) -> Result<()> {
        if document_ids.is_empty() {
            return Ok(());
        }
        {
            let mut tables = self.tables.write();
            for doc_id in document_ids {
                tables.links.push(DocumentLink {
                    conversation_id: conversation_id.to_owned(),
                    document_id: doc_id.clone(),
                });
            }
        }
        self.persist_links().await
    }

    async fn linked_documents(&self, conversation_id: &str) -> Result<Vec<String>> {
        Ok(self
            .tables
            .read()
            .links
            .iter()
            .filter(|l| l.conversation_id == conversation_id)
            .map(|l| l.document_id.clone())
            .collect())
    }
}

impl JsonStore {
    async fn update_conversation<F>(&self, id: &str, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Conversation) + Send,
    {
        {
            let mut tables = self.tables.write();
            let conv = tables
                .conversations
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(format!("conversation {id}")))?;
            mutate(conv);
            conv.updated_at = Utc::now();
        }
        self.persist_conversations().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Role;

    fn store() -> JsonStore {
        JsonStore::in_memory()
    }

    fn doc(id: &str, name: &str, device: &str) -> Document {
        Document {
            id: id.into(),
            name: name.into(),
            content: "text".into(),
            byte_size: 4,
            active: true,
            device_id: device.into(),
        }
    }

    #[tokio::test]
    async fn create_and_get_conversation() {
        let s = store();
        let conv = s
            .create_conversation(Conversation::new("dev-1", "hello"))
            .await
            .unwrap();
        let loaded = s.get_conversation(&conv.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "hello");
        assert!(loaded.active);
    }

    #[tokio::test]
    async fn deactivated_conversation_hidden_from_list() {
        let s = store();
        let conv = s
            .create_conversation(Conversation::new("dev-1", "hello"))
            .await
            .unwrap();
        assert_eq!(s.list_conversations("dev-1").await.unwrap().len(), 1);

        s.deactivate_conversation(&conv.id).await.unwrap();
        assert!(s.list_conversations("dev-1").await.unwrap().is_empty());
        // The row itself survives soft deletion.
        assert!(s.get_conversation(&conv.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_is_scoped_to_device() {
        let s = store();
        s.create_conversation(Conversation::new("dev-1", "a"))
            .await
            .unwrap();
        s.create_conversation(Conversation::new("dev-2", "b"))
            .await
            .unwrap();
        assert_eq!(s.list_conversations("dev-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn placeholder_update_in_place() {
        let s = store();
        let conv = s
            .create_conversation(Conversation::new("dev-1", "hi"))
            .await
            .unwrap();
        s.create_message(TurnMessage::user(&conv.id, "hi")).await.unwrap();
        let placeholder = s
            .create_message(TurnMessage::assistant_placeholder(&conv.id, "m"))
            .await
            .unwrap();

        s.update_message_content(
            &conv.id,
            &placeholder.id,
            "final answer",
            Some(vec!["notes.txt".into()]),
        )
        .await
        .unwrap();

        let rows = s.list_messages(&conv.id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].role, Role::Assistant);
        assert_eq!(rows[1].content, "final answer");
        assert_eq!(rows[1].sources.as_deref(), Some(&["notes.txt".to_string()][..]));
    }

    #[tokio::test]
    async fn update_unknown_message_is_not_found() {
        let s = store();
        let conv = s
            .create_conversation(Conversation::new("dev-1", "hi"))
            .await
            .unwrap();
        let err = s
            .update_message_content(&conv.id, "nope", "x", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn links_accumulate_per_conversation() {
        let s = store();
        s.insert_document(doc("d1", "a.txt", "dev-1"));
        s.insert_document(doc("d2", "b.txt", "dev-1"));
        let conv = s
            .create_conversation(Conversation::new("dev-1", "hi"))
            .await
            .unwrap();

        s.link_documents(&conv.id, &["d1".into(), "d2".into()])
            .await
            .unwrap();
        let linked = s.linked_documents(&conv.id).await.unwrap();
        assert_eq!(linked, vec!["d1", "d2"]);
    }

    #[tokio::test]
    async fn inactive_documents_hidden_from_list() {
        let s = store();
        let mut d = doc("d1", "a.txt", "dev-1");
        d.active = false;
        s.insert_document(d);
        assert!(s.list_documents("dev-1").await.unwrap().is_empty());
        // Direct get still resolves (the caller decides how to treat it).
        assert!(s.get_document("d1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let conv_id = {
            let s = JsonStore::open(dir.path()).unwrap();
            let conv = s
                .create_conversation(Conversation::new("dev-1", "persist me"))
                .await
                .unwrap();
            s.create_message(TurnMessage::user(&conv.id, "persist me"))
                .await
                .unwrap();
            s.flush().await.unwrap();
            conv.id
        };

        let reopened = JsonStore::open(dir.path()).unwrap();
        let conv = reopened.get_conversation(&conv_id).await.unwrap().unwrap();
        assert_eq!(conv.title, "persist me");
        assert_eq!(reopened.list_messages(&conv_id).await.unwrap().len(), 1);
    }
}
