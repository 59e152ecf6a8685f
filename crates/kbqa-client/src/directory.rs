//! Conversation summary cache for the active knowledge base.

use tracing::debug;

use kbqa_common::Conversation;

/// Cached conversation list, keyed by the knowledge base it belongs to.
#[derive(Debug, Default, Clone)]
pub struct ConversationDirectory {
    knowledge_base_id: Option<String>,
    conversations: Vec<Conversation>,
}

impl ConversationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the cache at another knowledge base, dropping the old entries.
    pub fn switch_to(&mut self, knowledge_base_id: Option<&str>) {
        if self.knowledge_base_id.as_deref() != knowledge_base_id {
            self.conversations.clear();
        }
        self.knowledge_base_id = knowledge_base_id.map(str::to_string);
    }

    /// Install a refresh result. Results for a knowledge base that is no
    /// longer active are discarded and `false` is returned.
    pub fn apply_refresh(&mut self, knowledge_base_id: &str, conversations: Vec<Conversation>) -> bool {
        if self.knowledge_base_id.as_deref() != Some(knowledge_base_id) {
            debug!(kb = %knowledge_base_id, "discarding stale conversation list");
            return false;
        }
        self.conversations = conversations;
        true
    }

    /// Remove a cached entry, returning it if it was present.
    pub fn remove(&mut self, conversation_id: &str) -> Option<Conversation> {
        let index = self
            .conversations
            .iter()
            .position(|c| c.id == conversation_id)?;
        Some(self.conversations.remove(index))
    }

    pub fn get(&self, conversation_id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn knowledge_base_id(&self) -> Option<&str> {
        self.knowledge_base_id.as_deref()
    }
}

/// A deletion awaiting confirmation.
///
/// Dropping it without passing it to `ChatWorkspace::confirm_delete` cancels
/// the deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a pending deletion does nothing unless confirmed"]
pub struct PendingDeletion {
    pub(crate) conversation_id: String,
    pub(crate) title: Option<String>,
}

impl PendingDeletion {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Cached title, when the conversation is in the directory.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
}
