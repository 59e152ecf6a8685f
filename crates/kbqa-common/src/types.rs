//! Records exchanged with the knowledge-base server.
//!
//! Timestamps stay as the server's ISO-8601 strings; nothing in the client
//! orders by them.

use serde::{Deserialize, Deserializer, Serialize};

use crate::id::{new_id, now_timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A retrieved passage cited by an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub chunk_text: String,
}

impl Source {
    /// Title to show for this source, falling back to the URL.
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => &self.url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sources: Vec<Source>,
    pub created_at: String,
}

impl Message {
    /// A locally created user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role: Role::User,
            content: content.into(),
            sources: Vec::new(),
            created_at: now_timestamp(),
        }
    }

    /// The empty assistant message shown while an answer streams in.
    pub fn assistant_placeholder() -> Self {
        Self {
            id: new_id(),
            role: Role::Assistant,
            content: String::new(),
            sources: Vec::new(),
            created_at: now_timestamp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub knowledge_base_id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    /// Whether ingestion is still running for a document in this status.
    pub fn is_in_progress(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_in_progress()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    pub status: DocumentStatus,
    #[serde(default)]
    pub chunk_count: u32,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: String,
}

impl Document {
    /// Title to show for this document. Blank while ingestion is running,
    /// so the URL stands in.
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => &self.url,
        }
    }

    /// The failure reason, if the document failed with a non-empty message.
    pub fn failure(&self) -> Option<&str> {
        if self.status != DocumentStatus::Failed {
            return None;
        }
        self.error_message
            .as_deref()
            .filter(|msg| !msg.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub document_count: u64,
    pub created_at: String,
    pub updated_at: String,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
