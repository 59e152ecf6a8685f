//! Client engine for kbqa.
//!
//! Provides the knowledge-base server client with:
//! - Incremental decoding of the streamed answer protocol
//! - A transcript with a single mutable tail
//! - Stream sessions that own one ask-request lifecycle
//! - A chat workspace tying sessions, transcript and conversation cache together
//! - Predicate-gated polling of document ingestion status

pub mod directory;
pub mod documents;
pub mod http;
pub mod reconciler;
pub mod session;
pub mod streaming;
pub mod transcript;
pub mod workspace;

use async_trait::async_trait;
use serde::Serialize;

use kbqa_common::{Conversation, Document, KnowledgeBase, Message};

pub use directory::{ConversationDirectory, PendingDeletion};
pub use documents::{parse_document_urls, DocumentWatch};
pub use http::{HttpConfig, HttpKbClient};
pub use reconciler::{PollingReconciler, ReconcileEvent};
pub use session::{Liveness, SessionOutcome, SessionState, StreamSession};
pub use streaming::{Frame, FrameDecoder, FrameStream};
pub use transcript::{Transcript, TranscriptError};
pub use workspace::ChatWorkspace;

/// Transport seam to the knowledge-base server.
#[async_trait]
pub trait KbApi: Send + Sync {
    /// Start an answer stream. Non-success statuses fail here; the returned
    /// stream fails only on transport errors.
    async fn ask(&self, request: &AskRequest) -> Result<FrameStream, ClientError>;

    async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, ClientError>;

    async fn get_knowledge_base(&self, id: &str) -> Result<KnowledgeBase, ClientError>;

    async fn list_documents(&self, knowledge_base_id: &str) -> Result<Vec<Document>, ClientError>;

    async fn add_documents(
        &self,
        knowledge_base_id: &str,
        urls: &[String],
    ) -> Result<Vec<Document>, ClientError>;

    async fn delete_document(
        &self,
        knowledge_base_id: &str,
        document_id: &str,
    ) -> Result<(), ClientError>;

    async fn list_conversations(
        &self,
        knowledge_base_id: &str,
    ) -> Result<Vec<Conversation>, ClientError>;

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>, ClientError>;

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ClientError>;
}

/// Body of the ask endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AskRequest {
    pub question: String,
    pub knowledge_base_id: String,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error: HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("timeout")]
    Timeout,
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<ClientError> for kbqa_common::KbqaError {
    fn from(err: ClientError) -> Self {
        kbqa_common::KbqaError::Client(err.to_string())
    }
}

#[cfg(test)]
pub(crate) mod testing;
