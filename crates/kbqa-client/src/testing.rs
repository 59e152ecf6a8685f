//! Scripted in-memory `KbApi` for driving sessions and the workspace.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};

use kbqa_common::{Conversation, Document, DocumentStatus, KnowledgeBase, Message, Role};

use crate::streaming::FrameStream;
use crate::{AskRequest, ClientError, KbApi};

pub(crate) type ChunkSender = mpsc::UnboundedSender<Result<Vec<u8>, ClientError>>;

/// How the next ask call answers.
pub(crate) enum AskScript {
    Chunks(Vec<Result<Vec<u8>, ClientError>>),
    /// Body chunks fed by the test through the paired sender.
    Live(mpsc::UnboundedReceiver<Result<Vec<u8>, ClientError>>),
    Reject(ClientError),
}

#[derive(Default)]
pub(crate) struct ScriptedApi {
    asks: Mutex<VecDeque<AskScript>>,
    pub(crate) requests: Mutex<Vec<AskRequest>>,
    knowledge_bases: Mutex<Vec<KnowledgeBase>>,
    conversations: Mutex<HashMap<String, Result<Vec<Conversation>, ClientError>>>,
    histories: Mutex<HashMap<String, Vec<Message>>>,
    history_gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    documents: Mutex<VecDeque<Result<Vec<Document>, ClientError>>>,
    delete_error: Mutex<Option<ClientError>>,
    pub(crate) conversation_fetches: AtomicUsize,
    pub(crate) document_fetches: AtomicUsize,
    pub(crate) deletes: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_ask(&self, script: AskScript) {
        self.asks.lock().unwrap().push_back(script);
    }

    /// Queue a live ask body and return its feeding end.
    pub(crate) fn push_live_ask(&self) -> ChunkSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push_ask(AskScript::Live(rx));
        tx
    }

    pub(crate) fn set_knowledge_bases(&self, kbs: Vec<KnowledgeBase>) {
        *self.knowledge_bases.lock().unwrap() = kbs;
    }

    pub(crate) fn set_conversations(
        &self,
        knowledge_base_id: &str,
        result: Result<Vec<Conversation>, ClientError>,
    ) {
        self.conversations
            .lock()
            .unwrap()
            .insert(knowledge_base_id.to_string(), result);
    }

    pub(crate) fn set_history(&self, conversation_id: &str, messages: Vec<Message>) {
        self.histories
            .lock()
            .unwrap()
            .insert(conversation_id.to_string(), messages);
    }

    /// Hold the history response for `conversation_id` until the returned
    /// sender fires.
    pub(crate) fn gate_history(&self, conversation_id: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.history_gates
            .lock()
            .unwrap()
            .insert(conversation_id.to_string(), rx);
        tx
    }

    /// Queue document list responses; the last one repeats once the queue
    /// runs dry.
    pub(crate) fn push_documents(&self, result: Result<Vec<Document>, ClientError>) {
        self.documents.lock().unwrap().push_back(result);
    }

    pub(crate) fn fail_deletes(&self, error: ClientError) {
        *self.delete_error.lock().unwrap() = Some(error);
    }

    pub(crate) fn asked(&self) -> Vec<AskRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl KbApi for ScriptedApi {
    async fn ask(&self, request: &AskRequest) -> Result<FrameStream, ClientError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .asks
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(AskScript::Chunks(Vec::new()));

        match script {
            AskScript::Chunks(chunks) => Ok(FrameStream::from_chunks(chunks)),
            AskScript::Live(rx) => {
                let body = futures_util::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                });
                Ok(FrameStream::new(body.boxed()))
            }
            AskScript::Reject(e) => Err(e),
        }
    }

    async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, ClientError> {
        Ok(self.knowledge_bases.lock().unwrap().clone())
    }

    async fn get_knowledge_base(&self, id: &str) -> Result<KnowledgeBase, ClientError> {
        self.knowledge_bases
            .lock()
            .unwrap()
            .iter()
            .find(|kb| kb.id == id)
            .cloned()
            .ok_or_else(|| ClientError::Api {
                status: 404,
                message: "Knowledge base not found".into(),
            })
    }

    async fn list_documents(&self, _knowledge_base_id: &str) -> Result<Vec<Document>, ClientError> {
        self.document_fetches.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.documents.lock().unwrap();
        if queue.len() > 1 {
            return queue.pop_front().unwrap_or(Ok(Vec::new()));
        }
        queue.front().cloned().unwrap_or(Ok(Vec::new()))
    }

    async fn add_documents(
        &self,
        _knowledge_base_id: &str,
        urls: &[String],
    ) -> Result<Vec<Document>, ClientError> {
        Ok(urls
            .iter()
            .enumerate()
            .map(|(i, url)| document(&format!("d{i}"), url, DocumentStatus::Pending))
            .collect())
    }

    async fn delete_document(
        &self,
        _knowledge_base_id: &str,
        _document_id: &str,
    ) -> Result<(), ClientError> {
        Ok(())
    }

    async fn list_conversations(
        &self,
        knowledge_base_id: &str,
    ) -> Result<Vec<Conversation>, ClientError> {
        self.conversation_fetches.fetch_add(1, Ordering::SeqCst);
        self.conversations
            .lock()
            .unwrap()
            .get(knowledge_base_id)
            .cloned()
            .unwrap_or(Ok(Vec::new()))
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>, ClientError> {
        let gate = self.history_gates.lock().unwrap().remove(conversation_id);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.histories
            .lock()
            .unwrap()
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| ClientError::Api {
                status: 404,
                message: "Conversation not found".into(),
            })
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ClientError> {
        if let Some(e) = self.delete_error.lock().unwrap().clone() {
            return Err(e);
        }
        self.deletes.lock().unwrap().push(conversation_id.to_string());
        Ok(())
    }
}

pub(crate) fn meta(conversation_id: &str) -> Vec<u8> {
    format!("data: {{\"type\":\"meta\",\"conversation_id\":\"{conversation_id}\"}}\n\n").into_bytes()
}

pub(crate) fn token(content: &str) -> Vec<u8> {
    format!(
        "data: {}\n\n",
        serde_json::json!({ "type": "token", "content": content })
    )
    .into_bytes()
}

pub(crate) fn sources(items: &[(&str, &str, &str)]) -> Vec<u8> {
    let sources: Vec<_> = items
        .iter()
        .map(|(url, title, chunk)| serde_json::json!({ "url": url, "title": title, "chunk_text": chunk }))
        .collect();
    format!(
        "data: {}\n\n",
        serde_json::json!({ "type": "sources", "sources": sources })
    )
    .into_bytes()
}

pub(crate) fn knowledge_base(id: &str) -> KnowledgeBase {
    KnowledgeBase {
        id: id.into(),
        name: format!("KB {id}"),
        description: String::new(),
        document_count: 0,
        created_at: "2024-05-01T10:00:00".into(),
        updated_at: "2024-05-01T10:00:00".into(),
    }
}

pub(crate) fn conversation(id: &str, knowledge_base_id: &str) -> Conversation {
    Conversation {
        id: id.into(),
        knowledge_base_id: knowledge_base_id.into(),
        title: format!("Conversation {id}"),
        created_at: "2024-05-01T10:00:00".into(),
        updated_at: "2024-05-01T10:00:00".into(),
    }
}

pub(crate) fn history_message(id: &str, role: Role, content: &str) -> Message {
    Message {
        id: id.into(),
        role,
        content: content.into(),
        sources: Vec::new(),
        created_at: "2024-05-01T10:00:00".into(),
    }
}

pub(crate) fn document(id: &str, url: &str, status: DocumentStatus) -> Document {
    Document {
        id: id.into(),
        url: url.into(),
        title: None,
        status,
        chunk_count: 0,
        error_message: None,
        created_at: "2024-05-01T10:00:00".into(),
    }
}
