//! `KbApi` implementation for `HttpKbClient`.

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::debug;

use kbqa_common::{Conversation, Document, KnowledgeBase, Message};

use crate::streaming::FrameStream;
use crate::{AskRequest, ClientError, KbApi};

use super::client::{check_status, transport_error, HttpKbClient};

#[derive(Serialize)]
struct AddDocumentsBody<'a> {
    urls: &'a [String],
}

#[async_trait]
impl KbApi for HttpKbClient {
    async fn ask(&self, request: &AskRequest) -> Result<FrameStream, ClientError> {
        debug!(kb = %request.knowledge_base_id, "ask request");

        // No request timeout: the body streams for as long as the answer takes.
        let response = self
            .http
            .post(self.url("/chat/ask"))
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        let bytes = response
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(transport_error)
            .boxed();
        Ok(FrameStream::new(bytes))
    }

    async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, ClientError> {
        self.send_json(self.http.get(self.url("/knowledge/bases")))
            .await
    }

    async fn get_knowledge_base(&self, id: &str) -> Result<KnowledgeBase, ClientError> {
        self.send_json(self.http.get(self.url(&format!("/knowledge/bases/{id}"))))
            .await
    }

    async fn list_documents(&self, knowledge_base_id: &str) -> Result<Vec<Document>, ClientError> {
        let url = self.url(&format!("/knowledge/bases/{knowledge_base_id}/documents"));
        self.send_json(self.http.get(url)).await
    }

    async fn add_documents(
        &self,
        knowledge_base_id: &str,
        urls: &[String],
    ) -> Result<Vec<Document>, ClientError> {
        let url = self.url(&format!("/knowledge/bases/{knowledge_base_id}/documents"));
        self.send_json(self.http.post(url).json(&AddDocumentsBody { urls }))
            .await
    }

    async fn delete_document(
        &self,
        knowledge_base_id: &str,
        document_id: &str,
    ) -> Result<(), ClientError> {
        let url = self.url(&format!(
            "/knowledge/bases/{knowledge_base_id}/documents/{document_id}"
        ));
        self.send_empty(self.http.delete(url)).await
    }

    async fn list_conversations(
        &self,
        knowledge_base_id: &str,
    ) -> Result<Vec<Conversation>, ClientError> {
        let request = self
            .http
            .get(self.url("/chat/conversations"))
            .query(&[("knowledge_base_id", knowledge_base_id)]);
        self.send_json(request).await
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>, ClientError> {
        let url = self.url(&format!("/chat/conversations/{conversation_id}/messages"));
        self.send_json(self.http.get(url)).await
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ClientError> {
        let url = self.url(&format!("/chat/conversations/{conversation_id}"));
        self.send_empty(self.http.delete(url)).await
    }
}
