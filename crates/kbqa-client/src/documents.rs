//! Document intake and ingestion-status watching.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use kbqa_common::{Document, Event, EventBus};

use crate::reconciler::{PollingReconciler, ReconcileEvent};
use crate::{ClientError, KbApi};

/// Default ingestion polling period.
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_secs(3);

/// Split free-form input into document URLs.
///
/// Entries are separated by any whitespace; only `http://` and `https://`
/// URLs are kept. Fails with `InvalidInput` when nothing usable remains.
pub fn parse_document_urls(input: &str) -> Result<Vec<String>, ClientError> {
    let urls: Vec<String> = input
        .split_whitespace()
        .filter(|entry| entry.starts_with("http://") || entry.starts_with("https://"))
        .map(str::to_string)
        .collect();

    if urls.is_empty() {
        return Err(ClientError::InvalidInput(
            "no http:// or https:// URLs found".into(),
        ));
    }
    Ok(urls)
}

/// Parse `input` and submit the URLs to a knowledge base.
pub async fn add_documents(
    api: &dyn KbApi,
    knowledge_base_id: &str,
    input: &str,
) -> Result<Vec<Document>, ClientError> {
    let urls = parse_document_urls(input)?;
    info!(kb = %knowledge_base_id, count = urls.len(), "adding documents");
    api.add_documents(knowledge_base_id, &urls).await
}

/// Whether any document is still being ingested.
pub fn any_in_progress(documents: &[Document]) -> bool {
    documents.iter().any(|d| d.status.is_in_progress())
}

pub type DocumentEvents = mpsc::Receiver<ReconcileEvent<Vec<Document>>>;

/// Polls a knowledge base's documents while any of them is still ingesting.
///
/// At most one reconciler is live at a time: watching another knowledge
/// base (or none) cancels the previous one first.
pub struct DocumentWatch {
    api: Arc<dyn KbApi>,
    period: Duration,
    events: Option<Arc<EventBus>>,
    current: Option<PollingReconciler<String>>,
}

impl DocumentWatch {
    pub fn new(api: Arc<dyn KbApi>, period: Duration) -> Self {
        Self {
            api,
            period,
            events: None,
            current: None,
        }
    }

    /// Also publish `DocumentsUpdated` on the bus after every fetch.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Watch `knowledge_base_id`, or nothing when `None`.
    pub fn watch(&mut self, knowledge_base_id: Option<&str>) -> Option<DocumentEvents> {
        self.teardown();
        let knowledge_base_id = knowledge_base_id?;

        let api = Arc::clone(&self.api);
        let events = self.events.clone();
        let kb = knowledge_base_id.to_string();
        let fetch = move || {
            let api = Arc::clone(&api);
            let events = events.clone();
            let kb = kb.clone();
            async move {
                let documents = api.list_documents(&kb).await?;
                if let Some(events) = events {
                    let in_progress = documents
                        .iter()
                        .filter(|d| d.status.is_in_progress())
                        .count();
                    events.publish(Event::DocumentsUpdated {
                        knowledge_base_id: kb,
                        in_progress,
                    });
                }
                Ok::<_, ClientError>(documents)
            }
        };

        let (reconciler, rx) = PollingReconciler::spawn(
            knowledge_base_id.to_string(),
            self.period,
            fetch,
            |documents: &Vec<Document>| any_in_progress(documents),
        );
        self.current = Some(reconciler);
        Some(rx)
    }

    /// Start over on the watched knowledge base, e.g. after adding documents.
    pub fn restart(&mut self) -> Option<DocumentEvents> {
        let knowledge_base_id = self.watched()?.to_string();
        self.watch(Some(&knowledge_base_id))
    }

    pub fn watched(&self) -> Option<&str> {
        self.current.as_ref().map(|r| r.resource().as_str())
    }

    /// Whether a fetch is scheduled or running.
    pub fn is_polling(&self) -> bool {
        self.current.as_ref().is_some_and(|r| !r.is_finished())
    }

    /// Cancel the current reconciler, if any.
    pub fn teardown(&mut self) {
        if let Some(previous) = self.current.take() {
            debug!(kb = %previous.resource(), "stopping document watch");
            previous.cancel();
        }
    }
}

impl std::fmt::Debug for DocumentWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentWatch")
            .field("period", &self.period)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}
