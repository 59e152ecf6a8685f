use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// The transcript was appended to, rolled back or replaced.
    TranscriptChanged { epoch: u64, len: usize },
    /// A token delta was applied to the streaming answer.
    AnswerDelta { delta: String },
    ConversationBound(String),
    SessionCompleted { conversation_id: Option<String> },
    SessionFailed(String),
    DirectoryRefreshed { knowledge_base_id: String, count: usize },
    DocumentsUpdated { knowledge_base_id: String, in_progress: usize },
    Shutdown,
    #[serde(other)]
    Unknown,
}

pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: Event) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
