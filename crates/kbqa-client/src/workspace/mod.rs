//! Chat workspace: the owner of shared chat state.
//!
//! Holds the selected knowledge base, the active conversation, the
//! transcript, the in-flight session guard, the notification queue and the
//! conversation directory. Stream sessions are created only here.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use kbqa_common::{
    Conversation, Event, EventBus, KnowledgeBase, Message, Notification, NotificationQueue,
};

use crate::directory::{ConversationDirectory, PendingDeletion};
use crate::session::{Liveness, SessionOutcome, StreamSession};
use crate::transcript::Transcript;
use crate::{AskRequest, ClientError, KbApi};

/// Mutable chat state guarded by one lock.
pub(crate) struct ChatState {
    pub(crate) knowledge_base_id: Option<String>,
    pub(crate) active_conversation: Option<String>,
    pub(crate) transcript: Transcript,
    pub(crate) in_flight: Option<Liveness>,
    pub(crate) notifications: NotificationQueue,
}

impl ChatState {
    /// Detach any in-flight session from the transcript.
    fn detach(&mut self) {
        if let Some(liveness) = self.in_flight.take() {
            debug!("detaching in-flight session");
            liveness.revoke();
        }
    }

    fn is_streaming(&self) -> bool {
        self.in_flight.as_ref().is_some_and(Liveness::is_live)
    }

    pub(crate) fn transcript_changed(&self) -> Event {
        Event::TranscriptChanged {
            epoch: self.transcript.epoch(),
            len: self.transcript.len(),
        }
    }
}

/// Lock order: `chat` before `directory`.
pub(crate) struct Shared {
    pub(crate) api: Arc<dyn KbApi>,
    pub(crate) chat: Mutex<ChatState>,
    pub(crate) directory: Mutex<ConversationDirectory>,
    pub(crate) events: Arc<EventBus>,
}

/// Fetch the conversation list for `knowledge_base_id` into the directory.
///
/// Returns the number of conversations installed; a result for a knowledge
/// base that is no longer active installs nothing and returns 0.
pub(crate) async fn refresh_directory(
    shared: &Shared,
    knowledge_base_id: &str,
) -> Result<usize, ClientError> {
    let conversations = shared.api.list_conversations(knowledge_base_id).await?;
    let count = conversations.len();

    let applied = shared
        .directory
        .lock()
        .await
        .apply_refresh(knowledge_base_id, conversations);
    if !applied {
        return Ok(0);
    }

    debug!(kb = %knowledge_base_id, count, "conversation list refreshed");
    shared.events.publish(Event::DirectoryRefreshed {
        knowledge_base_id: knowledge_base_id.to_string(),
        count,
    });
    Ok(count)
}

/// Front-end facing handle to the chat state.
#[derive(Clone)]
pub struct ChatWorkspace {
    shared: Arc<Shared>,
}

impl ChatWorkspace {
    pub fn new(api: Arc<dyn KbApi>, notification_capacity: usize) -> Self {
        Self::with_event_bus(api, notification_capacity, Arc::new(EventBus::default()))
    }

    pub fn with_event_bus(
        api: Arc<dyn KbApi>,
        notification_capacity: usize,
        events: Arc<EventBus>,
    ) -> Self {
        let chat = ChatState {
            knowledge_base_id: None,
            active_conversation: None,
            transcript: Transcript::new(),
            in_flight: None,
            notifications: NotificationQueue::new(notification_capacity),
        };
        Self {
            shared: Arc::new(Shared {
                api,
                chat: Mutex::new(chat),
                directory: Mutex::new(ConversationDirectory::new()),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.events.subscribe()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.shared.events)
    }

    pub fn api(&self) -> Arc<dyn KbApi> {
        Arc::clone(&self.shared.api)
    }

    // -- Knowledge base --------------------------------------------------

    pub async fn knowledge_base_id(&self) -> Option<String> {
        self.shared.chat.lock().await.knowledge_base_id.clone()
    }

    /// Switch the selected knowledge base.
    ///
    /// Abandons any in-flight session, clears the active conversation and the
    /// transcript, then refreshes the conversation directory for the new
    /// knowledge base. Selecting the current knowledge base again is a no-op.
    pub async fn select_knowledge_base(&self, knowledge_base_id: Option<&str>) -> Result<(), ClientError> {
        {
            let mut chat = self.shared.chat.lock().await;
            if chat.knowledge_base_id.as_deref() == knowledge_base_id {
                return Ok(());
            }
            info!(kb = ?knowledge_base_id, "selecting knowledge base");
            chat.detach();
            chat.knowledge_base_id = knowledge_base_id.map(str::to_string);
            chat.active_conversation = None;
            chat.transcript.clear();
            self.shared.events.publish(chat.transcript_changed());
            self.shared
                .directory
                .lock()
                .await
                .switch_to(knowledge_base_id);
        }

        match knowledge_base_id {
            Some(id) => refresh_directory(&self.shared, id).await.map(|_| ()),
            None => Ok(()),
        }
    }

    /// Select the first knowledge base the server lists, unless one is
    /// already selected.
    pub async fn auto_select_first_knowledge_base(&self) -> Result<Option<KnowledgeBase>, ClientError> {
        if self.knowledge_base_id().await.is_some() {
            return Ok(None);
        }

        let first = self
            .shared
            .api
            .list_knowledge_bases()
            .await?
            .into_iter()
            .next();
        if let Some(kb) = &first {
            self.select_knowledge_base(Some(&kb.id)).await?;
        }
        Ok(first)
    }

    // -- Conversations ---------------------------------------------------

    pub async fn active_conversation(&self) -> Option<String> {
        self.shared.chat.lock().await.active_conversation.clone()
    }

    /// Bind a stored conversation and load its history.
    ///
    /// The transcript is cleared immediately. History that arrives after
    /// another switch has replaced the transcript is discarded; otherwise it
    /// is inserted ahead of anything submitted in the meantime.
    pub async fn select_conversation(&self, conversation_id: &str) -> Result<(), ClientError> {
        let epoch = {
            let mut chat = self.shared.chat.lock().await;
            chat.detach();
            chat.active_conversation = Some(conversation_id.to_string());
            chat.transcript.clear();
            self.shared.events.publish(chat.transcript_changed());
            chat.transcript.epoch()
        };

        let messages = match self.shared.api.get_messages(conversation_id).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(conversation = %conversation_id, error = %e, "failed to load history");
                self.shared
                    .chat
                    .lock()
                    .await
                    .notifications
                    .push(Notification::error("Failed to load conversation", e.to_string()));
                return Err(e);
            }
        };

        let mut chat = self.shared.chat.lock().await;
        if chat.transcript.epoch() != epoch
            || chat.active_conversation.as_deref() != Some(conversation_id)
        {
            debug!(conversation = %conversation_id, "discarding stale history");
            return Ok(());
        }
        debug!(conversation = %conversation_id, count = messages.len(), "history loaded");
        // A session submitted while loading keeps its entries after the history.
        chat.transcript.prepend_history(messages);
        self.shared.events.publish(chat.transcript_changed());
        Ok(())
    }

    /// Start a fresh chat: no bound conversation, empty transcript.
    pub async fn new_conversation(&self) {
        let mut chat = self.shared.chat.lock().await;
        chat.detach();
        chat.active_conversation = None;
        chat.transcript.clear();
        self.shared.events.publish(chat.transcript_changed());
    }

    /// Cached conversation summaries for the selected knowledge base.
    pub async fn conversations(&self) -> Vec<Conversation> {
        self.shared.directory.lock().await.conversations().to_vec()
    }

    pub async fn refresh_conversations(&self) -> Result<usize, ClientError> {
        match self.knowledge_base_id().await {
            Some(id) => refresh_directory(&self.shared, &id).await,
            None => Ok(0),
        }
    }

    /// First step of a deletion. Nothing happens until the returned value is
    /// passed to [`ChatWorkspace::confirm_delete`].
    pub async fn request_delete(&self, conversation_id: &str) -> PendingDeletion {
        let title = self
            .shared
            .directory
            .lock()
            .await
            .get(conversation_id)
            .map(|c| c.title.clone());
        PendingDeletion {
            conversation_id: conversation_id.to_string(),
            title,
        }
    }

    /// Delete on the server, then drop the cache entry. Deleting the bound
    /// conversation also clears the active reference and the transcript.
    pub async fn confirm_delete(&self, pending: PendingDeletion) -> Result<(), ClientError> {
        let id = pending.conversation_id;
        if let Err(e) = self.shared.api.delete_conversation(&id).await {
            warn!(conversation = %id, error = %e, "conversation delete failed");
            self.shared
                .chat
                .lock()
                .await
                .notifications
                .push(Notification::error("Failed to delete conversation", e.to_string()));
            return Err(e);
        }
        info!(conversation = %id, "conversation deleted");

        {
            let mut directory = self.shared.directory.lock().await;
            directory.remove(&id);
            if let Some(kb) = directory.knowledge_base_id() {
                self.shared.events.publish(Event::DirectoryRefreshed {
                    knowledge_base_id: kb.to_string(),
                    count: directory.conversations().len(),
                });
            }
        }

        let mut chat = self.shared.chat.lock().await;
        if chat.active_conversation.as_deref() == Some(id.as_str()) {
            chat.detach();
            chat.active_conversation = None;
            chat.transcript.clear();
            self.shared.events.publish(chat.transcript_changed());
        }
        Ok(())
    }

    // -- Asking ----------------------------------------------------------

    /// Start a stream session for `question`.
    ///
    /// Returns `None` without touching any state when the question is blank,
    /// no knowledge base is selected, or a session is already in flight.
    pub async fn submit(&self, question: &str) -> Option<StreamSession> {
        let question = question.trim();
        if question.is_empty() {
            return None;
        }

        let mut chat = self.shared.chat.lock().await;
        let Some(knowledge_base_id) = chat.knowledge_base_id.clone() else {
            debug!("submit ignored, no knowledge base selected");
            return None;
        };
        if chat.is_streaming() {
            debug!("submit ignored, a session is in flight");
            return None;
        }

        let request = AskRequest {
            question: question.to_string(),
            knowledge_base_id,
            conversation_id: chat.active_conversation.clone(),
        };
        let mut session = StreamSession::new(Arc::clone(&self.shared), request);
        session.begin(&mut chat);
        self.shared.events.publish(chat.transcript_changed());
        Some(session)
    }

    /// Submit and run a session to its end.
    pub async fn ask(&self, question: &str) -> Option<SessionOutcome> {
        let mut session = self.submit(question).await?;
        Some(session.run().await)
    }

    // -- Read-only views -------------------------------------------------

    pub async fn snapshot(&self) -> Vec<Message> {
        self.shared.chat.lock().await.transcript.snapshot().to_vec()
    }

    pub async fn transcript_epoch(&self) -> u64 {
        self.shared.chat.lock().await.transcript.epoch()
    }

    /// Id of the mutable tail while an answer is streaming.
    pub async fn tail_id(&self) -> Option<String> {
        self.shared
            .chat
            .lock()
            .await
            .transcript
            .tail_id()
            .map(str::to_string)
    }

    pub async fn is_streaming(&self) -> bool {
        self.shared.chat.lock().await.is_streaming()
    }

    /// Drain queued notifications, oldest first.
    pub async fn take_notifications(&self) -> Vec<Notification> {
        self.shared.chat.lock().await.notifications.drain()
    }
}

impl std::fmt::Debug for ChatWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatWorkspace").finish_non_exhaustive()
    }
}
