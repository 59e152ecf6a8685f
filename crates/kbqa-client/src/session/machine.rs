//! The ask-request state machine.

use std::sync::Arc;

use tracing::{debug, warn};

use kbqa_common::{new_id, Event, Message, Notification, Source};

use crate::streaming::Frame;
use crate::workspace::{refresh_directory, ChatState, Shared};
use crate::{AskRequest, ClientError};

use super::types::{Liveness, SessionOutcome, SessionState};

/// One ask-request lifecycle bound to the workspace transcript.
///
/// Created by `ChatWorkspace::submit`, which has already appended the user
/// message and the placeholder. Drive it with [`StreamSession::run`].
pub struct StreamSession {
    id: String,
    state: SessionState,
    request: AskRequest,
    liveness: Liveness,
    user_message_id: String,
    placeholder_id: String,
    bound_conversation: Option<String>,
    /// Whether this session set the workspace's active conversation.
    set_active: bool,
    answer: String,
    sources: Vec<Source>,
    error: Option<ClientError>,
    shared: Arc<Shared>,
}

impl StreamSession {
    pub(crate) fn new(shared: Arc<Shared>, request: AskRequest) -> Self {
        Self {
            id: new_id(),
            state: SessionState::Idle,
            bound_conversation: request.conversation_id.clone(),
            request,
            liveness: Liveness::new(),
            user_message_id: String::new(),
            placeholder_id: String::new(),
            set_active: false,
            answer: String::new(),
            sources: Vec::new(),
            error: None,
            shared,
        }
    }

    /// Append the user message and placeholder, moving to `Sending`.
    pub(crate) fn begin(&mut self, chat: &mut ChatState) {
        let user = Message::user(self.request.question.clone());
        let placeholder = Message::assistant_placeholder();
        self.user_message_id = user.id.clone();
        self.placeholder_id = placeholder.id.clone();

        chat.transcript.append(user);
        chat.transcript.append_tail(placeholder);
        chat.in_flight = Some(self.liveness.clone());
        self.transition(SessionState::Sending);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn request(&self) -> &AskRequest {
        &self.request
    }

    /// The conversation this session's answer is attached to, if known.
    pub fn bound_conversation(&self) -> Option<&str> {
        self.bound_conversation.as_deref()
    }

    /// Answer text accumulated so far.
    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    /// Send the request and consume the answer stream to a terminal state.
    pub async fn run(&mut self) -> SessionOutcome {
        if self.state != SessionState::Sending {
            warn!(session = %self.id, state = ?self.state, "run called outside Sending");
            return self.outcome();
        }

        debug!(
            session = %self.id,
            kb = %self.request.knowledge_base_id,
            conversation = ?self.request.conversation_id,
            "sending ask request"
        );
        let mut frames = match self.shared.api.ask(&self.request).await {
            Ok(frames) => frames,
            Err(e) => return self.fail(e).await,
        };

        loop {
            match frames.next_frame().await {
                Some(Ok(frame)) => {
                    if !self.apply(frame).await {
                        return self.abandon();
                    }
                }
                Some(Err(e)) => return self.fail(e).await,
                None => break,
            }
        }
        drop(frames);

        self.finalize().await
    }

    /// Apply one frame. Returns `false` once the session has been detached.
    async fn apply(&mut self, frame: Frame) -> bool {
        let shared = Arc::clone(&self.shared);
        let mut chat = shared.chat.lock().await;
        if !self.liveness.is_live() {
            return false;
        }
        if self.state == SessionState::Sending {
            self.transition(SessionState::Streaming);
        }

        match frame {
            Frame::Meta { conversation_id } => self.bind(&mut chat, conversation_id),
            Frame::Token { content } => {
                self.answer.push_str(&content);
                self.write_tail(&mut chat);
                self.shared.events.publish(Event::AnswerDelta { delta: content });
            }
            Frame::Sources { sources } => {
                self.sources = sources;
                self.write_tail(&mut chat);
            }
            Frame::Unknown => {}
        }
        true
    }

    fn bind(&mut self, chat: &mut ChatState, conversation_id: String) {
        if let Some(bound) = &self.bound_conversation {
            if *bound != conversation_id {
                debug!(
                    session = %self.id,
                    bound = %bound,
                    ignored = %conversation_id,
                    "ignoring second meta frame"
                );
            }
            return;
        }

        debug!(session = %self.id, conversation = %conversation_id, "conversation bound");
        if chat.active_conversation.is_none() {
            chat.active_conversation = Some(conversation_id.clone());
            self.set_active = true;
        }
        self.bound_conversation = Some(conversation_id.clone());
        self.shared
            .events
            .publish(Event::ConversationBound(conversation_id));
    }

    fn write_tail(&self, chat: &mut ChatState) {
        if chat.transcript.tail_id() != Some(self.placeholder_id.as_str()) {
            warn!(session = %self.id, "placeholder is no longer the transcript tail");
            return;
        }
        if let Err(e) = chat.transcript.replace_tail(&self.answer, &self.sources) {
            warn!(session = %self.id, error = %e, "failed to update answer");
        }
    }

    async fn finalize(&mut self) -> SessionOutcome {
        {
            let shared = Arc::clone(&self.shared);
            let mut chat = shared.chat.lock().await;
            if !self.liveness.is_live() {
                drop(chat);
                return self.abandon();
            }
            self.transition(SessionState::Finalizing);

            self.write_tail(&mut chat);
            if chat.transcript.tail_id() == Some(self.placeholder_id.as_str()) {
                chat.transcript.seal_tail();
            }
            release_in_flight(&mut chat, &self.liveness);
            self.shared.events.publish(chat.transcript_changed());
        }

        self.transition(SessionState::Completed);
        self.spawn_directory_refresh();
        self.shared.events.publish(Event::SessionCompleted {
            conversation_id: self.bound_conversation.clone(),
        });
        self.outcome()
    }

    fn spawn_directory_refresh(&self) {
        let shared = Arc::clone(&self.shared);
        let knowledge_base_id = self.request.knowledge_base_id.clone();
        let session = self.id.clone();
        tokio::spawn(async move {
            if let Err(e) = refresh_directory(&shared, &knowledge_base_id).await {
                warn!(
                    session = %session,
                    kb = %knowledge_base_id,
                    error = %e,
                    "conversation list refresh failed"
                );
            }
        });
    }

    async fn fail(&mut self, error: ClientError) -> SessionOutcome {
        let shared = Arc::clone(&self.shared);
        let mut chat = shared.chat.lock().await;
        if !self.liveness.is_live() {
            drop(chat);
            return self.abandon();
        }

        warn!(session = %self.id, error = %error, "ask request failed");
        self.unwind().apply(&mut chat);
        chat.notifications
            .push(Notification::error("Failed to get an answer", error.to_string()));
        self.shared.events.publish(chat.transcript_changed());
        drop(chat);

        self.transition(SessionState::Failed);
        self.shared
            .events
            .publish(Event::SessionFailed(error.to_string()));
        self.error = Some(error.clone());
        SessionOutcome::Failed(error)
    }

    fn unwind(&self) -> Unwind {
        Unwind {
            session: self.id.clone(),
            entry_ids: [self.user_message_id.clone(), self.placeholder_id.clone()],
            activated: if self.set_active {
                self.bound_conversation.clone()
            } else {
                None
            },
            liveness: self.liveness.clone(),
        }
    }

    fn abandon(&mut self) -> SessionOutcome {
        debug!(session = %self.id, "session detached, abandoning stream");
        self.transition(SessionState::Abandoned);
        SessionOutcome::Abandoned
    }

    fn transition(&mut self, next: SessionState) {
        debug!(session = %self.id, from = ?self.state, to = ?next, "session transition");
        self.state = next;
    }

    fn outcome(&self) -> SessionOutcome {
        match self.state {
            SessionState::Completed => SessionOutcome::Completed {
                conversation_id: self.bound_conversation.clone(),
                content: self.answer.clone(),
                sources: self.sources.clone(),
            },
            SessionState::Failed => match &self.error {
                Some(e) => SessionOutcome::Failed(e.clone()),
                None => SessionOutcome::Abandoned,
            },
            _ => SessionOutcome::Abandoned,
        }
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("knowledge_base_id", &self.request.knowledge_base_id)
            .field("bound_conversation", &self.bound_conversation)
            .field("answer_len", &self.answer.len())
            .finish()
    }
}

impl Drop for StreamSession {
    /// A session dropped mid-stream (or whose `run` future was cancelled)
    /// is rolled back like a failure, minus the notification.
    fn drop(&mut self) {
        if !self.state.is_in_flight() || !self.liveness.is_live() {
            return;
        }
        debug!(session = %self.id, state = ?self.state, "session dropped before finishing");

        let unwind = self.unwind();
        if let Ok(mut chat) = self.shared.chat.try_lock() {
            if unwind.apply(&mut chat) {
                self.shared.events.publish(chat.transcript_changed());
            }
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let shared = Arc::clone(&self.shared);
                runtime.spawn(async move {
                    let mut chat = shared.chat.lock().await;
                    if unwind.apply(&mut chat) {
                        shared.events.publish(chat.transcript_changed());
                    }
                });
            }
            Err(_) => {
                warn!(session = %self.id, "no runtime to roll back dropped session");
                unwind.liveness.revoke();
            }
        }
    }
}

/// What a session undoes when it ends without an answer.
struct Unwind {
    session: String,
    entry_ids: [String; 2],
    /// Conversation this session made active, if any.
    activated: Option<String>,
    liveness: Liveness,
}

impl Unwind {
    /// Remove the session's user message and placeholder (and nothing else),
    /// revert an activation it made, then release the submit guard.
    ///
    /// Returns `false` when the session was already detached.
    fn apply(&self, chat: &mut ChatState) -> bool {
        if !self.liveness.is_live() {
            return false;
        }

        let ids = [self.entry_ids[0].as_str(), self.entry_ids[1].as_str()];
        if chat.transcript.ends_with_ids(&ids) {
            if let Err(e) = chat.transcript.drop_last(ids.len()) {
                warn!(session = %self.session, error = %e, "rollback failed");
            }
        } else {
            warn!(session = %self.session, "session entries are not the transcript tail, skipping rollback");
        }

        if self.activated.is_some() && chat.active_conversation == self.activated {
            chat.active_conversation = None;
        }
        release_in_flight(chat, &self.liveness);
        self.liveness.revoke();
        true
    }
}

fn release_in_flight(chat: &mut ChatState, liveness: &Liveness) {
    if chat
        .in_flight
        .as_ref()
        .is_some_and(|current| current.ptr_eq(liveness))
    {
        chat.in_flight = None;
    }
}
