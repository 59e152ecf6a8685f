//! Session states, outcomes and the liveness flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kbqa_common::Source;

use crate::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Sending,
    Streaming,
    Finalizing,
    Completed,
    Failed,
    /// Detached from its transcript by a knowledge-base or conversation switch.
    Abandoned,
}

impl SessionState {
    /// Whether the session still blocks new submissions.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Sending | Self::Streaming)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Abandoned)
    }
}

/// Shared flag a session checks before applying any effect.
///
/// Cleared exactly once, when the session is detached from its transcript.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn revoke(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Whether both handles refer to the same session.
    pub fn ptr_eq(&self, other: &Liveness) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed {
        conversation_id: Option<String>,
        content: String,
        sources: Vec<Source>,
    },
    Failed(ClientError),
    Abandoned,
}
