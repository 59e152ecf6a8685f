//! Ordered message store with a single mutable tail.

use kbqa_common::{Message, Source};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptError {
    #[error("transcript has no mutable tail")]
    NoMutableTail,
    #[error("cannot drop {requested} entries, transcript holds {available}")]
    NotEnoughEntries { requested: usize, available: usize },
}

/// Conversation messages in display order.
///
/// Every entry is immutable once appended except the tail opened by
/// [`Transcript::append_tail`], which stays mutable until sealed.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
    tail_open: bool,
    epoch: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an immutable entry, sealing any open tail first.
    pub fn append(&mut self, message: Message) {
        self.tail_open = false;
        self.messages.push(message);
    }

    /// Append the mutable placeholder.
    pub fn append_tail(&mut self, message: Message) {
        self.messages.push(message);
        self.tail_open = true;
    }

    /// Overwrite content and sources of the mutable tail.
    pub fn replace_tail(
        &mut self,
        content: &str,
        sources: &[Source],
    ) -> Result<(), TranscriptError> {
        let tail = self.mutable_tail()?;
        if tail.content != content {
            tail.content.clear();
            tail.content.push_str(content);
        }
        if tail.sources != sources {
            tail.sources = sources.to_vec();
        }
        Ok(())
    }

    /// Make the tail immutable. Sealing twice is harmless.
    pub fn seal_tail(&mut self) {
        self.tail_open = false;
    }

    /// Remove the `n` most recent entries, returning them oldest first.
    pub fn drop_last(&mut self, n: usize) -> Result<Vec<Message>, TranscriptError> {
        let available = self.messages.len();
        if n > available {
            return Err(TranscriptError::NotEnoughEntries {
                requested: n,
                available,
            });
        }
        if n > 0 {
            self.tail_open = false;
        }
        Ok(self.messages.split_off(available - n))
    }

    /// Replace the whole content with immutable history entries.
    pub fn reset(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.tail_open = false;
        self.epoch += 1;
    }

    /// Insert loaded history ahead of everything appended since the last
    /// reset. An open tail stays open and the epoch is unchanged.
    pub fn prepend_history(&mut self, history: Vec<Message>) {
        let appended = std::mem::replace(&mut self.messages, history);
        self.messages.extend(appended);
    }

    pub fn clear(&mut self) {
        self.reset(Vec::new());
    }

    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Id of the mutable tail, if one is open.
    pub fn tail_id(&self) -> Option<&str> {
        if self.tail_open {
            self.messages.last().map(|m| m.id.as_str())
        } else {
            None
        }
    }

    /// Whether the last entries carry exactly these ids, in order.
    pub fn ends_with_ids(&self, ids: &[&str]) -> bool {
        if ids.len() > self.messages.len() {
            return false;
        }
        let start = self.messages.len() - ids.len();
        self.messages[start..]
            .iter()
            .zip(ids)
            .all(|(m, id)| m.id == *id)
    }

    /// Number of wholesale replacements so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn mutable_tail(&mut self) -> Result<&mut Message, TranscriptError> {
        if !self.tail_open {
            return Err(TranscriptError::NoMutableTail);
        }
        self.messages.last_mut().ok_or(TranscriptError::NoMutableTail)
    }
}
