//! Answer-stream frame decoding.
//!
//! The ask endpoint answers with a chunked text body in which every
//! significant line reads `data: <json>`. Chunk boundaries fall anywhere,
//! including inside a JSON object or a multi-byte character, so bytes are
//! carried over until a full line is available.

use std::collections::VecDeque;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::Deserialize;
use tracing::trace;

use kbqa_common::Source;

use crate::ClientError;

/// Prefix marking a line that carries a frame.
pub const DATA_PREFIX: &str = "data: ";

/// Raw body chunks as delivered by the transport.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ClientError>>;

/// One decoded protocol frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// Names the conversation the answer is stored under.
    Meta { conversation_id: String },
    /// Incremental answer text.
    Token { content: String },
    /// Final ordered citation list for the answer.
    Sources { sources: Vec<Source> },
    #[serde(other)]
    Unknown,
}

/// Incremental line splitter and frame parser.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk, returning every frame completed by it.
    ///
    /// Bytes after the last newline stay buffered for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            if let Some(frame) = parse_line(&self.buffer[start..end]) {
                frames.push(frame);
            }
            start = end + 1;
        }
        self.buffer.drain(..start);
        frames
    }

    /// Number of buffered bytes belonging to an unterminated line.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// End of stream: an unterminated trailing line never becomes a frame.
    pub fn finish(&mut self) {
        if !self.buffer.is_empty() {
            trace!(bytes = self.buffer.len(), "discarding unterminated line");
            self.buffer.clear();
        }
    }
}

/// Parse one complete line (without its `\n`).
///
/// Returns `None` for lines without the data prefix and for payloads that are
/// not a JSON frame object.
pub fn parse_line(line: &[u8]) -> Option<Frame> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let text = String::from_utf8_lossy(line);
    let payload = text.strip_prefix(DATA_PREFIX)?;

    match serde_json::from_str::<Frame>(payload) {
        Ok(frame) => Some(frame),
        Err(e) => {
            trace!(error = %e, "dropping malformed frame");
            None
        }
    }
}

/// Lazy frame sequence over a live response body.
pub struct FrameStream {
    bytes: Option<ByteStream>,
    decoder: FrameDecoder,
    ready: VecDeque<Frame>,
}

impl FrameStream {
    pub fn new(bytes: ByteStream) -> Self {
        Self {
            bytes: Some(bytes),
            decoder: FrameDecoder::new(),
            ready: VecDeque::new(),
        }
    }

    /// Build a stream from already-known chunks.
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Result<Vec<u8>, ClientError>>,
        I::IntoIter: Send + 'static,
    {
        Self::new(futures_util::stream::iter(chunks).boxed())
    }

    /// Next frame, `None` at end of stream.
    ///
    /// Frames decoded before a transport failure are yielded first; after a
    /// failure or end of stream the sequence is exhausted.
    pub async fn next_frame(&mut self) -> Option<Result<Frame, ClientError>> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Some(Ok(frame));
            }

            let bytes = self.bytes.as_mut()?;
            match bytes.next().await {
                Some(Ok(chunk)) => self.ready.extend(self.decoder.push(&chunk)),
                Some(Err(e)) => {
                    self.close();
                    return Some(Err(e));
                }
                None => {
                    self.close();
                    return None;
                }
            }
        }
    }

    fn close(&mut self) {
        self.bytes = None;
        self.decoder.finish();
    }
}

impl std::fmt::Debug for FrameStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameStream")
            .field("open", &self.bytes.is_some())
            .field("pending_bytes", &self.decoder.pending())
            .field("ready", &self.ready.len())
            .finish()
    }
}
