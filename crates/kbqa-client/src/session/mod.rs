//! Stream sessions.
//!
//! A `StreamSession` owns one ask-request lifecycle: it sends the request,
//! drives the frame stream, writes the answer into the workspace transcript
//! and either finalizes the answer or rolls the exchange back.

mod machine;
mod types;

pub use machine::StreamSession;
pub use types::{Liveness, SessionOutcome, SessionState};
