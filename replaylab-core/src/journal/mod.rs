//! Event journal — append-only persistence with atomic monotonic ids.
//!
//! Every state-changing session action is recorded as one JSON object. The
//! journal is the durable audit trail: it outlives the in-memory session,
//! and a lost write would break replay auditability, so append failures
//! propagate to the operation that triggered them instead of being
//! swallowed.
//!
//! Two sinks: `MemoryJournal` for tests and embedding, `JsonlJournal` for
//! one-object-per-line durable files (resilient to partial writes, easy to
//! stream).

mod jsonl;
mod memory;

pub use jsonl::JsonlJournal;
pub use memory::MemoryJournal;

use crate::domain::{Event, EventDraft, SessionId};
use thiserror::Error;

/// Errors from journal operations. Fatal to the triggering operation:
/// a session action whose event cannot be recorded did not happen.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Append-only event sink.
///
/// Id assignment is serialized inside the sink (single writer behind a
/// mutex), so concurrent sessions may share one journal: ids are globally
/// monotonic, and strictly increasing in causal order within any session.
pub trait Journal: Send + Sync {
    /// Assign the next id and persist the event. Returns the stored event.
    fn append(&self, draft: EventDraft) -> Result<Event, JournalError>;

    /// All events for a session, ordered by id.
    fn events_for_session(&self, session_id: &SessionId) -> Result<Vec<Event>, JournalError>;

    /// Number of FILL events recorded for a session.
    fn count_fills(&self, session_id: &SessionId) -> Result<usize, JournalError>;

    /// Remove every event for a session (cascade delete when the session
    /// record itself is deleted). Returns the number of events removed.
    fn delete_session(&self, session_id: &SessionId) -> Result<usize, JournalError>;
}
