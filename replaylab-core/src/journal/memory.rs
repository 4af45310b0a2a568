//! In-memory journal for tests and embedded use.

use super::{Journal, JournalError};
use crate::domain::{Event, EventDraft, EventType, SessionId};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    events: Vec<Event>,
}

/// Mutex-serialized in-memory sink. Ids start at 1.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    inner: Mutex<Inner>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of events across all sessions.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("journal lock poisoned").events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Journal for MemoryJournal {
    fn append(&self, draft: EventDraft) -> Result<Event, JournalError> {
        let mut inner = self.inner.lock().expect("journal lock poisoned");
        inner.next_id += 1;
        let event = draft.into_event(inner.next_id);
        inner.events.push(event.clone());
        Ok(event)
    }

    fn events_for_session(&self, session_id: &SessionId) -> Result<Vec<Event>, JournalError> {
        let inner = self.inner.lock().expect("journal lock poisoned");
        // Appended in id order, so a filter preserves id order.
        Ok(inner
            .events
            .iter()
            .filter(|e| &e.session_id == session_id)
            .cloned()
            .collect())
    }

    fn count_fills(&self, session_id: &SessionId) -> Result<usize, JournalError> {
        let inner = self.inner.lock().expect("journal lock poisoned");
        Ok(inner
            .events
            .iter()
            .filter(|e| &e.session_id == session_id && e.event_type == EventType::Fill)
            .count())
    }

    fn delete_session(&self, session_id: &SessionId) -> Result<usize, JournalError> {
        let mut inner = self.inner.lock().expect("journal lock poisoned");
        let before = inner.events.len();
        inner.events.retain(|e| &e.session_id != session_id);
        Ok(before - inner.events.len())
    }
}
