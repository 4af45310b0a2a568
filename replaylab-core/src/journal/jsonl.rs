//! JSONL journal — one JSON object per line, append-only.
//!
//! Each line is an independent JSON object, making the format resilient to
//! partial writes and easy to stream. On open, the highest id already on
//! disk seeds the counter so id assignment stays monotonic across process
//! restarts.

use super::{Journal, JournalError};
use crate::domain::{Event, EventDraft, EventType, SessionId};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    next_id: u64,
}

/// File-backed sink. All operations serialize on one mutex; the id counter
/// and the file tail therefore never diverge.
#[derive(Debug)]
pub struct JsonlJournal {
    inner: Mutex<Inner>,
}

impl JsonlJournal {
    /// Open (or create) a journal file, scanning existing lines to resume
    /// the id sequence.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let max_id = if path.exists() {
            read_events(&path)?.iter().map(|e| e.id).max().unwrap_or(0)
        } else {
            0
        };
        Ok(Self {
            inner: Mutex::new(Inner {
                path,
                next_id: max_id,
            }),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.inner.lock().expect("journal lock poisoned").path.clone()
    }
}

fn read_events(path: &Path) -> Result<Vec<Event>, JournalError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        events.push(serde_json::from_str(&line)?);
    }
    Ok(events)
}

impl Journal for JsonlJournal {
    fn append(&self, draft: EventDraft) -> Result<Event, JournalError> {
        let mut inner = self.inner.lock().expect("journal lock poisoned");
        let event = draft.into_event(inner.next_id + 1);
        let line = serde_json::to_string(&event)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&inner.path)?;
        writeln!(file, "{line}")?;

        // Only advance the counter once the line is on disk.
        inner.next_id += 1;
        Ok(event)
    }

    fn events_for_session(&self, session_id: &SessionId) -> Result<Vec<Event>, JournalError> {
        let inner = self.inner.lock().expect("journal lock poisoned");
        let mut events: Vec<Event> = read_events(&inner.path)?
            .into_iter()
            .filter(|e| &e.session_id == session_id)
            .collect();
        events.sort_by_key(|e| e.id);
        Ok(events)
    }

    fn count_fills(&self, session_id: &SessionId) -> Result<usize, JournalError> {
        let inner = self.inner.lock().expect("journal lock poisoned");
        Ok(read_events(&inner.path)?
            .iter()
            .filter(|e| &e.session_id == session_id && e.event_type == EventType::Fill)
            .count())
    }

    fn delete_session(&self, session_id: &SessionId) -> Result<usize, JournalError> {
        let inner = self.inner.lock().expect("journal lock poisoned");
        let events = read_events(&inner.path)?;
        let kept: Vec<&Event> = events
            .iter()
            .filter(|e| &e.session_id != session_id)
            .collect();
        let removed = events.len() - kept.len();

        let mut out = String::new();
        for event in &kept {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        fs::write(&inner.path, out)?;
        Ok(removed)
    }
}
