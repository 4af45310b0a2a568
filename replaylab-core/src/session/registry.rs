//! SessionRegistry — concurrency-safe map of live sessions.
//!
//! Sessions are internally single-threaded; the registry hands out
//! `Arc<Mutex<ReplaySession>>` so every mutating operation on one session
//! is serialized while different sessions run fully independently.

use super::replay::ReplaySession;
use crate::domain::SessionId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Injected into the serving layer; never a process-wide global.
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<HashMap<SessionId, Arc<Mutex<ReplaySession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session, returning its shared handle. Replaces any
    /// previous session under the same id.
    pub fn put(&self, session: ReplaySession) -> Arc<Mutex<ReplaySession>> {
        let id = session.id().clone();
        let handle = Arc::new(Mutex::new(session));
        self.inner
            .write()
            .expect("registry lock poisoned")
            .insert(id, handle.clone());
        handle
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Mutex<ReplaySession>>> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .get(id)
            .cloned()
    }

    /// Drop a session from the registry. Live handles stay valid; the
    /// journal entries persist regardless.
    pub fn remove(&self, id: &SessionId) -> Option<Arc<Mutex<ReplaySession>>> {
        self.inner
            .write()
            .expect("registry lock poisoned")
            .remove(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}
