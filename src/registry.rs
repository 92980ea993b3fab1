//! Registry of in-flight streaming sessions.
//!
//! Holds a strong reference to every active session until its completion
//! callback removes it. All access goes through one mutex.

use crate::session::{SessionHandle, SessionId};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// Thread-safe set of live sessions keyed by [`SessionId`].
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<Vec<Arc<dyn SessionHandle>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. Duplicates are not checked.
    pub fn add(&self, session: Arc<dyn SessionHandle>) {
        let id = session.id();
        let mut sessions = self.sessions.lock();
        sessions.push(session);
        trace!(session = %id, active = sessions.len(), "Session registered");
    }

    /// Remove every entry with the given identity, returning how many went.
    pub fn remove_all(&self, id: SessionId) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|s| s.id() != id);
        let removed = before - sessions.len();
        trace!(session = %id, removed, active = sessions.len(), "Session deregistered");
        removed
    }

    /// Whether a session with this identity is registered.
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.lock().iter().any(|s| s.id() == id)
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Identities of all registered sessions.
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.lock().iter().map(|s| s.id()).collect()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("active", &self.len())
            .finish()
    }
}
