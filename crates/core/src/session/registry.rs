use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;

use super::SessionState;

const SESSION_ID_MIN: u32 = 100_000;
const SESSION_ID_SPAN: u32 = 900_000;

/// One registered session, visible to the server for viewer listings.
#[derive(Debug)]
pub struct SessionEntry {
    pub id: String,
    /// URI the session was SETUP with.
    pub uri: String,
    pub peer: SocketAddr,
    state: RwLock<SessionState>,
}

impl SessionEntry {
    fn new(id: &str, uri: &str, peer: SocketAddr) -> Self {
        Self {
            id: id.to_string(),
            uri: uri.to_string(),
            peer,
            state: RwLock::new(SessionState::Ready),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn set_state(&self, state: SessionState) {
        let mut current = self.state.write();
        tracing::debug!(session_id = %self.id, old_state = ?*current, new_state = ?state, "state transition");
        *current = state;
    }

    pub fn is_playing(&self) -> bool {
        self.state() == SessionState::Playing
    }
}

/// Thread-safe registry of active sessions, shared by the server and its
/// per-connection workers.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<SessionEntry>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session under a random 6-digit id that is unused
    /// and different from `previous`. The id is chosen and inserted under
    /// one write lock.
    pub fn create(&self, uri: &str, peer: SocketAddr, previous: Option<&str>) -> Arc<SessionEntry> {
        let mut sessions = self.sessions.write();
        let id = loop {
            let id = (SESSION_ID_MIN + rand::random::<u32>() % SESSION_ID_SPAN).to_string();
            if Some(id.as_str()) != previous && !sessions.contains_key(&id) {
                break id;
            }
        };
        let entry = Arc::new(SessionEntry::new(&id, uri, peer));
        sessions.insert(id.clone(), entry.clone());
        tracing::debug!(session_id = %id, uri, total_sessions = sessions.len(), "session registered");
        entry
    }

    /// Register a session under a caller-chosen id, replacing any entry
    /// with that id.
    pub fn register(&self, id: &str, uri: &str, peer: SocketAddr) -> Arc<SessionEntry> {
        let entry = Arc::new(SessionEntry::new(id, uri, peer));
        let mut sessions = self.sessions.write();
        sessions.insert(id.to_string(), entry.clone());
        tracing::debug!(session_id = id, uri, total_sessions = sessions.len(), "session registered");
        entry
    }

    pub fn get(&self, id: &str) -> Option<Arc<SessionEntry>> {
        self.sessions.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<SessionEntry>> {
        let mut sessions = self.sessions.write();
        let removed = sessions.remove(id);
        if removed.is_some() {
            tracing::debug!(session_id = id, total_sessions = sessions.len(), "session removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Sessions currently in [`SessionState::Playing`].
    pub fn playing(&self) -> Vec<Arc<SessionEntry>> {
        self.sessions
            .read()
            .values()
            .filter(|s| s.is_playing())
            .cloned()
            .collect()
    }
}
