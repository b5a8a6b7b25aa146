use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rtd_domain::{persona_defaults, Error, Result};

use crate::session::Session;

/// In-memory, process-local table of live sessions. No persistence —
/// a process restart drops every session, matching spec.md's
/// single-instance Non-goal.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new session for `persona_id` (falling back to
    /// `"default"` if unknown, same as [`rtd_domain::persona_defaults`])
    /// keyed by a caller-supplied id (typically a freshly minted uuid).
    pub fn create(&self, id: String, persona_id: &str, drift_window: usize) -> Arc<Mutex<Session>> {
        let preset = persona_defaults(persona_id);
        let session = Session::new(
            id.clone(),
            preset.id.to_string(),
            preset.display_name.to_string(),
            preset.defaults,
            drift_window,
        );
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().insert(id.clone(), handle.clone());
        tracing::debug!(session_id = %id, persona_id = %preset.id, "session created");
        handle
    }

    pub fn get(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().get(id).cloned()
    }

    pub fn get_or_404(&self, id: &str) -> Result<Arc<Mutex<Session>>> {
        self.get(id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// Idempotent: closing an unknown or already-closed id is a no-op.
    pub fn close(&self, id: &str) {
        if self.sessions.write().remove(id).is_some() {
            tracing::debug!(session_id = %id, "session closed");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
