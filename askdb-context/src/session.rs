//! Session-keyed conversation store.

use crate::ConversationHistory;
use askdb_core::{new_session_id, SessionId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

/// One conversation and the store epoch it was created under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub epoch: Uuid,
    pub created_at: Timestamp,
    pub history: ConversationHistory,
}

impl Session {
    fn new(session_id: SessionId, epoch: Uuid, history_limit: usize) -> Self {
        Self {
            session_id,
            epoch,
            created_at: Utc::now(),
            history: ConversationHistory::new(history_limit),
        }
    }
}

/// Snapshot returned by [`SessionStore::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub active: bool,
    pub history_length: usize,
    pub has_history: bool,
    pub has_last_sql: bool,
    pub epoch: Uuid,
}

/// In-memory sessions for one process.
///
/// The epoch is minted at construction. Sessions restored from an earlier
/// process carry a different epoch and are evicted on the next access, so a
/// restart never resurrects stale conversation context. Sessions of the
/// current epoch live until the host calls [`SessionStore::remove`].
#[derive(Debug)]
pub struct SessionStore {
    epoch: Uuid,
    history_limit: usize,
    sessions: HashMap<SessionId, Session>,
    // Restored sessions not yet checked against the epoch.
    stale: usize,
}

impl SessionStore {
    pub fn new(history_limit: usize) -> Self {
        Self {
            epoch: Uuid::now_v7(),
            history_limit,
            sessions: HashMap::new(),
            stale: 0,
        }
    }

    pub fn epoch(&self) -> Uuid {
        self.epoch
    }

    /// Start a new, empty session and return its id.
    pub fn open(&mut self) -> SessionId {
        let id = new_session_id();
        self.sessions
            .insert(id, Session::new(id, self.epoch, self.history_limit));
        id
    }

    /// Get a session, creating it on first access. A session that belongs
    /// to another epoch comes back empty.
    pub fn session(&mut self, session_id: SessionId) -> &mut Session {
        if self.stale > 0 {
            self.prune_stale();
        }
        let epoch = self.epoch;
        let limit = self.history_limit;
        self.sessions
            .entry(session_id)
            .or_insert_with(|| Session::new(session_id, epoch, limit))
    }

    /// Evict every session from another epoch, returning how many went.
    pub fn prune_stale(&mut self) -> usize {
        let epoch = self.epoch;
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.epoch == epoch);
        self.stale = 0;
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            info!(evicted, "evicted sessions from a previous epoch");
        }
        evicted
    }

    /// Shorthand for the history of [`SessionStore::session`].
    pub fn history(&mut self, session_id: SessionId) -> &mut ConversationHistory {
        &mut self.session(session_id).history
    }

    /// Insert a previously persisted session; the epoch check happens on access.
    pub fn restore(&mut self, session: Session) {
        if session.epoch != self.epoch {
            self.stale += 1;
        }
        self.sessions.insert(session.session_id, session);
    }

    /// Drop all conversation state for a session, keeping it active.
    pub fn clear(&mut self, session_id: SessionId) {
        self.sessions.insert(
            session_id,
            Session::new(session_id, self.epoch, self.history_limit),
        );
        info!(%session_id, "session cleared");
    }

    pub fn remove(&mut self, session_id: SessionId) -> Option<Session> {
        self.sessions.remove(&session_id)
    }

    pub fn status(&mut self, session_id: SessionId) -> SessionStatus {
        let epoch = self.epoch;
        let history = &self.session(session_id).history;
        SessionStatus {
            active: true,
            history_length: history.len(),
            has_history: !history.is_empty(),
            has_last_sql: history.last_sql().is_some(),
            epoch,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
