//! Conversation history store.
//!
//! Maps a session identifier to a bounded, time-ordered list of prior
//! question/answer pairs. The pipeline only talks to the [`SessionStore`]
//! trait; [`InMemorySessionStore`] is the process-local implementation.
//!
//! The in-memory store guards the whole map with a single `RwLock`. Locks
//! are taken and released inside each call and never held across an await.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::models::HistoryEntry;

/// Default number of entries kept per session.
pub const DEFAULT_MAX_HISTORY: usize = 5;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Append an entry, dropping the oldest entries beyond the store's limit.
    async fn add(&self, session_id: &str, question: &str, answer: &str) -> Result<()>;

    /// Entries for a session, oldest first. Unknown sessions yield an empty list.
    async fn get(&self, session_id: &str) -> Result<Vec<HistoryEntry>>;

    /// Remove a session. Clearing an unknown session is a no-op.
    async fn clear(&self, session_id: &str) -> Result<()>;

    /// Number of sessions currently held.
    async fn session_count(&self) -> Result<usize>;
}

/// Process-local session store.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<HistoryEntry>>>,
    max_history: usize,
}

impl InMemorySessionStore {
    /// Create a store keeping at most `max_history` entries per session
    /// (clamped to at least 1).
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_history: max_history.max(1),
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

fn poisoned() -> anyhow::Error {
    anyhow!("session store lock poisoned")
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn add(&self, session_id: &str, question: &str, answer: &str) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        let history = sessions.entry(session_id.to_string()).or_default();
        history.push(HistoryEntry {
            question: question.to_string(),
            answer: answer.to_string(),
            timestamp: Utc::now(),
        });
        if history.len() > self.max_history {
            let excess = history.len() - self.max_history;
            history.drain(..excess);
        }
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Vec<HistoryEntry>> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        sessions.remove(session_id);
        Ok(())
    }

    async fn session_count(&self) -> Result<usize> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        Ok(sessions.len())
    }
}
