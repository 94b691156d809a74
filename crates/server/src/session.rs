//! Short-lived storage for in-flight login attempts.
//!
//! A login stores a [`FlowState`] under a fresh random session id, which the
//! browser carries back in the flow cookie. The callback loads it, and loading
//! consumes it: a session can complete at most one callback.

use crate::error::SessionError;
use async_trait::async_trait;
use base64::Engine;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use url::Url;

/// State of one login attempt between redirect and callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowState {
    pub csrf_token: String,
    /// Where to send the browser after the callback. `None` means `/`.
    pub return_to: Option<Url>,
}

#[async_trait]
pub trait FlowSessionStore: Send + Sync {
    /// Start a new, empty session, discarding `previous` if given.
    async fn new_session(&self, previous: Option<&str>) -> Result<String, SessionError>;

    async fn save(&self, session_id: &str, state: FlowState) -> Result<(), SessionError>;

    /// Load and remove the session. Expired or unknown ids yield `None`.
    async fn load(&self, session_id: &str) -> Result<Option<FlowState>, SessionError>;
}

/// Generate 32 random bytes, base64url encoded without padding.
pub fn random_token() -> Result<String, getrandom::Error> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

struct Entry {
    state: Option<FlowState>,
    expires_at: Instant,
}

/// In-memory [`FlowSessionStore`] with a fixed time-to-live per session.
pub struct MemorySessionStore {
    sessions: DashMap<String, Entry>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop expired sessions. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.sessions.len())
    }
}

#[async_trait]
impl FlowSessionStore for MemorySessionStore {
    async fn new_session(&self, previous: Option<&str>) -> Result<String, SessionError> {
        if let Some(previous) = previous {
            self.sessions.remove(previous);
        }
        let id = random_token().map_err(|e| SessionError::Backend(e.to_string()))?;
        self.sessions.insert(
            id.clone(),
            Entry {
                state: None,
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(id)
    }

    async fn save(&self, session_id: &str, state: FlowState) -> Result<(), SessionError> {
        match self.sessions.get_mut(session_id) {
            Some(mut entry) => {
                entry.state = Some(state);
                Ok(())
            }
            None => Err(SessionError::Backend(
                "cannot save into an unknown session".into(),
            )),
        }
    }

    async fn load(&self, session_id: &str) -> Result<Option<FlowState>, SessionError> {
        Ok(self
            .sessions
            .remove(session_id)
            .filter(|(_, entry)| entry.expires_at > Instant::now())
            .and_then(|(_, entry)| entry.state))
    }
}
