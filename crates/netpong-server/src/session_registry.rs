use std::collections::BTreeMap;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub type SessionId = u64;

/// Per-session sender for outbound text frames. Bounded so a slow client
/// cannot grow memory without limit; `Utf8Bytes` clones are zero-copy.
pub type SessionSender = mpsc::Sender<Utf8Bytes>;

/// Every open session and the queue feeding its socket writer.
///
/// Dropping a session's sender ends its writer task, which closes the socket.
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, SessionSender>,
    next_id: SessionId,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn register(&mut self, sender: SessionSender) -> SessionId {
        let id = self.next_id;
        self.next_id += 1;
        self.sessions.insert(id, sender);
        id
    }

    /// Remove a session. Removing an unknown or already removed id is a no-op
    /// and returns false.
    pub fn remove(&mut self, id: SessionId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Queue a frame for one session, dropping the session if its queue is
    /// closed or full. Returns true if the frame was queued.
    pub fn send_to(&mut self, id: SessionId, frame: &Utf8Bytes) -> bool {
        let Some(sender) = self.sessions.get(&id) else {
            return false;
        };
        match sender.try_send(frame.clone()) {
            Ok(()) => true,
            Err(e) => {
                log_send_failure(id, &e);
                self.sessions.remove(&id);
                false
            },
        }
    }

    /// Queue a frame for every session. Sessions that fail are removed and
    /// returned; delivery to the rest is unaffected.
    pub fn broadcast(&mut self, frame: &Utf8Bytes) -> Vec<SessionId> {
        let mut failed = Vec::new();
        for (&id, sender) in &self.sessions {
            if let Err(e) = sender.try_send(frame.clone()) {
                log_send_failure(id, &e);
                failed.push(id);
            }
        }
        for id in &failed {
            self.sessions.remove(id);
        }
        failed
    }
}

fn log_send_failure(id: SessionId, err: &TrySendError<Utf8Bytes>) {
    match err {
        TrySendError::Full(_) => {
            tracing::warn!(session_id = id, "Session send queue full, dropping session");
        },
        TrySendError::Closed(_) => {
            tracing::debug!(session_id = id, "Session writer gone, dropping session");
        },
    }
}
