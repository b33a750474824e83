//! Fan-out registry for live web sessions
//!
//! Maps a chat id to the set of currently connected web sessions and
//! delivers push payloads to all of them. Registration is driven by the
//! WebSocket transport; nothing here is persisted and there is no
//! queuing — a payload published with no registered sessions is dropped.

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::media::PushPayload;
use crate::metrics::{PUSHES_TOTAL, WS_SESSIONS_ACTIVE};

/// One connected web session.
#[derive(Clone)]
pub struct Session {
    pub id: Uuid,
    sender: mpsc::UnboundedSender<PushPayload>,
}

impl Session {
    pub fn new(sender: mpsc::UnboundedSender<PushPayload>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
        }
    }
}

/// Concurrent chat-id -> sessions registry.
///
/// Multiple sessions per chat (several open tabs) all receive every
/// payload; there are no single-consumer semantics.
pub struct SessionRegistry {
    sessions: DashMap<i64, Vec<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Register a session for a chat. Returns the session id used for
    /// deregistration.
    pub fn register(&self, chat_id: i64, session: Session) -> Uuid {
        let session_id = session.id;
        self.sessions.entry(chat_id).or_default().push(session);
        WS_SESSIONS_ACTIVE.inc();

        tracing::info!(chat_id, session_id = %session_id, "Web session registered");
        session_id
    }

    /// Deregister a session. Idempotent: deregistering an unknown or
    /// already-removed session is not an error.
    pub fn deregister(&self, chat_id: i64, session_id: Uuid) {
        let mut removed = false;
        if let Some(mut sessions) = self.sessions.get_mut(&chat_id) {
            let before = sessions.len();
            sessions.retain(|s| s.id != session_id);
            removed = sessions.len() < before;

            if sessions.is_empty() {
                drop(sessions);
                self.sessions.remove_if(&chat_id, |_, v| v.is_empty());
            }
        }

        if removed {
            WS_SESSIONS_ACTIVE.dec();
            tracing::info!(chat_id, session_id = %session_id, "Web session deregistered");
        }
    }

    /// Deliver a payload to every session registered for `chat_id`.
    ///
    /// Best-effort per session: a closed receiver is pruned and never
    /// prevents delivery to sibling sessions or fails the caller.
    ///
    /// # Returns
    /// Number of sessions the payload was handed to.
    pub fn publish(&self, chat_id: i64, payload: &PushPayload) -> usize {
        let Some(mut sessions) = self.sessions.get_mut(&chat_id) else {
            PUSHES_TOTAL.with_label_values(&["dropped"]).inc();
            tracing::debug!(chat_id, "No live sessions; payload dropped");
            return 0;
        };

        let mut delivered = 0;
        sessions.retain(|session| match session.sender.send(payload.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                WS_SESSIONS_ACTIVE.dec();
                tracing::warn!(
                    chat_id,
                    session_id = %session.id,
                    "Dropping session with closed receiver"
                );
                false
            }
        });

        let outcome = if delivered > 0 { "delivered" } else { "dropped" };
        PUSHES_TOTAL.with_label_values(&[outcome]).inc();
        delivered
    }

    /// Number of live sessions for a chat.
    pub fn session_count(&self, chat_id: i64) -> usize {
        self.sessions.get(&chat_id).map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
