//! Session registry for the streamed transport.
//!
//! A session is one open event stream. Follow-up messages name their session
//! by id; the registry maps that id to the stream's outbound channel. The
//! map is the only state shared between concurrent tool calls.

use crate::protocol::Response;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Outbound messages buffered per session before senders wait.
pub const SESSION_BUFFER: usize = 64;

/// Live sessions keyed by id. Cheap to clone; clones share the map.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, mpsc::Sender<Response>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session and return its guard and inbound end.
    ///
    /// Ids are random v4 UUIDs; the vacant-entry insert makes a duplicate
    /// impossible even if one were ever generated.
    pub fn open(&self) -> (SessionGuard, mpsc::Receiver<Response>) {
        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        let id = loop {
            let candidate = uuid::Uuid::new_v4().to_string();
            match self.sessions.entry(candidate) {
                Entry::Vacant(slot) => {
                    let id = slot.key().clone();
                    slot.insert(tx);
                    break id;
                }
                Entry::Occupied(_) => continue,
            }
        };
        info!(session = %id, live = self.sessions.len(), "Session opened");
        let guard = SessionGuard {
            id,
            registry: self.clone(),
        };
        (guard, rx)
    }

    /// Channel of a live session.
    pub fn sender(&self, id: &str) -> Option<mpsc::Sender<Response>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Forget a session. Returns whether it was still registered.
    pub fn close(&self, id: &str) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            info!(session = %id, live = self.sessions.len(), "Session closed");
        } else {
            debug!(session = %id, "Session already closed");
        }
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Keeps a session registered for as long as it lives.
///
/// The streamed transport moves the guard into the event stream, so the
/// session is closed exactly when the client's connection goes away.
#[derive(Debug)]
pub struct SessionGuard {
    id: String,
    registry: SessionRegistry,
}

impl SessionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.close(&self.id);
    }
}
