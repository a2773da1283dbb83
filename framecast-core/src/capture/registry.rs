//! Sessions keyed by id
//!
//! Each entry owns its own worker, status and locks; operations on one
//! session never wait on another.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::{CaptureBackend, CaptureSession, StopAck};
use crate::types::SessionId;

/// Registry of capture sessions sharing one backend
pub struct SessionRegistry {
    backend: Arc<dyn CaptureBackend>,
    frame_queue: usize,
    sessions: RwLock<HashMap<SessionId, Arc<CaptureSession>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new(backend: Arc<dyn CaptureBackend>, frame_queue: usize) -> Self {
        Self {
            backend,
            frame_queue,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Get a session, creating an idle one on first use
    pub fn session(&self, id: &SessionId) -> Arc<CaptureSession> {
        if let Some(session) = self.sessions.read().get(id) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write();
        let session = sessions.entry(id.clone()).or_insert_with(|| {
            debug!("Creating session {}", id);
            Arc::new(CaptureSession::new(
                id.clone(),
                Arc::clone(&self.backend),
                self.frame_queue,
            ))
        });
        Arc::clone(session)
    }

    /// Get an existing session
    pub fn get(&self, id: &SessionId) -> Option<Arc<CaptureSession>> {
        self.sessions.read().get(id).cloned()
    }

    /// Stop a session, wait for its worker and drop it from the registry
    pub fn remove(&self, id: &SessionId) -> Option<StopAck> {
        let session = self.sessions.write().remove(id)?;
        Some(session.stop_and_wait())
    }

    /// Ids of all sessions, sorted
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of sessions
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Ask every session to stop without waiting
    pub fn stop_all(&self) {
        let sessions: Vec<Arc<CaptureSession>> = self.sessions.read().values().cloned().collect();
        for session in sessions {
            session.stop();
        }
    }

    /// Stop every session and wait for all workers to exit
    pub fn shutdown(&self) {
        let sessions: Vec<Arc<CaptureSession>> = self.sessions.read().values().cloned().collect();
        if sessions.is_empty() {
            return;
        }

        info!("Stopping {} capture session(s)", sessions.len());
        for session in sessions {
            session.stop_and_wait();
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("backend", &self.backend.name())
            .field("sessions", &self.ids())
            .finish()
    }
}
