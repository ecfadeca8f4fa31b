//! Streaming sessions.
//!
//! A session is one client's streaming connection, from the moment the
//! request is routed to the stream endpoint until its socket closes. Each
//! session runs its own [`StreamPump`] with its own upstream connection;
//! sessions watching the same source never share a handle or a frame.
//!
//! ## Session lifecycle
//!
//! ```text
//! Starting   -> Streaming               (source opened)
//! Streaming  -> Recovering -> Streaming (read failed, source reopened)
//! Streaming  -> Stopped                 (client gone or server stopping)
//! ```
//!
//! The [`SessionManager`] only records who is connected and which state
//! each pump is in. It is touched on state transitions, never per frame.

pub mod pump;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::source::SourceDescriptor;
pub use pump::{PumpReport, PumpStats, StreamPump};

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stream pump state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    /// Waiting for the first successful open.
    Starting,
    /// Reading, encoding and writing frames.
    Streaming,
    /// Read failed; waiting for the supervisor to reopen the source.
    Recovering,
    /// Terminal. The handle has been released.
    Stopped,
}

/// One client's streaming session.
#[derive(Debug)]
pub struct Session {
    /// Unique session identifier (16-char hex string).
    pub id: String,
    /// Client address, when the session is bound to a socket.
    pub peer_addr: Option<SocketAddr>,
    /// Redacted source descriptor, safe to log and display.
    pub source: String,
    pub started_at: Instant,
    state: RwLock<PumpState>,
}

impl Session {
    /// Create a new session with a unique auto-incrementing ID.
    pub fn new(peer_addr: Option<SocketAddr>, descriptor: &SourceDescriptor) -> Self {
        let id = SESSION_COUNTER.fetch_add(1, Ordering::SeqCst);
        Session {
            id: format!("{:016X}", id),
            peer_addr,
            source: descriptor.redacted(),
            started_at: Instant::now(),
            state: RwLock::new(PumpState::Starting),
        }
    }

    /// Transition to a new pump state.
    pub fn set_state(&self, state: PumpState) {
        let mut current = self.state.write();
        if *current != state {
            tracing::debug!(
                session_id = %self.id,
                old_state = ?*current,
                new_state = ?state,
                "state transition"
            );
            *current = state;
        }
    }

    pub fn state(&self) -> PumpState {
        *self.state.read()
    }
}

/// Thread-safe registry of live sessions.
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a session.
    pub fn create_session(
        &self,
        peer_addr: Option<SocketAddr>,
        descriptor: &SourceDescriptor,
    ) -> Arc<Session> {
        let session = Arc::new(Session::new(peer_addr, descriptor));
        let total = {
            let mut sessions = self.sessions.write();
            sessions.insert(session.id.clone(), session.clone());
            sessions.len()
        };
        tracing::debug!(
            session_id = %session.id,
            source = %session.source,
            total_sessions = total,
            "session created"
        );
        session
    }

    pub fn get_session(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    pub fn remove_session(&self, id: &str) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write();
        let removed = sessions.remove(id);
        if removed.is_some() {
            tracing::debug!(session_id = %id, total_sessions = sessions.len(), "session removed");
        }
        removed
    }

    /// Snapshot of every live session.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
