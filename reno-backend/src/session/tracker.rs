//! Live session index: ledgers and cancellation handles keyed by session id.
//!
//! Entries survive session completion so callers can audit a finished
//! session's ledger; the map lives for the process lifetime.

use crate::session::ledger::InteractionLedger;
use crate::session::TerminalState;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct TrackedSession {
    pub request: String,
    pub ledger: Arc<InteractionLedger>,
    pub cancel: CancellationToken,
    pub started_at: DateTime<Utc>,
    terminal: RwLock<Option<TerminalState>>,
}

impl TrackedSession {
    pub fn terminal(&self) -> Option<TerminalState> {
        *self.terminal.read()
    }

    pub fn is_running(&self) -> bool {
        self.terminal.read().is_none()
    }
}

#[derive(Default)]
pub struct SessionTracker {
    sessions: DashMap<Uuid, Arc<TrackedSession>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        id: Uuid,
        request: &str,
        ledger: Arc<InteractionLedger>,
        cancel: CancellationToken,
    ) {
        self.sessions.insert(
            id,
            Arc::new(TrackedSession {
                request: request.to_string(),
                ledger,
                cancel,
                started_at: Utc::now(),
                terminal: RwLock::new(None),
            }),
        );
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<TrackedSession>> {
        self.sessions.get(id).map(|s| Arc::clone(s.value()))
    }

    /// Record the terminal state of a finished session
    pub fn complete(&self, id: &Uuid, state: TerminalState) {
        if let Some(session) = self.sessions.get(id) {
            *session.terminal.write() = Some(state);
        }
    }

    /// Request cancellation of a running session. Returns false if the
    /// session is unknown or already finished.
    pub fn cancel(&self, id: &Uuid) -> bool {
        match self.sessions.get(id) {
            Some(session) if session.is_running() => {
                log::info!("[TRACKER] Cancelling session {}", id);
                session.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn running_count(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_running()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_lifecycle() {
        let tracker = SessionTracker::new();
        let id = Uuid::new_v4();
        let ledger = Arc::new(InteractionLedger::new());
        let cancel = CancellationToken::new();

        tracker.register(id, "预算咨询", ledger, cancel.clone());
        assert_eq!(tracker.running_count(), 1);
        assert!(tracker.get(&id).unwrap().is_running());

        assert!(tracker.cancel(&id));
        assert!(cancel.is_cancelled());

        tracker.complete(&id, TerminalState::Cancelled);
        assert_eq!(tracker.running_count(), 0);
        assert_eq!(tracker.get(&id).unwrap().terminal(), Some(TerminalState::Cancelled));

        // Cancelling a finished session is a no-op
        assert!(!tracker.cancel(&id));
        assert!(!tracker.cancel(&Uuid::new_v4()));
    }
}
