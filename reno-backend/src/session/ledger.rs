//! Append-only audit trail of a session's routing and tool activity.

use crate::session::events::SessionEvent;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    /// Name of the agent the event belongs to ("router" for routing
    /// decisions)
    pub agent: String,
    pub event: SessionEvent,
    pub timestamp: DateTime<Utc>,
}

/// In-memory, append-only record of everything that happened in a session.
/// Readable at any time, including mid-stream, so it sits behind a mutex and
/// hands out snapshots.
#[derive(Debug, Default)]
pub struct InteractionLedger {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl InteractionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, agent: &str, event: SessionEvent) {
        self.entries.lock().push(LedgerEntry {
            agent: agent.to_string(),
            event,
            timestamp: Utc::now(),
        });
    }

    /// Flat ordered snapshot of everything recorded so far
    pub fn snapshot(&self) -> Vec<LedgerEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
