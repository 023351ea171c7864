//! Journal event record.

use chrono::{DateTime, Utc};
use relay_core::SessionId;
use serde::{Deserialize, Serialize};

/// A single journaled event.
///
/// `seq` is a strictly increasing integer, gap-free per session, starting
/// at 1. Payloads are opaque JSON blobs; the journal performs no schema
/// validation on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEvent {
    /// Session this event belongs to.
    pub session_id: SessionId,
    /// Monotonic, gap-free sequence number within the session.
    pub seq: u64,
    /// Event type tag (e.g. `"prompt"`, `"message_update"`, `"agent_end"`).
    pub event_type: String,
    /// Opaque JSON payload.
    pub payload: serde_json::Value,
    /// Server-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
}
