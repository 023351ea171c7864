//! The event envelope the registry hands to each connection's send sink.

use relay_core::SessionId;
use serde::{Deserialize, Serialize};

/// Protocol version for the wire envelope. Bump only on a breaking frame
/// shape change.
pub const PROTOCOL_VERSION: u32 = 1;

/// One event frame delivered to a single connection.
///
/// `seq` is **per-connection**: two connections attached to the same
/// session may see the same logical event under different `seq` values.
/// The `(sessionId, seq)` pair is only meaningful within the connection it
/// was delivered to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEvent {
    /// Wire protocol version.
    pub v: u32,
    /// Always `"event"` on the wire; kept as a constant tag here rather than
    /// a bare string so `relay-server` can match on the `kind` field shared
    /// with request/response frames without this crate depending on it.
    pub kind: &'static str,
    /// Session this event belongs to.
    pub session_id: SessionId,
    /// Per-connection sequence number.
    pub seq: u64,
    /// Event type tag (e.g. `"prompt"`, `"message_update"`, `"agent_end"`).
    pub event_type: String,
    /// Opaque JSON payload, forwarded byte-for-byte from the journal.
    pub payload: serde_json::Value,
}

impl ServerEvent {
    /// Build a frame for delivery with connection-scoped `seq`.
    #[must_use]
    pub fn new(session_id: SessionId, seq: u64, event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            kind: "event",
            session_id,
            seq,
            event_type: event_type.into(),
            payload,
        }
    }
}

/// A buffered event kept for short-term replay, independent of any
/// particular connection's seq numbering (replay re-numbers on delivery).
#[derive(Debug, Clone)]
pub struct BufferedEvent {
    /// Event type tag.
    pub event_type: String,
    /// Opaque JSON payload.
    pub payload: serde_json::Value,
    /// When this event was buffered, for replay-window eviction.
    pub buffered_at: std::time::Instant,
}
