//! The connection registry itself.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use relay_core::{ConnectionId, SessionId};
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use crate::event::ServerEvent;
use crate::replay::{ReplayBuffer, REPLAY_WINDOW};

/// The sending half of a connection's outbound channel. Bounded, so a stuck
/// client is naturally backpressured rather than letting the registry's
/// memory grow unboundedly; [`ConnectionRegistry::broadcast_event`] uses
/// `try_send` and drops the frame for that connection if it's full.
pub type EventSink = mpsc::Sender<ServerEvent>;

#[derive(Default)]
struct SessionSeqState {
    /// Last per-connection seq delivered to this connection for this session.
    last_conn_seq: u64,
    /// The replay buffer position that seq corresponded to, so a resume can
    /// compute "everything since" without re-deriving it from the old
    /// connection (which may already be gone by the time resume happens).
    last_buffer_seq: u64,
}

struct ConnectionEntry {
    sink: Option<EventSink>,
    attached: HashSet<SessionId>,
    seq_state: HashMap<SessionId, SessionSeqState>,
    /// Set when the connection is removed; entries past the replay window
    /// are purged lazily rather than via a background sweep, matching how
    /// the replay buffer itself evicts.
    removed_at: Option<Instant>,
}

impl ConnectionEntry {
    fn new(sink: EventSink) -> Self {
        Self {
            sink: Some(sink),
            attached: HashSet::new(),
            seq_state: HashMap::new(),
            removed_at: None,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    buffers: HashMap<SessionId, ReplayBuffer>,
}

impl RegistryState {
    fn purge_expired(&mut self) {
        self.connections
            .retain(|_, c| c.removed_at.is_none_or(|at| at.elapsed() <= REPLAY_WINDOW));
    }
}

/// Tracks open client connections, their session attachments, and the
/// bounded replay buffer each session's events flow through.
///
/// All state lives behind one internal lock: the registry's own contract
/// ("broadcast must not block on slow consumers") is met by using
/// `try_send` on each connection's sink rather than by fine-grained
/// locking, so a single `Mutex` is simpler and no less concurrent in
/// practice than splitting it up.
#[derive(Default)]
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly accepted connection's send capability.
    pub async fn register(&self, connection_id: ConnectionId, sink: EventSink) {
        let mut state = self.state.lock().await;
        state.purge_expired();
        state.connections.insert(connection_id, ConnectionEntry::new(sink));
    }

    /// Idempotently attach `connection_id` to `session_id`, initializing its
    /// per-session seq counter to whatever it was last at (0 on first
    /// attach), per the component contract.
    pub async fn attach(&self, connection_id: ConnectionId, session_id: SessionId) {
        let mut state = self.state.lock().await;
        let current_buffer_seq = state.buffers.entry(session_id).or_default().max_buffer_seq();
        if let Some(conn) = state.connections.get_mut(&connection_id) {
            conn.attached.insert(session_id);
            conn.seq_state.entry(session_id).or_insert_with(|| SessionSeqState {
                last_conn_seq: 0,
                last_buffer_seq: current_buffer_seq,
            });
        }
    }

    /// Detach `connection_id` from `session_id`. Idempotent: detaching an
    /// already-detached pair is a no-op. The per-session seq counter is
    /// retained (not reset) so a later re-attach on the same connection
    /// keeps the connection's seq strictly increasing.
    pub async fn detach(&self, connection_id: ConnectionId, session_id: SessionId) {
        let mut state = self.state.lock().await;
        if let Some(conn) = state.connections.get_mut(&connection_id) {
            conn.attached.remove(&session_id);
        }
    }

    /// List every connection currently attached to `session_id`. Used by
    /// session teardown to `detach` each one individually, e.g. on
    /// `archive`/`delete`.
    pub async fn attached_connections(&self, session_id: SessionId) -> Vec<ConnectionId> {
        let state = self.state.lock().await;
        state
            .connections
            .iter()
            .filter(|(_, conn)| conn.attached.contains(&session_id))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Remove a connection entirely. Returns the sessions it was attached
    /// to, so the caller (the engine) can fail any native-tool calls it
    /// owned with a "connection closed" error. The connection's seq state
    /// is retained for the replay window in case a resume names it as the
    /// prior connection.
    pub async fn remove(&self, connection_id: ConnectionId) -> Vec<SessionId> {
        let mut state = self.state.lock().await;
        let Some(conn) = state.connections.get_mut(&connection_id) else {
            return Vec::new();
        };
        let sessions: Vec<SessionId> = conn.attached.iter().copied().collect();
        conn.attached.clear();
        conn.sink = None;
        conn.removed_at = Some(Instant::now());
        sessions
    }

    /// Broadcast an event to every connection currently attached to
    /// `session_id`, and append it to that session's replay buffer.
    pub async fn broadcast_event(&self, session_id: SessionId, event_type: impl Into<String>, payload: serde_json::Value) {
        let event_type = event_type.into();
        let mut state = self.state.lock().await;
        let buffer_seq = state.buffers.entry(session_id).or_default().push(event_type.clone(), payload.clone());

        let targets: Vec<ConnectionId> = state
            .connections
            .iter()
            .filter(|(_, c)| c.attached.contains(&session_id))
            .map(|(id, _)| *id)
            .collect();

        for connection_id in targets {
            let Some(conn) = state.connections.get_mut(&connection_id) else { continue };
            let Some(sink) = conn.sink.clone() else { continue };
            let seq_state = conn.seq_state.entry(session_id).or_default();
            seq_state.last_conn_seq += 1;
            seq_state.last_buffer_seq = buffer_seq;
            let frame = ServerEvent::new(session_id, seq_state.last_conn_seq, event_type.clone(), payload.clone());
            if sink.try_send(frame).is_err() {
                warn!(%connection_id, %session_id, "dropping event for slow or closed connection");
            }
        }
    }

    /// Send an event to exactly one connection, assigning it that
    /// connection's next per-connection seq. Used for targeted frames that
    /// must not fan out to every connection attached to a session, e.g. a
    /// `native_tool_request` addressed to a single owner client.
    ///
    /// Unlike [`Self::broadcast_event`], this does not enter the session's
    /// replay buffer: a targeted frame replayed to a *different* connection
    /// on resume would misrepresent which client actually owns the call.
    ///
    /// Returns `false` if the connection is unknown, removed, or its sink
    /// is full or closed.
    pub async fn send_to_connection(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> bool {
        let mut state = self.state.lock().await;
        let Some(conn) = state.connections.get_mut(&connection_id) else {
            return false;
        };
        let Some(sink) = conn.sink.clone() else {
            return false;
        };
        let seq_state = conn.seq_state.entry(session_id).or_default();
        seq_state.last_conn_seq += 1;
        let frame = ServerEvent::new(session_id, seq_state.last_conn_seq, event_type, payload);
        sink.try_send(frame).is_ok()
    }

    /// Whether any connection is currently attached to `session_id`. Used
    /// by the idle watcher: a session with a live attachment is never
    /// paused regardless of how stale its `lastActivityAt` is.
    pub async fn has_attached_connections(&self, session_id: SessionId) -> bool {
        let state = self.state.lock().await;
        state.connections.values().any(|c| c.attached.contains(&session_id))
    }

    /// Resume a connection under a new id, replaying every buffered event
    /// per session with `buffer_seq` greater than what the old connection
    /// last saw, assigning fresh per-connection seq starting at 1.
    ///
    /// Sessions named in `last_seq_by_session` that this registry has no
    /// memory of (old connection unknown, or outside the replay window) are
    /// silently skipped: resume outside the window is not itself an error
    /// per the component contract, the client is expected to refetch via
    /// `get_messages`.
    pub async fn resume(
        &self,
        old_connection_id: ConnectionId,
        new_connection_id: ConnectionId,
        new_sink: EventSink,
        last_seq_by_session: &HashMap<SessionId, u64>,
    ) {
        let mut state = self.state.lock().await;
        state.purge_expired();
        state.connections.insert(new_connection_id, ConnectionEntry::new(new_sink.clone()));

        let old_cursor: HashMap<SessionId, u64> = state
            .connections
            .get(&old_connection_id)
            .map(|c| {
                c.seq_state
                    .iter()
                    .filter(|(sid, _)| last_seq_by_session.contains_key(*sid))
                    .map(|(sid, s)| (*sid, s.last_buffer_seq))
                    .collect()
            })
            .unwrap_or_default();

        for (session_id, cursor) in old_cursor {
            let replayed: Vec<(String, serde_json::Value)> = state
                .buffers
                .entry(session_id)
                .or_default()
                .after(cursor)
                .map(|e| (e.event.event_type.clone(), e.event.payload.clone()))
                .collect();

            let Some(new_conn) = state.connections.get_mut(&new_connection_id) else { continue };
            new_conn.attached.insert(session_id);
            let seq_state = new_conn.seq_state.entry(session_id).or_default();

            for (event_type, payload) in replayed {
                seq_state.last_conn_seq += 1;
                let frame = ServerEvent::new(session_id, seq_state.last_conn_seq, event_type, payload);
                if new_sink.try_send(frame).is_err() {
                    warn!(%new_connection_id, %session_id, "resume replay dropped frame, receiver full");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn broadcast_delivers_strictly_increasing_seq_per_connection() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::channel(16);
        let conn = ConnectionId::new();
        let session = SessionId::new();

        registry.register(conn, tx).await;
        registry.attach(conn, session).await;

        registry.broadcast_event(session, "a", json!({})).await;
        registry.broadcast_event(session, "b", json!({})).await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert!(second.seq > first.seq);
    }

    #[tokio::test]
    async fn detached_connections_receive_nothing() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::channel(16);
        let conn = ConnectionId::new();
        let session = SessionId::new();

        registry.register(conn, tx).await;
        registry.attach(conn, session).await;
        registry.detach(conn, session).await;

        registry.broadcast_event(session, "a", json!({})).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn attached_connections_lists_only_that_sessions_attachments() {
        let registry = ConnectionRegistry::new();
        let (tx_a, _rx_a) = mpsc::channel(16);
        let (tx_b, _rx_b) = mpsc::channel(16);
        let conn_a = ConnectionId::new();
        let conn_b = ConnectionId::new();
        let session_a = SessionId::new();
        let session_b = SessionId::new();

        registry.register(conn_a, tx_a).await;
        registry.register(conn_b, tx_b).await;
        registry.attach(conn_a, session_a).await;
        registry.attach(conn_b, session_b).await;

        let attached = registry.attached_connections(session_a).await;
        assert_eq!(attached, vec![conn_a]);

        registry.detach(conn_a, session_a).await;
        assert!(registry.attached_connections(session_a).await.is_empty());
    }

    #[tokio::test]
    async fn resume_replays_events_after_disconnect_with_fresh_seq() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::channel(16);
        let old_conn = ConnectionId::new();
        let session = SessionId::new();

        registry.register(old_conn, tx).await;
        registry.attach(old_conn, session).await;

        for i in 0..4 {
            registry.broadcast_event(session, format!("e{i}"), json!({})).await;
        }
        for _ in 0..4 {
            rx.recv().await.unwrap();
        }

        // Client saw seq 1..4, then disconnects.
        registry.remove(old_conn).await;

        // Two more events arrive while the client is offline.
        registry.broadcast_event(session, "e4", json!({})).await;
        registry.broadcast_event(session, "e5", json!({})).await;

        let (new_tx, mut new_rx) = mpsc::channel(16);
        let new_conn = ConnectionId::new();
        let mut last_seq_by_session = HashMap::new();
        last_seq_by_session.insert(session, 4u64);

        registry.resume(old_conn, new_conn, new_tx, &last_seq_by_session).await;

        let first = new_rx.recv().await.unwrap();
        let second = new_rx.recv().await.unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert_eq!(first.event_type, "e4");
        assert_eq!(second.event_type, "e5");
    }

    #[tokio::test]
    async fn send_to_connection_targets_one_connection_and_skips_replay() {
        let registry = ConnectionRegistry::new();
        let (owner_tx, mut owner_rx) = mpsc::channel(16);
        let (other_tx, mut other_rx) = mpsc::channel(16);
        let owner = ConnectionId::new();
        let other = ConnectionId::new();
        let session = SessionId::new();

        registry.register(owner, owner_tx).await;
        registry.register(other, other_tx).await;
        registry.attach(owner, session).await;
        registry.attach(other, session).await;

        let delivered = registry
            .send_to_connection(owner, session, "native_tool_request", json!({"callId": "c1"}))
            .await;
        assert!(delivered);

        let frame = owner_rx.recv().await.unwrap();
        assert_eq!(frame.event_type, "native_tool_request");
        assert!(other_rx.try_recv().is_err());

        // A subsequent broadcast does not replay the targeted frame to a
        // connection that resumes afterward.
        let (new_tx, mut new_rx) = mpsc::channel(16);
        let new_conn = ConnectionId::new();
        let mut last_seq_by_session = HashMap::new();
        last_seq_by_session.insert(session, 0u64);
        registry.resume(other, new_conn, new_tx, &last_seq_by_session).await;
        assert!(new_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn remove_returns_attached_sessions() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(16);
        let conn = ConnectionId::new();
        let session_a = SessionId::new();
        let session_b = SessionId::new();

        registry.register(conn, tx).await;
        registry.attach(conn, session_a).await;
        registry.attach(conn, session_b).await;

        let mut sessions = registry.remove(conn).await;
        sessions.sort();
        let mut expected = vec![session_a, session_b];
        expected.sort();
        assert_eq!(sessions, expected);
    }
}
