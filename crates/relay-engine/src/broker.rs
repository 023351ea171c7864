//! Reverse-RPC channel for native tool execution.
//!
//! Grounded on `astrid-gateway::server::rpc::approval`'s request/response
//! correlation pattern (a pending-call map keyed by a caller-opaque id,
//! resolved by a later inbound RPC), adapted from a single approver to a
//! per-session "most recently attached owner" model.

use std::collections::HashMap;

use relay_core::{ConnectionId, SessionId};
use serde_json::Value;
use tokio::sync::{oneshot, Mutex, RwLock};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// The resolution of a pending native tool call.
#[derive(Debug, Clone)]
pub enum ToolCallOutcome {
    /// The owner returned a result.
    Result(Value),
    /// The owner returned an error.
    Error(String),
    /// The call was cancelled by the engine or the client before the
    /// owner responded.
    Cancelled,
    /// The owner disconnected before responding.
    OwnerLost,
}

struct PendingCall {
    session_id: SessionId,
    owner: ConnectionId,
    responder: oneshot::Sender<ToolCallOutcome>,
}

/// Per-session single-owner native tool call broker.
///
/// At most one native-tool-capable client owns execution per session at a
/// time — the most recently attached one (see the grounding ledger's Open
/// Question decision). A previous owner's in-flight calls are *not*
/// cancelled when ownership changes hands: [`PendingCall::owner`] is fixed
/// at request time, so a mid-flight call still resolves against whichever
/// client issued it, and only a fresh `request_call` after the handoff
/// goes to the new owner.
#[derive(Default)]
pub struct NativeToolBroker {
    owners: RwLock<HashMap<SessionId, ConnectionId>>,
    pending: Mutex<HashMap<Uuid, PendingCall>>,
}

impl NativeToolBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `connection_id` as the native-tool owner for `session_id`,
    /// overwriting any previous owner. Called whenever a client attaches
    /// with `capabilities.native_tools = true`.
    pub async fn set_owner(&self, session_id: SessionId, connection_id: ConnectionId) {
        self.owners.write().await.insert(session_id, connection_id);
    }

    /// The current native-tool owner for a session, if any client capable
    /// of it is attached.
    pub async fn owner_for(&self, session_id: SessionId) -> Option<ConnectionId> {
        self.owners.read().await.get(&session_id).copied()
    }

    /// Clear the owner record for a session, e.g. on `archive`/`delete`.
    pub async fn clear_owner(&self, session_id: SessionId) {
        self.owners.write().await.remove(&session_id);
    }

    /// Begin a native tool call: generates a `callId`, registers a pending
    /// resolution keyed by it, and returns the id plus a receiver the
    /// caller awaits for the outcome. The caller is responsible for
    /// actually delivering the `native_tool_request` event to `owner` (the
    /// broker only owns correlation, not transport).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoToolCallOwner`] if no client currently owns
    /// native tool execution for `session_id`.
    pub async fn request_call(&self, session_id: SessionId) -> EngineResult<(Uuid, ConnectionId, oneshot::Receiver<ToolCallOutcome>)> {
        let owner = self.owner_for(session_id).await.ok_or(EngineError::NoToolCallOwner(session_id))?;
        let call_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(
            call_id,
            PendingCall {
                session_id,
                owner,
                responder: tx,
            },
        );
        Ok((call_id, owner, rx))
    }

    /// Resolve a pending call with a client-supplied result or error.
    /// Single-flight: a `call_id` not present (already resolved, cancelled,
    /// or never issued) is silently ignored, so duplicate responses are a
    /// no-op rather than an error.
    pub async fn respond(&self, call_id: Uuid, outcome: ToolCallOutcome) {
        let mut pending = self.pending.lock().await;
        if let Some(call) = pending.remove(&call_id) {
            let _ = call.responder.send(outcome);
        }
    }

    /// Cancel a pending call (engine- or client-initiated abort). Returns
    /// the call's owner so the caller can notify it with a
    /// `native_tool_cancel` event; `None` if the call was already resolved.
    pub async fn cancel(&self, call_id: Uuid) -> Option<ConnectionId> {
        let mut pending = self.pending.lock().await;
        let call = pending.remove(&call_id)?;
        let owner = call.owner;
        let _ = call.responder.send(ToolCallOutcome::Cancelled);
        Some(owner)
    }

    /// Cancel every pending call for `session_id`, e.g. on session `abort`.
    /// Returns `(callId, owner)` for each cancelled call so the caller can
    /// emit the `native_tool_cancel{callId}` event spec §4.8 requires —
    /// the broker only owns correlation, not transport, so it hands the
    /// addressing information back rather than reaching into the registry
    /// itself.
    pub async fn cancel_all_for_session(&self, session_id: SessionId) -> Vec<(Uuid, ConnectionId)> {
        let mut pending = self.pending.lock().await;
        let stale: Vec<Uuid> = pending.iter().filter(|(_, call)| call.session_id == session_id).map(|(id, _)| *id).collect();
        let mut cancelled = Vec::with_capacity(stale.len());
        for call_id in stale {
            if let Some(call) = pending.remove(&call_id) {
                let owner = call.owner;
                let _ = call.responder.send(ToolCallOutcome::Cancelled);
                cancelled.push((call_id, owner));
            }
        }
        cancelled
    }

    /// Fail every pending call owned by `connection_id` with
    /// [`ToolCallOutcome::OwnerLost`]. Called when the
    /// [`relay_registry::ConnectionRegistry`] reports a connection removed.
    pub async fn fail_calls_owned_by(&self, connection_id: ConnectionId) {
        let mut pending = self.pending.lock().await;
        let stale: Vec<Uuid> = pending.iter().filter(|(_, call)| call.owner == connection_id).map(|(id, _)| *id).collect();
        for call_id in stale {
            if let Some(call) = pending.remove(&call_id) {
                let _ = call.responder.send(ToolCallOutcome::OwnerLost);
            }
        }
    }

    /// Pending call ids for a session, for diagnostics/tests.
    #[cfg(test)]
    async fn pending_sessions(&self) -> Vec<SessionId> {
        self.pending.lock().await.values().map(|c| c.session_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_call_requires_an_owner() {
        let broker = NativeToolBroker::new();
        let session = SessionId::new();
        let result = broker.request_call(session).await;
        assert!(matches!(result, Err(EngineError::NoToolCallOwner(_))));
    }

    #[tokio::test]
    async fn respond_resolves_the_matching_call() {
        let broker = NativeToolBroker::new();
        let session = SessionId::new();
        let owner = ConnectionId::new();
        broker.set_owner(session, owner).await;

        let (call_id, returned_owner, rx) = broker.request_call(session).await.unwrap();
        assert_eq!(returned_owner, owner);

        broker.respond(call_id, ToolCallOutcome::Result(serde_json::json!({"ok": true}))).await;
        let outcome = rx.await.unwrap();
        assert!(matches!(outcome, ToolCallOutcome::Result(_)));
    }

    #[tokio::test]
    async fn duplicate_responses_are_ignored() {
        let broker = NativeToolBroker::new();
        let session = SessionId::new();
        let owner = ConnectionId::new();
        broker.set_owner(session, owner).await;

        let (call_id, _, rx) = broker.request_call(session).await.unwrap();
        broker.respond(call_id, ToolCallOutcome::Result(serde_json::json!(1))).await;
        // Second response for the same (already-removed) call_id is a no-op.
        broker.respond(call_id, ToolCallOutcome::Error("late".into())).await;

        let outcome = rx.await.unwrap();
        assert!(matches!(outcome, ToolCallOutcome::Result(_)));
    }

    #[tokio::test]
    async fn owner_disconnect_fails_only_its_own_calls() {
        let broker = NativeToolBroker::new();
        let session_a = SessionId::new();
        let session_b = SessionId::new();
        let owner_a = ConnectionId::new();
        let owner_b = ConnectionId::new();
        broker.set_owner(session_a, owner_a).await;
        broker.set_owner(session_b, owner_b).await;

        let (_, _, rx_a) = broker.request_call(session_a).await.unwrap();
        let (_, _, rx_b) = broker.request_call(session_b).await.unwrap();

        broker.fail_calls_owned_by(owner_a).await;

        assert!(matches!(rx_a.await.unwrap(), ToolCallOutcome::OwnerLost));
        assert_eq!(broker.pending_sessions().await, vec![session_b]);
        drop(rx_b);
    }

    #[tokio::test]
    async fn cancel_all_for_session_only_touches_that_session() {
        let broker = NativeToolBroker::new();
        let session_a = SessionId::new();
        let session_b = SessionId::new();
        let owner = ConnectionId::new();
        broker.set_owner(session_a, owner).await;
        broker.set_owner(session_b, owner).await;

        let (call_id_a, _, rx_a) = broker.request_call(session_a).await.unwrap();
        let (_, _, rx_b) = broker.request_call(session_b).await.unwrap();

        let cancelled = broker.cancel_all_for_session(session_a).await;
        assert_eq!(cancelled, vec![(call_id_a, owner)]);

        assert!(matches!(rx_a.await.unwrap(), ToolCallOutcome::Cancelled));
        assert_eq!(broker.pending_sessions().await, vec![session_b]);
        drop(rx_b);
    }

    #[tokio::test]
    async fn ownership_handoff_does_not_cancel_in_flight_call() {
        let broker = NativeToolBroker::new();
        let session = SessionId::new();
        let first_owner = ConnectionId::new();
        let second_owner = ConnectionId::new();

        broker.set_owner(session, first_owner).await;
        let (call_id, owner_at_request_time, rx) = broker.request_call(session).await.unwrap();
        assert_eq!(owner_at_request_time, first_owner);

        // A second client attaches and takes over ownership mid-flight.
        broker.set_owner(session, second_owner).await;
        assert_eq!(broker.owner_for(session).await, Some(second_owner));

        // The in-flight call still resolves normally; it was never tied to
        // "whoever currently owns the session", only to its original owner.
        broker.respond(call_id, ToolCallOutcome::Result(serde_json::json!("done"))).await;
        assert!(matches!(rx.await.unwrap(), ToolCallOutcome::Result(_)));
    }
}
