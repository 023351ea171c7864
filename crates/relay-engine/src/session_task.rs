//! Per-session sandbox reader: the task that owns a [`SandboxChannel`]'s
//! read half for the lifetime of one attach.
//!
//! Grounded on `astrid-gateway::manager::AgentHandle`'s output-pump task
//! (one spawned reader per live agent process, decoupled from the
//! request-handling tasks that read its output via a broadcast channel).

use std::sync::Arc;

use relay_core::SessionId;
use relay_journal::Journal;
use relay_registry::ConnectionRegistry;
use relay_sandbox::SandboxChannel;
use relay_storage::SessionStore;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::broker::{NativeToolBroker, ToolCallOutcome};

const TOOL_START_EVENT_TYPES: [&str; 2] = ["tool_use_start", "tool_execution_start"];

/// Guard that cancels and joins a spawned session reader when dropped.
pub struct SessionTaskHandle {
    cancel: CancellationToken,
    join: tokio::task::JoinHandle<()>,
}

impl SessionTaskHandle {
    /// Signal cancellation and wait for the task to exit. Bounded by the
    /// caller via `tokio::time::timeout` if a hard deadline is needed; this
    /// itself waits unconditionally.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.join.await;
    }
}

impl Drop for SessionTaskHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.join.abort();
    }
}

/// Spawn the reader loop for a newly attached sandbox channel.
///
/// Each line is parsed as a JSON object with optional `type`/`payload`
/// fields (falling back to `"agent_output"`/the whole line if absent),
/// appended to the journal, broadcast to attached connections, and used to
/// refresh `lastActivityAt`. Lines that fail to parse are dropped with a
/// warning; the channel is not broken by a single bad line. A journal write
/// failure is treated as fatal to the session per the component contract:
/// the session is marked `error` and the loop exits.
///
/// When `native_tools_enabled` is set, a `tool_use_start`/
/// `tool_execution_start` event additionally triggers a
/// [`NativeToolBroker::request_call`] round trip instead of letting the
/// event simply flow through as agent output: the result is written back
/// onto the channel as a `tool_result` frame once the owning client
/// responds (or the call is cancelled/owner-lost).
#[must_use]
pub fn spawn(
    session_id: SessionId,
    channel: Arc<SandboxChannel>,
    journal: Journal,
    registry: Arc<ConnectionRegistry>,
    broker: Arc<NativeToolBroker>,
    session_store: SessionStore,
    native_tools_enabled: bool,
) -> SessionTaskHandle {
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();

    let join = tokio::spawn(async move {
        loop {
            let line = tokio::select! {
                _ = task_cancel.cancelled() => break,
                line = channel.recv() => line,
            };

            let Some(line) = line else {
                break;
            };

            let value: serde_json::Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "dropping unparseable agent output line");
                    continue;
                }
            };

            let event_type = value
                .get("type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("agent_output")
                .to_string();
            let payload = value.get("payload").cloned().unwrap_or_else(|| value.clone());

            if journal.append(session_id, event_type.clone(), payload.clone()).await.is_err() {
                warn!(session_id = %session_id, "journal append failed, marking session error");
                if let Err(e) = session_store.set_status(session_id, relay_core::SessionStatus::Error).await {
                    warn!(session_id = %session_id, error = %e, "failed to mark session error after journal failure");
                }
                break;
            }

            registry.broadcast_event(session_id, event_type.clone(), payload.clone()).await;

            if let Err(e) = session_store.touch_activity(session_id).await {
                warn!(session_id = %session_id, error = %e, "failed to touch session activity");
            }

            if native_tools_enabled && TOOL_START_EVENT_TYPES.contains(&event_type.as_str()) {
                route_native_tool_call(session_id, payload, Arc::clone(&channel), Arc::clone(&registry), Arc::clone(&broker));
            }
        }
    });

    SessionTaskHandle { cancel, join }
}

fn route_native_tool_call(
    session_id: SessionId,
    start_payload: serde_json::Value,
    channel: Arc<SandboxChannel>,
    registry: Arc<ConnectionRegistry>,
    broker: Arc<NativeToolBroker>,
) {
    let tool_use_id = start_payload.get("toolUseId").and_then(serde_json::Value::as_str).map(str::to_string);
    let tool_name = start_payload.get("toolName").and_then(serde_json::Value::as_str).unwrap_or_default().to_string();
    let args = start_payload.get("args").cloned().unwrap_or(serde_json::Value::Null);

    tokio::spawn(async move {
        let (call_id, owner, rx) = match broker.request_call(session_id).await {
            Ok(v) => v,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "no native tool owner to route call to");
                return;
            }
        };

        let delivered = registry
            .send_to_connection(
                owner,
                session_id,
                "native_tool_request",
                serde_json::json!({"callId": call_id, "toolName": tool_name, "args": args}),
            )
            .await;
        if !delivered {
            broker.fail_calls_owned_by(owner).await;
            return;
        }

        let outcome = rx.await.unwrap_or(ToolCallOutcome::OwnerLost);
        let frame = match outcome {
            ToolCallOutcome::Result(result) => serde_json::json!({
                "type": "tool_result",
                "toolUseId": tool_use_id,
                "callId": call_id,
                "result": result,
            }),
            ToolCallOutcome::Error(message) => serde_json::json!({
                "type": "tool_result",
                "toolUseId": tool_use_id,
                "callId": call_id,
                "error": message,
            }),
            ToolCallOutcome::Cancelled => serde_json::json!({
                "type": "tool_result",
                "toolUseId": tool_use_id,
                "callId": call_id,
                "error": "tool call aborted",
            }),
            ToolCallOutcome::OwnerLost => serde_json::json!({
                "type": "tool_result",
                "toolUseId": tool_use_id,
                "callId": call_id,
                "error": "owning client disconnected before responding",
            }),
        };

        if let Err(e) = channel.send(&frame.to_string()).await {
            warn!(session_id = %session_id, error = %e, "failed to write tool result back to sandbox channel");
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use relay_core::{ConnectionId, EnvironmentId, Mode};
    use relay_journal::{InMemoryJournalStore, Journal};
    use relay_registry::ConnectionRegistry;
    use relay_storage::{Database, SessionRow, SessionStore};

    use super::*;

    async fn spawn_echo_channel() -> (Arc<SandboxChannel>, tokio::process::Child) {
        let mut child = tokio::process::Command::new("cat")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .unwrap();
        let stdin = child.stdin.take().unwrap();
        let stdout = child.stdout.take().unwrap();
        let stderr = child.stderr.take().unwrap();
        (Arc::new(SandboxChannel::spawn("test", stdin, stdout, stderr)), child)
    }

    #[tokio::test]
    async fn malformed_lines_are_dropped_without_breaking_the_loop() {
        let (channel, mut child) = spawn_echo_channel().await;
        let journal = Journal::new(Arc::new(InMemoryJournalStore::new()));
        let registry = Arc::new(ConnectionRegistry::new());
        let broker = Arc::new(NativeToolBroker::new());
        let db = Arc::new(Database::connect_memory().await.unwrap());
        let session_store = SessionStore::new(Arc::clone(&db));

        let row = SessionRow::new_creating(Mode::Chat, EnvironmentId::new(), None, "anthropic".into(), "claude".into(), None, false);
        let row = session_store.create(row).await.unwrap();

        let handle = spawn(row.id, Arc::clone(&channel), journal.clone(), Arc::clone(&registry), broker, session_store.clone(), false);

        channel.send("not json").await.unwrap();
        channel.send(r#"{"type":"agent_start","payload":{}}"#).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let (events, _) = journal.read_after(row.id, 0, 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "agent_start");

        handle.shutdown().await;
        let _ = child.kill().await;
    }

    #[tokio::test]
    async fn native_tool_start_round_trips_through_the_owner_connection() {
        let (channel, mut child) = spawn_echo_channel().await;
        let journal = Journal::new(Arc::new(InMemoryJournalStore::new()));
        let registry = Arc::new(ConnectionRegistry::new());
        let broker = Arc::new(NativeToolBroker::new());
        let db = Arc::new(Database::connect_memory().await.unwrap());
        let session_store = SessionStore::new(Arc::clone(&db));

        let row = SessionRow::new_creating(Mode::Chat, EnvironmentId::new(), None, "anthropic".into(), "claude".into(), None, true);
        let row = session_store.create(row).await.unwrap();

        let owner = ConnectionId::new();
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        registry.register(owner, tx).await;
        registry.attach(owner, row.id).await;
        broker.set_owner(row.id, owner).await;

        let handle = spawn(
            row.id,
            Arc::clone(&channel),
            journal.clone(),
            Arc::clone(&registry),
            Arc::clone(&broker),
            session_store.clone(),
            true,
        );

        channel
            .send(r#"{"type":"tool_use_start","payload":{"toolUseId":"t1","toolName":"read_file","args":{"path":"/x"}}}"#)
            .await
            .unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        assert_eq!(event.event_type, "native_tool_request");
        let call_id = event.payload.get("callId").unwrap().as_str().unwrap().to_string();

        broker
            .respond(call_id.parse().unwrap(), ToolCallOutcome::Result(serde_json::json!({"contents": "hi"})))
            .await;

        // The channel echoes stdin back to stdout via `cat`, and the reader
        // loop journals it like any other agent output line.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let (events, _) = journal.read_after(row.id, 0, 10).await.unwrap();
        assert!(events.iter().any(|e| e.event_type == "tool_result"));

        handle.shutdown().await;
        let _ = child.kill().await;
    }
}
