//! Wire types for the `ClientSession` WebSocket protocol (§4.9) and the
//! REST facade (§6).
//!
//! Frames on the WebSocket transport are `{v, kind, id?, sessionId?,
//! method?, params?, ok?, result?, error?}`; with `jsonrpsee` as the
//! transport, `v`/`kind`/`id`/`ok` are handled by the RPC layer itself, so
//! the types here are just the `params`/`result` payloads for each method
//! plus the event envelope `relay_registry::ServerEvent` already carries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use relay_core::{ClientKind, ConnectionId, EnvironmentId, Mode, SessionId};
use relay_engine::ModelInfo;
use relay_sandbox::{Capabilities, ExecResult, SandboxStatus};
use relay_storage::{ClientCapabilities, EnvironmentRow, SecretRow, SessionRow};
use serde::{Deserialize, Serialize};

/// Client identity sent as part of `hello`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client display name (e.g. `"ios"`, `"web-dashboard"`).
    pub name: String,
    /// Client version string.
    pub version: String,
}

/// A prior connection's replay cursor, named in `hello.resume`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeParams {
    /// The connection id the client was previously assigned.
    pub connection_id: ConnectionId,
    /// Per-session last-seen seq, from the connection being resumed.
    pub last_seq_by_session: HashMap<SessionId, u64>,
}

/// Parameters for the `hello` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloParams {
    /// The connecting client's identity.
    pub client: ClientInfo,
    /// Present when resuming a prior connection.
    #[serde(default)]
    pub resume: Option<ResumeParams>,
}

/// What a connection can expect from this server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Whether `hello.resume` is supported at all.
    pub resume: bool,
    /// The replay buffer's retention window, in seconds.
    pub replay_window_sec: u64,
}

/// Result of `hello`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloResult {
    /// The connection id assigned to this WebSocket. Pass this to
    /// `subscribeEvents` to start receiving frames, and to a future
    /// `hello.resume` if this connection drops.
    pub connection_id: ConnectionId,
    /// Server name/version, for client diagnostics.
    pub server_info: ClientInfo,
    /// Declared server capabilities.
    pub capabilities: ServerCapabilities,
}

/// Parameters for `session.create`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionCreateParams {
    /// Chat or code.
    pub mode: Mode,
    /// Which environment to provision under.
    pub environment_id: EnvironmentId,
    /// Required iff `mode = code`.
    #[serde(default)]
    pub repo_id: Option<String>,
    /// `owner/name` display form.
    #[serde(default)]
    pub repo_full_name: Option<String>,
    /// Branch to check out.
    #[serde(default)]
    pub branch_name: Option<String>,
    /// Model provider override.
    #[serde(default)]
    pub model_provider: Option<String>,
    /// Model id override.
    #[serde(default)]
    pub model_id: Option<String>,
    /// System prompt override.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Whether agent tool calls route to an attached native client.
    #[serde(default)]
    pub native_tools_enabled: Option<bool>,
}

/// A created session, with the endpoint the client should open its
/// WebSocket against (mirrors the REST `POST /api/sessions` response).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedSession {
    /// The persisted row.
    #[serde(flatten)]
    pub session: SessionRow,
    /// Endpoint descriptor for this session's live traffic.
    pub ws_endpoint: String,
}

/// Parameters for `session.attach`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAttachParams {
    /// Session to attach to.
    pub session_id: SessionId,
    /// Client identity (stable across reconnects).
    pub client_id: String,
    /// What kind of client this is.
    pub client_kind: ClientKind,
    /// Declared capabilities.
    #[serde(default)]
    pub capabilities: ClientCapabilities,
}

/// Parameters shared by `prompt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptParams {
    /// Target session.
    pub session_id: SessionId,
    /// User message text.
    pub message: String,
}

/// Result of `get_state`: the session row plus a live sandbox probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    /// The persisted row.
    pub session: SessionRow,
    /// Live-probed sandbox status, if a handle is currently attached.
    pub sandbox_status: Option<SandboxStatus>,
    /// The backend's advertised capabilities, if known.
    pub capabilities: Option<Capabilities>,
}

/// Parameters for `get_messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetMessagesParams {
    /// Target session.
    pub session_id: SessionId,
    /// Return events with `seq > after_seq`.
    #[serde(default)]
    pub after_seq: u64,
    /// Maximum rows to return.
    pub limit: usize,
}

/// A single journaled event, as exposed over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Monotonic, gap-free sequence number within the session.
    pub seq: u64,
    /// Event type tag.
    pub event_type: String,
    /// Opaque JSON payload.
    pub payload: serde_json::Value,
    /// Server-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<relay_journal::JournalEvent> for MessageEvent {
    fn from(event: relay_journal::JournalEvent) -> Self {
        Self {
            seq: event.seq,
            event_type: event.event_type,
            payload: event.payload,
            created_at: event.created_at,
        }
    }
}

/// Result of `get_messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetMessagesResult {
    /// Events with `seq > afterSeq`, ascending.
    pub events: Vec<MessageEvent>,
    /// The maximum seq known for the session, even if `events` is empty.
    pub last_seq: u64,
}

/// Parameters for `set_model`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetModelParams {
    /// Target session.
    pub session_id: SessionId,
    /// New model provider key.
    pub model_provider: String,
    /// New model id.
    pub model_id: String,
}

/// Parameters for `native_tool_response`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeToolResponseParams {
    /// Correlates with the `callId` carried by the `native_tool_request`
    /// event this responds to.
    pub call_id: uuid::Uuid,
    /// The tool's successful result, if it did not error.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// The tool's error message, if it failed.
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of `session.activate` (also the REST `POST /activate` response).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateResult {
    /// The activated session.
    pub session_id: SessionId,
    /// Status after activation.
    pub status: relay_core::SessionStatus,
    /// Journal's current max seq, for the client's resume cursor.
    pub last_seq: u64,
    /// Live-probed sandbox status.
    pub sandbox_status: SandboxStatus,
    /// Endpoint descriptor the client should open its WebSocket against.
    pub ws_endpoint: String,
}

impl From<relay_engine::ActivationResult> for ActivateResult {
    fn from(result: relay_engine::ActivationResult) -> Self {
        Self {
            session_id: result.session_id,
            status: result.status,
            last_seq: result.last_seq,
            sandbox_status: result.sandbox_status,
            ws_endpoint: result.ws_endpoint,
        }
    }
}

/// `{exitCode, output}` for exec passthrough.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOutcome {
    /// Process exit code.
    pub exit_code: i32,
    /// Merged stdout+stderr.
    pub output: String,
}

impl From<ExecResult> for ExecOutcome {
    fn from(result: ExecResult) -> Self {
        Self {
            exit_code: result.exit_code,
            output: result.output,
        }
    }
}

/// `{data, error}` response envelope for the REST facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// The successful payload, if any.
    pub data: Option<T>,
    /// The error, if the call failed.
    pub error: Option<WireError>,
}

impl<T> Envelope<T> {
    /// Wrap a successful result.
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self { data: Some(data), error: None }
    }

    /// Wrap a failure.
    #[must_use]
    pub fn err(error: WireError) -> Self {
        Self { data: None, error: Some(error) }
    }
}

/// The `{code, message, details?}` shape used by both REST `error` fields
/// and WS `ok:false` responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    /// One of the wire-level kinds in [`relay_core::ErrorKind`].
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

/// `GET /health` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthInfo {
    /// Always `true` if the process answered.
    pub ok: bool,
    /// Crate version string.
    pub version: String,
}

/// `PUT .../capabilities` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitiesUpdate {
    /// What kind of client this is.
    pub client_kind: ClientKind,
    /// Declared capabilities.
    pub capabilities: ClientCapabilities,
}

/// `GET .../sandbox` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxProbe {
    /// Live-probed status.
    pub status: SandboxStatus,
    /// The backend's advertised capabilities.
    pub capabilities: Capabilities,
}

/// `POST .../exec` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecRequest {
    /// Shell command to run inside the sandbox.
    pub command: String,
}

/// A repository summary from the GitHub collaborator (§6 `GET
/// /api/github/repos`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoSummary {
    /// `owner/name` form.
    pub full_name: String,
    /// Default branch.
    pub default_branch: String,
    /// Whether the repo is private.
    pub private: bool,
}

/// `GET /api/secrets` response item: metadata only, never ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretSummary {
    /// Secret identity.
    pub id: uuid::Uuid,
    /// Human-readable name.
    pub name: String,
    /// Env-var name it materializes under.
    pub env_var: String,
    /// Free-form classification.
    pub kind: String,
    /// Whether currently applied to new sandboxes.
    pub enabled: bool,
}

impl From<SecretRow> for SecretSummary {
    fn from(row: SecretRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            env_var: row.env_var,
            kind: row.kind,
            enabled: row.enabled,
        }
    }
}

/// `POST /api/secrets` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretCreate {
    /// Human-readable name.
    pub name: String,
    /// Env-var name.
    pub env_var: String,
    /// Free-form classification.
    pub kind: String,
    /// Plaintext value; encrypted before it touches storage.
    pub value: String,
}

pub use EnvironmentRow as EnvironmentSummary;
pub use ModelInfo as ModelSummary;
