//! Row types persisted by the stores in this crate.
//!
//! These mirror the data model in the specification directly; they are the
//! wire-adjacent shape the stores read and write, not a separate ORM layer.

use chrono::{DateTime, Utc};
use relay_core::{ClientKind, EnvironmentId, Mode, ResourceTier, SessionId, SessionStatus};
use serde::{Deserialize, Serialize};

/// A persisted session row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    /// Session identity.
    pub id: SessionId,
    /// Chat or code.
    pub mode: Mode,
    /// Current lifecycle state.
    pub status: SessionStatus,
    /// Which backend created the sandbox, if any.
    pub sandbox_provider_key: Option<String>,
    /// The backend's opaque identifier for the sandbox instance.
    pub sandbox_provider_id: Option<String>,
    /// Which environment's config this session was created under.
    pub environment_id: EnvironmentId,
    /// Image digest captured at sandbox creation, for reproducibility.
    pub image_digest: Option<String>,
    /// Repository identity, required iff `mode = code`.
    pub repo_id: Option<String>,
    /// Host-side repository path within the sandbox workspace.
    pub repo_path: Option<String>,
    /// Checked-out branch name.
    pub branch_name: Option<String>,
    /// `owner/name` form of the repository, for display.
    pub repo_full_name: Option<String>,
    /// Model provider key (e.g. `"anthropic"`).
    pub model_provider: String,
    /// Model id within that provider.
    pub model_id: String,
    /// System prompt override for this session, if any.
    pub system_prompt: Option<String>,
    /// Set once from the first user turn.
    pub first_user_message: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Whether secrets/extensions visible to the sandbox may be stale.
    pub extensions_stale: bool,
    /// Whether agent-initiated tool calls should be routed back to an
    /// attached native-tool-capable client rather than run inside the
    /// sandbox. Persisted (rather than recomputed from attached clients at
    /// resume time) so a sandbox resumed with no client yet attached still
    /// advertises the right thing to the agent.
    pub native_tools_enabled: bool,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last time a channel saw traffic for this session.
    pub last_activity_at: DateTime<Utc>,
}

impl SessionRow {
    /// Construct a freshly `creating` session row.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new_creating(
        mode: Mode,
        environment_id: EnvironmentId,
        repo_id: Option<String>,
        model_provider: String,
        model_id: String,
        system_prompt: Option<String>,
        native_tools_enabled: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            mode,
            status: SessionStatus::Creating,
            sandbox_provider_key: None,
            sandbox_provider_id: None,
            environment_id,
            image_digest: None,
            repo_id,
            repo_path: None,
            branch_name: None,
            repo_full_name: None,
            model_provider,
            model_id,
            system_prompt,
            first_user_message: None,
            name: None,
            extensions_stale: false,
            native_tools_enabled,
            created_at: now,
            last_activity_at: now,
        }
    }
}

/// A persisted environment configuration row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentRow {
    /// Environment identity.
    pub id: EnvironmentId,
    /// Display name.
    pub name: String,
    /// Which sandbox backend key this environment selects.
    pub sandbox_type: String,
    /// Image reference to create sandboxes from.
    pub image_reference: String,
    /// Optional remote-worker URL, for the remote-worker backend.
    pub worker_url: Option<String>,
    /// Optional reference to a base secret bundle applied to every session.
    pub base_secret_ref: Option<String>,
    /// Idle timeout, in seconds, before the Idle Watcher pauses the sandbox.
    pub idle_timeout_secs: u64,
    /// Resource tier new sessions under this environment are created with.
    pub resource_tier: ResourceTier,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
}

/// Capability flags a client connection advertises.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Whether this client can execute native tools on the agent's behalf.
    pub native_tools: bool,
}

/// A persisted client registration row, keyed by `(session_id, client_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistrationRow {
    /// Session this client is registered against.
    pub session_id: SessionId,
    /// Client identity (distinct from the connection id; a client may
    /// reconnect under a fresh connection but the same client id).
    pub client_id: String,
    /// What kind of client this is.
    pub client_kind: ClientKind,
    /// Declared capabilities.
    pub capabilities: ClientCapabilities,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
}

/// A persisted secret row. The ciphertext is opaque to every consumer except
/// [`crate::secret_store::SecretStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRow {
    /// Secret identity.
    pub id: uuid::Uuid,
    /// Human-readable name, shown in the dashboard.
    pub name: String,
    /// Environment variable name this secret is materialized under.
    pub env_var: String,
    /// Free-form classification (`"api_key"`, `"token"`, ...).
    pub kind: String,
    /// Whether this secret is currently applied to new sandboxes.
    pub enabled: bool,
    /// Base64-encoded ciphertext.
    pub ciphertext: String,
    /// Base64-encoded nonce used for this ciphertext.
    pub nonce: String,
    /// Which key version encrypted this ciphertext.
    pub key_version: u32,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
}
