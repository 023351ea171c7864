//! Strategy interface over heterogeneous sandbox backends.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::{ResourceTier, SandboxProviderId, SessionId};
use serde::{Deserialize, Serialize};

use crate::error::SandboxResult;
use crate::handle::SandboxHandle;
use crate::status::SandboxStatus;

/// Request to create (or reuse) a sandbox for a session.
#[derive(Debug, Clone)]
pub struct CreateSandboxRequest {
    /// Session this sandbox belongs to.
    pub session_id: SessionId,
    /// Plain (already-decrypted) environment variables to expose in the
    /// sandbox, independent of `secrets`.
    pub env: HashMap<String, String>,
    /// Decrypted secret values keyed by their configured env-var name.
    /// Written into a private, read-only-mounted directory alongside a
    /// manifest mapping env-var name to an opaque filename — never a
    /// filename derived from the env-var or secret name itself, to rule
    /// out path traversal from untrusted configuration.
    pub secrets: HashMap<String, String>,
    /// Repository to clone, if this is a code-mode session.
    pub repo_url: Option<String>,
    /// Branch to check out after clone.
    pub repo_branch: Option<String>,
    /// Token-bearing clone URL; rewritten to a clean origin immediately
    /// after clone so the token never persists in the repo's git config.
    pub github_token: Option<String>,
    /// Git identity used for the author/committer of any agent commits.
    pub git_author: Option<(String, String)>,
    /// Whether this session's client(s) support native tool calls; exposed
    /// to the bridge so the agent knows whether to route tool calls back
    /// through the relay at all.
    pub native_tools_enabled: bool,
    /// CPU-share / memory tier this sandbox is provisioned at.
    pub resource_tier: ResourceTier,
}

/// Summary row returned by [`SandboxProvider::list_sandboxes`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxSummary {
    /// Session the sandbox belongs to, if recoverable from backend
    /// metadata (container labels, worker job tags).
    pub session_id: Option<SessionId>,
    /// Backend-opaque identifier.
    pub provider_id: SandboxProviderId,
    /// Status as last observed by the backend.
    pub status: SandboxStatus,
    /// When the backend reports this sandbox was created.
    pub created_at: DateTime<Utc>,
}

/// Strategy interface implemented by each concrete backend (local-process,
/// remote-worker, and — as a documented extension point — microVM).
///
/// The engine and [`crate::manager`]-level orchestration (in `relay-engine`)
/// never inspect which backend they're holding; everything they need is
/// exposed uniformly through this trait and [`SandboxHandle`].
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    /// Probe whether this backend is currently usable (daemon reachable,
    /// worker pool has capacity, etc).
    async fn is_available(&self) -> bool;

    /// Create a sandbox for `request.session_id`, or return the existing
    /// handle if one is already running for that session.
    async fn create_sandbox(&self, request: CreateSandboxRequest) -> SandboxResult<Arc<dyn SandboxHandle>>;

    /// Reconstruct a handle from backend inspection. The handle's initial
    /// status is derived from what the backend currently reports.
    async fn get_sandbox(&self, provider_id: &SandboxProviderId) -> SandboxResult<Arc<dyn SandboxHandle>>;

    /// Enumerate sandboxes this provider owns (filtered by its own naming
    /// convention, e.g. a container-name prefix).
    async fn list_sandboxes(&self) -> SandboxResult<Vec<SandboxSummary>>;

    /// Reap exited sandboxes and their host-side artifacts.
    async fn cleanup(&self) -> SandboxResult<()>;
}
