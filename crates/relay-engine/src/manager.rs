//! Stateless orchestration between session rows and sandbox provider
//! backends.
//!
//! The DB row is the source of truth; this manager never caches a
//! session-to-provider-id mapping beyond the lifetime of a single call.
//! Grounded on `astrid-gateway::manager::AgentManager`'s
//! request-scoped-lookup style, adapted from a single in-process agent
//! backend to a provider registry keyed by sandbox type.

use std::collections::HashMap;
use std::sync::Arc;

use relay_core::{ResourceTier, SandboxProviderId, SessionStatus};
use relay_sandbox::{CreateSandboxRequest, SandboxChannel, SandboxError, SandboxHandle, SandboxProvider};
use relay_storage::{EnvironmentRow, SecretStore, SessionRow, SessionStore};
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};

/// The outcome of [`SandboxManager::create_for_session`]: the live handle
/// plus the channel obtained from attaching to it, ready for a reader task.
pub struct SandboxCreation {
    /// The sandbox's lifecycle handle.
    pub handle: Arc<dyn SandboxHandle>,
    /// The duplex channel obtained by attaching to the handle.
    pub channel: Arc<SandboxChannel>,
}

/// Orchestrates sandbox creation, reacquisition, and termination for
/// session rows, against whichever [`SandboxProvider`] the row's environment
/// names.
pub struct SandboxManager {
    providers: HashMap<String, Arc<dyn SandboxProvider>>,
    session_store: SessionStore,
    secret_store: Arc<SecretStore>,
}

impl SandboxManager {
    /// Wire a provider registry (keyed by `EnvironmentRow::sandbox_type`)
    /// against the stores it needs to persist sandbox identity and resolve
    /// decrypted secrets.
    #[must_use]
    pub fn new(providers: HashMap<String, Arc<dyn SandboxProvider>>, session_store: SessionStore, secret_store: Arc<SecretStore>) -> Self {
        Self {
            providers,
            session_store,
            secret_store,
        }
    }

    fn provider_for(&self, sandbox_type: &str) -> EngineResult<Arc<dyn SandboxProvider>> {
        self.providers
            .get(sandbox_type)
            .cloned()
            .ok_or_else(|| EngineError::UnknownProvider(sandbox_type.to_string()))
    }

    /// Create (or reuse, if the provider already has one cached for this
    /// session) a sandbox for `session`, attach to it, and persist the
    /// resulting provider identity. Promotes the row to `active` on
    /// success via [`SessionStore::set_sandbox`]; on failure, transitions
    /// the row to `error` and best-effort terminates any partially created
    /// sandbox.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownProvider`] if `environment.sandbox_type`
    /// names no configured provider, or propagates the underlying
    /// [`SandboxError`]/[`relay_storage::StorageError`].
    pub async fn create_for_session(&self, session: &SessionRow, environment: &EnvironmentRow) -> EngineResult<SandboxCreation> {
        let provider = self.provider_for(&environment.sandbox_type)?;

        let result = self.create_for_session_inner(session, environment, &provider).await;
        if result.is_err() {
            if let Err(e) = self.session_store.set_status(session.id, SessionStatus::Error).await {
                warn!(session_id = %session.id, error = %e, "failed to mark session error after sandbox creation failure");
            }
        }
        result
    }

    async fn create_for_session_inner(
        &self,
        session: &SessionRow,
        environment: &EnvironmentRow,
        provider: &Arc<dyn SandboxProvider>,
    ) -> EngineResult<SandboxCreation> {
        let secrets = self.secret_store.get_all_as_env().await?;
        let repo_url = session.repo_full_name.as_ref().map(|full_name| format!("https://github.com/{full_name}.git"));
        let github_token = secrets.get("GITHUB_TOKEN").cloned();

        let limits = Self::limits_for(environment.resource_tier);
        debug!(
            session_id = %session.id,
            resource_tier = ?environment.resource_tier,
            cpu_shares = limits.cpu_shares,
            memory_mib = limits.memory_mib,
            "provisioning sandbox"
        );

        let request = CreateSandboxRequest {
            session_id: session.id,
            env: HashMap::new(),
            secrets,
            repo_url,
            repo_branch: session.branch_name.clone(),
            github_token,
            git_author: None,
            native_tools_enabled: session.native_tools_enabled,
            resource_tier: environment.resource_tier,
        };

        let handle = provider.create_sandbox(request).await?;
        let channel = match handle.attach().await {
            Ok(channel) => channel,
            Err(e) => {
                if let Err(terminate_err) = handle.terminate().await {
                    warn!(session_id = %session.id, error = %terminate_err, "best-effort terminate of partially created sandbox failed");
                }
                return Err(e.into());
            }
        };

        let image_digest = handle.image_digest().unwrap_or_default();
        self.session_store
            .set_sandbox(session.id, environment.sandbox_type.clone(), handle.provider_id().to_string(), image_digest)
            .await?;

        Ok(SandboxCreation { handle, channel })
    }

    /// Re-acquire a handle for an already-provisioned session row by
    /// asking its provider to inspect the backend. Callers are expected to
    /// cache the returned handle in an in-memory map keyed by session id;
    /// this manager holds none of its own.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownProvider`] if the row names no
    /// configured provider, [`EngineError::Sandbox`] wrapping
    /// [`SandboxError::Unavailable`] if the backend no longer knows the
    /// sandbox (the caller should transition the session to `idle`), or
    /// another [`SandboxError`] on unrecoverable provider failure (the
    /// caller should transition the session to `error`).
    pub async fn get_for_session(&self, session: &SessionRow) -> EngineResult<Arc<dyn SandboxHandle>> {
        let sandbox_type = session.sandbox_provider_key.as_deref().ok_or_else(|| EngineError::Sandbox(SandboxError::Unavailable(format!("session {} has no sandbox provider key", session.id))))?;
        let provider_id = session
            .sandbox_provider_id
            .as_deref()
            .ok_or_else(|| EngineError::Sandbox(SandboxError::Unavailable(format!("session {} has no sandbox provider id", session.id))))?;

        let provider = self.provider_for(sandbox_type)?;
        let handle = provider.get_sandbox(&SandboxProviderId::new(provider_id)).await?;
        Ok(handle)
    }

    /// Resume a `session`'s sandbox (acquiring a handle first if needed),
    /// refreshing secrets and the GitHub token the same way
    /// [`Self::create_for_session`] sourced them initially.
    ///
    /// # Errors
    ///
    /// Propagates [`EngineError::UnknownProvider`] or the underlying
    /// [`SandboxError`]/[`relay_storage::StorageError`].
    pub async fn resume_for_session(&self, session: &SessionRow) -> EngineResult<Arc<dyn SandboxHandle>> {
        let handle = self.get_for_session(session).await?;
        let secrets = self.secret_store.get_all_as_env().await?;
        let github_token = secrets.get("GITHUB_TOKEN").cloned();
        handle.resume(Some(secrets), github_token).await?;
        Ok(handle)
    }

    /// Best-effort terminate the sandbox backing `session` and clear its
    /// provider id. Termination failures are logged, not propagated:
    /// `archive`/`delete` must still complete.
    pub async fn terminate_for_session(&self, session: &SessionRow) {
        if let Ok(handle) = self.get_for_session(session).await {
            if let Err(e) = handle.terminate().await {
                warn!(session_id = %session.id, error = %e, "best-effort sandbox termination failed");
            }
        }
        if let Err(e) = self.session_store.clear_sandbox_id(session.id).await {
            warn!(session_id = %session.id, error = %e, "failed to clear sandbox provider id");
        }
    }

    /// Resolve a resource tier's limits, for callers that need to display
    /// or log them. Thin pass-through kept here so callers don't need to
    /// depend on `relay_core::ResourceTier` directly for this one use.
    #[must_use]
    pub fn limits_for(tier: ResourceTier) -> relay_core::ResourceLimits {
        tier.limits()
    }
}
