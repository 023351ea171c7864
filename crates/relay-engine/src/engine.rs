//! `SessionEngine`: owns the session state machine and the live attachment
//! set.
//!
//! Grounded on `astrid-gateway::manager::AgentManager`'s role (the single
//! owner of per-agent in-memory state, backed by a persisted row) combined
//! with `astrid-gateway::server::inbound_router`'s method-per-operation
//! shape, adapted from a single local agent process to sessions whose
//! sandbox may live behind any [`relay_sandbox::SandboxProvider`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use relay_core::{ClientKind, ConnectionId, EnvironmentId, Mode, SessionId, SessionStatus};
use relay_journal::Journal;
use relay_registry::ConnectionRegistry;
use relay_sandbox::{SandboxChannel, SandboxHandle, SandboxStatus};
use relay_storage::{ClientCapabilities, ClientStore, EnvironmentStore, SessionRow, SessionStore};
use tokio::sync::Mutex;
use tracing::warn;

use crate::broker::{NativeToolBroker, ToolCallOutcome};
use crate::catalog::{self, ModelInfo};
use crate::error::{EngineError, EngineResult};
use crate::manager::SandboxManager;
use crate::session_task::{self, SessionTaskHandle};

const DEFAULT_MODEL_PROVIDER: &str = "anthropic";
const DEFAULT_MODEL_ID: &str = "claude-sonnet-4";

/// Parameters for [`SessionEngine::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateSessionParams {
    /// Chat or code.
    pub mode: Mode,
    /// Which environment's config to provision under.
    pub environment_id: EnvironmentId,
    /// Required iff `mode = code`.
    pub repo_id: Option<String>,
    /// `owner/name` display form, set alongside `repo_id` for code sessions.
    pub repo_full_name: Option<String>,
    /// Branch to check out, for code sessions.
    pub branch_name: Option<String>,
    /// Defaults to [`DEFAULT_MODEL_PROVIDER`] if omitted.
    pub model_provider: Option<String>,
    /// Defaults to [`DEFAULT_MODEL_ID`] if omitted.
    pub model_id: Option<String>,
    /// System prompt override.
    pub system_prompt: Option<String>,
    /// Whether agent tool calls should route to an attached native client.
    pub native_tools: Option<bool>,
}

/// Result of [`SessionEngine::activate`].
#[derive(Debug, Clone)]
pub struct ActivationResult {
    /// The activated session.
    pub session_id: SessionId,
    /// Its status after activation (`active` unless reconciliation left it
    /// otherwise).
    pub status: SessionStatus,
    /// The journal's current max seq, for the client's resume cursor.
    pub last_seq: u64,
    /// The live-probed sandbox status.
    pub sandbox_status: SandboxStatus,
    /// Endpoint descriptor the client should open its WebSocket against.
    pub ws_endpoint: String,
}

/// Owns the session state machine, the in-memory handle/channel/reader-task
/// caches, and coordinates the [`SandboxManager`], [`NativeToolBroker`], and
/// [`ConnectionRegistry`] against persisted [`SessionRow`]s.
///
/// All fields are cheaply `Clone` (stores wrap an `Arc<Database>`, the rest
/// are already `Arc`-wrapped), so the engine itself derives `Clone` rather
/// than requiring callers to wrap it in an `Arc` themselves before spawning
/// background provisioning/reconcile tasks.
#[derive(Clone)]
pub struct SessionEngine {
    session_store: SessionStore,
    environment_store: EnvironmentStore,
    client_store: ClientStore,
    journal: Journal,
    registry: Arc<ConnectionRegistry>,
    manager: Arc<SandboxManager>,
    broker: Arc<NativeToolBroker>,
    handles: Arc<Mutex<HashMap<SessionId, Arc<dyn SandboxHandle>>>>,
    channels: Arc<Mutex<HashMap<SessionId, Arc<SandboxChannel>>>>,
    tasks: Arc<Mutex<HashMap<SessionId, SessionTaskHandle>>>,
    activation_timeout: Duration,
    ws_endpoint_base: String,
}

impl SessionEngine {
    /// Wire an engine against the stores and collaborators it needs.
    /// `ws_endpoint_base` is prefixed onto a session id to build the
    /// descriptor `activate` returns, e.g. `"ws://localhost:8787"`.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_store: SessionStore,
        environment_store: EnvironmentStore,
        client_store: ClientStore,
        journal: Journal,
        registry: Arc<ConnectionRegistry>,
        manager: Arc<SandboxManager>,
        broker: Arc<NativeToolBroker>,
        activation_timeout: Duration,
        ws_endpoint_base: impl Into<String>,
    ) -> Self {
        Self {
            session_store,
            environment_store,
            client_store,
            journal,
            registry,
            manager,
            broker,
            handles: Arc::new(Mutex::new(HashMap::new())),
            channels: Arc::new(Mutex::new(HashMap::new())),
            tasks: Arc::new(Mutex::new(HashMap::new())),
            activation_timeout,
            ws_endpoint_base: ws_endpoint_base.into(),
        }
    }

    /// Create a session row in `creating` and kick off sandbox provisioning
    /// in the background. Returns as soon as the row is persisted.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RepoRequired`] if `mode = code` and `repo_id`
    /// is missing, or propagates a [`relay_storage::StorageError`] from the
    /// initial insert.
    pub async fn create(&self, params: CreateSessionParams) -> EngineResult<SessionRow> {
        if params.mode == Mode::Code && params.repo_id.is_none() {
            return Err(EngineError::RepoRequired);
        }

        let mut row = SessionRow::new_creating(
            params.mode,
            params.environment_id,
            params.repo_id,
            params.model_provider.unwrap_or_else(|| DEFAULT_MODEL_PROVIDER.to_string()),
            params.model_id.unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            params.system_prompt,
            params.native_tools.unwrap_or(false),
        );
        row.repo_full_name = params.repo_full_name;
        row.branch_name = params.branch_name;

        let created = self.session_store.create(row).await?;

        let engine = self.clone();
        let session_id = created.id;
        tokio::spawn(async move {
            engine.provision(session_id).await;
        });

        Ok(created)
    }

    async fn provision(&self, session_id: SessionId) {
        let session = match self.session_store.get(session_id).await {
            Ok(s) => s,
            Err(e) => {
                warn!(%session_id, error = %e, "provisioning could not load session row");
                return;
            }
        };
        let environment = match self.environment_store.get(session.environment_id).await {
            Ok(e) => e,
            Err(e) => {
                warn!(%session_id, error = %e, "provisioning could not load environment row");
                if let Err(e) = self.session_store.set_status(session_id, SessionStatus::Error).await {
                    warn!(%session_id, error = %e, "failed to mark session error");
                }
                return;
            }
        };

        match self.manager.create_for_session(&session, &environment).await {
            Ok(creation) => {
                self.adopt(session_id, creation.handle, creation.channel, session.native_tools_enabled).await;
            }
            Err(e) => {
                warn!(%session_id, error = %e, "sandbox provisioning failed");
            }
        }
    }

    async fn adopt(&self, session_id: SessionId, handle: Arc<dyn SandboxHandle>, channel: Arc<SandboxChannel>, native_tools_enabled: bool) {
        self.handles.lock().await.insert(session_id, Arc::clone(&handle));
        self.channels.lock().await.insert(session_id, Arc::clone(&channel));

        let task = session_task::spawn(
            session_id,
            channel,
            self.journal.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.broker),
            self.session_store.clone(),
            native_tools_enabled,
        );
        if let Some(old) = self.tasks.lock().await.insert(session_id, task) {
            old.shutdown().await;
        }

        self.spawn_reconcile_watcher(session_id, handle);
    }

    /// Watches the handle's status transitions and reconciles one automatic
    /// step if it becomes `stopped` while the row still reads `active`:
    /// retry `attach()` (which restarts a stopped backend before returning a
    /// fresh channel); on success the session stays `active` with a new
    /// reader task, on failure it settles into `idle`.
    fn spawn_reconcile_watcher(&self, session_id: SessionId, handle: Arc<dyn SandboxHandle>) {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut status_rx = handle.on_status_change();
            loop {
                if status_rx.changed().await.is_err() {
                    return;
                }
                if *status_rx.borrow() != SandboxStatus::Stopped {
                    continue;
                }

                let Ok(row) = engine.session_store.get(session_id).await else {
                    return;
                };
                if row.status != SessionStatus::Active {
                    continue;
                }

                match handle.attach().await {
                    Ok(channel) => {
                        engine.channels.lock().await.insert(session_id, Arc::clone(&channel));
                        let task = session_task::spawn(
                            session_id,
                            channel,
                            engine.journal.clone(),
                            Arc::clone(&engine.registry),
                            Arc::clone(&engine.broker),
                            engine.session_store.clone(),
                            row.native_tools_enabled,
                        );
                        if let Some(old) = engine.tasks.lock().await.insert(session_id, task) {
                            old.shutdown().await;
                        }
                    }
                    Err(e) => {
                        warn!(%session_id, error = %e, "automatic reconcile could not restart sandbox, marking idle");
                        if let Err(e) = engine.session_store.set_status(session_id, SessionStatus::Idle).await {
                            warn!(%session_id, error = %e, "failed to mark session idle after reconcile failure");
                        }
                        return;
                    }
                }
            }
        });
    }

    async fn wait_until_live(&self, session_id: SessionId) -> EngineResult<SessionRow> {
        loop {
            let row = self.session_store.get(session_id).await?;
            match row.status {
                SessionStatus::Active | SessionStatus::Idle => return Ok(row),
                SessionStatus::Archived => return Err(EngineError::ArchivedSessionImmutable(session_id)),
                SessionStatus::Error => return Err(EngineError::SessionNotFound(session_id)),
                SessionStatus::Creating => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    }

    async fn ensure_handle(&self, row: &SessionRow) -> EngineResult<Arc<dyn SandboxHandle>> {
        if let Some(handle) = self.handles.lock().await.get(&row.id) {
            return Ok(Arc::clone(handle));
        }
        let handle = self.manager.get_for_session(row).await?;
        self.handles.lock().await.insert(row.id, Arc::clone(&handle));
        Ok(handle)
    }

    async fn ensure_channel(&self, row: &SessionRow, handle: &Arc<dyn SandboxHandle>) -> EngineResult<()> {
        if self.channels.lock().await.contains_key(&row.id) {
            return Ok(());
        }
        let channel = handle.attach().await?;
        self.adopt(row.id, Arc::clone(handle), channel, row.native_tools_enabled).await;
        Ok(())
    }

    /// Wait (bounded) for the session to reach `active`/`idle`, resume it if
    /// idle, re-arm its sandbox attachment, and emit a `connected` event
    /// carrying the journal's current max seq to the activating connection's
    /// session.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ActivationTimeout`] if the bounded deadline
    /// elapses first, [`EngineError::ArchivedSessionImmutable`] if the
    /// session is archived, or propagates a lower-level error.
    pub async fn activate(&self, session_id: SessionId, _client_id: impl Into<String>) -> EngineResult<ActivationResult> {
        let mut row = tokio::time::timeout(self.activation_timeout, self.wait_until_live(session_id))
            .await
            .map_err(|_| EngineError::ActivationTimeout)??;

        if row.status == SessionStatus::Idle {
            self.manager.resume_for_session(&row).await?;
            row = self.session_store.set_status(session_id, SessionStatus::Active).await?;
        }

        let handle = self.ensure_handle(&row).await?;
        self.ensure_channel(&row, &handle).await?;

        let (_, last_seq) = self.journal.read_after(session_id, 0, 0).await?;
        let sandbox_status = handle.status().await;

        self.registry
            .broadcast_event(session_id, "connected", serde_json::json!({"sessionId": session_id, "lastSeq": last_seq}))
            .await;

        Ok(ActivationResult {
            session_id,
            status: row.status,
            last_seq,
            sandbox_status,
            ws_endpoint: format!("{}/sessions/{session_id}", self.ws_endpoint_base),
        })
    }

    /// Register a connection for event fan-out against `session_id`, and,
    /// if its capabilities include native tool execution, record it as the
    /// tool-call owner (overwriting any previous owner).
    ///
    /// # Errors
    ///
    /// Propagates [`relay_storage::StorageError::NotFound`] if the session
    /// doesn't exist.
    pub async fn attach_client(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
        client_id: impl Into<String>,
        client_kind: ClientKind,
        capabilities: ClientCapabilities,
    ) -> EngineResult<()> {
        self.session_store.get(session_id).await?;
        self.registry.attach(connection_id, session_id).await;
        self.client_store.upsert(session_id, client_id, client_kind, capabilities).await?;
        if capabilities.native_tools {
            self.broker.set_owner(session_id, connection_id).await;
        }
        Ok(())
    }

    /// Enqueue a user message onto the sandbox channel, fire-and-forget.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ArchivedSessionImmutable`] if the session is
    /// archived, [`EngineError::Sandbox`] wrapping
    /// [`relay_sandbox::SandboxError::Unavailable`] if no channel is
    /// currently attached, or propagates a lower-level error.
    pub async fn prompt(&self, session_id: SessionId, message: impl Into<String>) -> EngineResult<()> {
        let message = message.into();
        let row = self.session_store.get(session_id).await?;
        if row.status.is_terminal() {
            return Err(EngineError::ArchivedSessionImmutable(session_id));
        }

        let channel = self.channel_for(session_id).await?;
        let frame = serde_json::json!({"type": "prompt", "payload": {"message": message}});
        channel.send(&frame.to_string()).await?;

        self.journal.append(session_id, "prompt", serde_json::json!({"message": message})).await?;
        self.session_store.record_prompt(session_id, &message).await?;
        Ok(())
    }

    /// Send the agent's cancel frame and cancel any pending native tool
    /// calls for the session, notifying each call's owner with a
    /// `native_tool_cancel` event per spec §4.8.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Sandbox`] wrapping
    /// [`relay_sandbox::SandboxError::Unavailable`] if no channel is
    /// currently attached.
    pub async fn abort(&self, session_id: SessionId) -> EngineResult<()> {
        let channel = self.channel_for(session_id).await?;
        channel.send(&serde_json::json!({"type": "abort"}).to_string()).await?;
        for (call_id, owner) in self.broker.cancel_all_for_session(session_id).await {
            self.registry
                .send_to_connection(owner, session_id, "native_tool_cancel", serde_json::json!({"callId": call_id}))
                .await;
        }
        self.journal.append(session_id, "abort", serde_json::json!({})).await?;
        Ok(())
    }

    /// Change a session's target model.
    ///
    /// # Errors
    ///
    /// Returns [`relay_storage::StorageError::InvalidTransition`] if the
    /// session is archived.
    pub async fn set_model(&self, session_id: SessionId, model_provider: impl Into<String>, model_id: impl Into<String>) -> EngineResult<SessionRow> {
        Ok(self.session_store.set_model(session_id, model_provider, model_id).await?)
    }

    /// Best-effort terminate the sandbox and transition to `archived`.
    /// Terminal: no further mutation is permitted afterward.
    ///
    /// # Errors
    ///
    /// Propagates a [`relay_storage::StorageError`] from the final status
    /// write; sandbox/task teardown failures are logged, not propagated.
    pub async fn archive(&self, session_id: SessionId) -> EngineResult<()> {
        let row = self.session_store.get(session_id).await?;
        self.manager.terminate_for_session(&row).await;
        self.teardown_live_state(session_id).await;
        self.session_store.set_status(session_id, SessionStatus::Archived).await?;
        Ok(())
    }

    /// Hard-delete a session row and all of its journaled events. Safe to
    /// call on a session in any status; best-effort terminates the sandbox
    /// first if one is still associated.
    ///
    /// # Errors
    ///
    /// Propagates a [`relay_storage::StorageError`] from the row deletion or
    /// a [`relay_journal::JournalError`] from the event deletion.
    pub async fn delete(&self, session_id: SessionId) -> EngineResult<()> {
        if let Ok(row) = self.session_store.get(session_id).await {
            self.manager.terminate_for_session(&row).await;
        }
        self.teardown_live_state(session_id).await;
        self.journal.delete(session_id).await?;
        self.session_store.delete(session_id).await?;
        Ok(())
    }

    async fn teardown_live_state(&self, session_id: SessionId) {
        if let Some(task) = self.tasks.lock().await.remove(&session_id) {
            task.shutdown().await;
        }
        self.channels.lock().await.remove(&session_id);
        self.handles.lock().await.remove(&session_id);
        self.broker.clear_owner(session_id).await;
        for connection_id in self.registry.attached_connections(session_id).await {
            self.registry.detach(connection_id, session_id).await;
        }
    }

    async fn channel_for(&self, session_id: SessionId) -> EngineResult<Arc<SandboxChannel>> {
        self.channels
            .lock()
            .await
            .get(&session_id)
            .cloned()
            .ok_or_else(|| EngineError::Sandbox(relay_sandbox::SandboxError::Unavailable(format!("no attached channel for session {session_id}"))))
    }

    /// Probe a session's live sandbox status, acquiring and caching a
    /// handle first if none is held yet. Read-only from the caller's point
    /// of view: used by status-display endpoints that shouldn't otherwise
    /// perturb engine state the way `activate` does.
    ///
    /// # Errors
    ///
    /// Propagates a [`relay_storage::StorageError`] if the session row is
    /// missing, or an [`EngineError::Sandbox`] if no handle can be acquired.
    pub async fn sandbox_status(&self, session_id: SessionId) -> EngineResult<SandboxStatus> {
        self.sandbox_probe(session_id).await.map(|(status, _)| status)
    }

    /// Probe a session's live sandbox status and advertised capabilities in
    /// one call, for the `GET .../sandbox` facade endpoint.
    ///
    /// # Errors
    ///
    /// Same as [`Self::sandbox_status`].
    pub async fn sandbox_probe(&self, session_id: SessionId) -> EngineResult<(SandboxStatus, relay_sandbox::Capabilities)> {
        let row = self.session_store.get(session_id).await?;
        let handle = self.ensure_handle(&row).await?;
        Ok((handle.status().await, handle.capabilities()))
    }

    /// Run a one-off shell command in a session's sandbox, bypassing the
    /// agent loop. Used by the exec passthrough facade, not the prompt path.
    ///
    /// # Errors
    ///
    /// Propagates a [`relay_storage::StorageError`] if the session row is
    /// missing, or a [`relay_sandbox::SandboxError`] if no handle can be
    /// acquired or the backend doesn't support `exec`.
    pub async fn exec(&self, session_id: SessionId, command: impl Into<String>) -> EngineResult<relay_sandbox::ExecResult> {
        let row = self.session_store.get(session_id).await?;
        let handle = self.ensure_handle(&row).await?;
        Ok(handle.exec(&command.into()).await?)
    }

    /// Resolve a pending native tool call with a client-supplied outcome.
    /// Thin pass-through to the [`NativeToolBroker`], kept here so
    /// `relay-server` can route `native_tool_response` through the engine
    /// facade without depending on the broker type directly.
    pub async fn respond_native_tool(&self, call_id: uuid::Uuid, outcome: ToolCallOutcome) {
        self.broker.respond(call_id, outcome).await;
    }

    /// Models available for a session's current provider if it is live, or
    /// the full static catalog via ephemeral introspection otherwise.
    #[must_use]
    pub async fn available_models(&self, session_id: Option<SessionId>) -> Vec<ModelInfo> {
        if let Some(session_id) = session_id {
            if let Ok(row) = self.session_store.get(session_id).await {
                if matches!(row.status, SessionStatus::Active | SessionStatus::Idle) {
                    return catalog::for_provider(&row.model_provider);
                }
            }
        }
        catalog::all_models()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use relay_core::ResourceTier;
    use relay_journal::InMemoryJournalStore;
    use relay_sandbox::{LocalProcessProvider, SandboxProvider};
    use relay_storage::{Database, EnvironmentRow, SecretKey, SecretStore};

    use super::*;

    fn new_env_row() -> EnvironmentRow {
        EnvironmentRow {
            id: EnvironmentId::new(),
            name: "default".into(),
            sandbox_type: "local-process".into(),
            image_reference: "ghcr.io/example/agent:latest".into(),
            worker_url: None,
            base_secret_ref: None,
            idle_timeout_secs: 900,
            resource_tier: ResourceTier::Small,
            created_at: chrono::Utc::now(),
        }
    }

    async fn test_engine() -> (SessionEngine, EnvironmentRow) {
        let db = Arc::new(Database::connect_memory().await.unwrap());
        let session_store = SessionStore::new(Arc::clone(&db));
        let environment_store = EnvironmentStore::new(Arc::clone(&db));
        let client_store = ClientStore::new(Arc::clone(&db));
        let secret_store = Arc::new(SecretStore::new(Arc::clone(&db), SecretKey::from_bytes([3u8; 32]), 1));
        let journal = Journal::new(Arc::new(InMemoryJournalStore::new()));
        let registry = Arc::new(ConnectionRegistry::new());

        let mut providers: HashMap<String, Arc<dyn SandboxProvider>> = HashMap::new();
        providers.insert(
            "local-process".into(),
            Arc::new(LocalProcessProvider::new(std::env::temp_dir(), "cat", Vec::new())),
        );
        let manager = Arc::new(SandboxManager::new(providers, session_store.clone(), secret_store));
        let broker = Arc::new(NativeToolBroker::new());

        let env = environment_store.create(new_env_row()).await.unwrap();

        let engine = SessionEngine::new(
            session_store,
            environment_store,
            client_store,
            journal,
            registry,
            manager,
            broker,
            Duration::from_secs(5),
            "ws://localhost:8787",
        );
        (engine, env)
    }

    #[tokio::test]
    async fn create_requires_repo_id_for_code_mode() {
        let (engine, env) = test_engine().await;
        let result = engine
            .create(CreateSessionParams {
                mode: Mode::Code,
                environment_id: env.id,
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(EngineError::RepoRequired)));
    }

    #[tokio::test]
    async fn create_then_activate_reaches_active_and_emits_connected() {
        let (engine, env) = test_engine().await;
        let row = engine
            .create(CreateSessionParams {
                mode: Mode::Chat,
                environment_id: env.id,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(row.status, SessionStatus::Creating);

        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let conn = ConnectionId::new();
        engine.registry.register(conn, tx).await;
        engine.registry.attach(conn, row.id).await;

        let activation = engine.activate(row.id, "client-1").await.unwrap();
        assert_eq!(activation.status, SessionStatus::Active);
        assert_eq!(activation.sandbox_status, SandboxStatus::Running);

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(event.event_type, "connected");
    }

    #[tokio::test]
    async fn prompt_without_activation_fails() {
        let (engine, env) = test_engine().await;
        let row = engine
            .create(CreateSessionParams {
                mode: Mode::Chat,
                environment_id: env.id,
                ..Default::default()
            })
            .await
            .unwrap();

        let result = engine.prompt(row.id, "hello").await;
        assert!(matches!(result, Err(EngineError::Sandbox(_))));
    }

    #[tokio::test]
    async fn archive_is_terminal_for_prompt_and_abort() {
        let (engine, env) = test_engine().await;
        let row = engine
            .create(CreateSessionParams {
                mode: Mode::Chat,
                environment_id: env.id,
                ..Default::default()
            })
            .await
            .unwrap();
        engine.activate(row.id, "client-1").await.unwrap();
        engine.archive(row.id).await.unwrap();

        let result = engine.prompt(row.id, "hello").await;
        assert!(matches!(result, Err(EngineError::ArchivedSessionImmutable(_))));
    }

    #[tokio::test]
    async fn archive_detaches_connections_from_the_registry() {
        let (engine, env) = test_engine().await;
        let row = engine
            .create(CreateSessionParams {
                mode: Mode::Chat,
                environment_id: env.id,
                ..Default::default()
            })
            .await
            .unwrap();

        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        let conn = ConnectionId::new();
        engine.registry.register(conn, tx).await;
        engine.registry.attach(conn, row.id).await;

        engine.activate(row.id, "client-1").await.unwrap();
        assert_eq!(engine.registry.attached_connections(row.id).await, vec![conn]);

        engine.archive(row.id).await.unwrap();
        assert!(engine.registry.attached_connections(row.id).await.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_row_and_journal() {
        let (engine, env) = test_engine().await;
        let row = engine
            .create(CreateSessionParams {
                mode: Mode::Chat,
                environment_id: env.id,
                ..Default::default()
            })
            .await
            .unwrap();
        engine.activate(row.id, "client-1").await.unwrap();
        engine.delete(row.id).await.unwrap();

        let result = engine.session_store.get(row.id).await;
        assert!(result.is_err());

        let (events, last_seq) = engine.journal.read_after(row.id, 0, 10).await.unwrap();
        assert!(events.is_empty());
        assert_eq!(last_seq, 0);
    }

    #[tokio::test]
    async fn available_models_falls_back_to_full_catalog_without_a_live_session() {
        let (engine, _env) = test_engine().await;
        let models = engine.available_models(None).await;
        assert!(models.iter().any(|m| m.provider == "anthropic"));
        assert!(models.iter().any(|m| m.provider == "openai"));
    }

    #[tokio::test]
    async fn available_models_scopes_to_session_provider_once_active() {
        let (engine, env) = test_engine().await;
        let row = engine
            .create(CreateSessionParams {
                mode: Mode::Chat,
                environment_id: env.id,
                model_provider: Some("openai".into()),
                model_id: Some("gpt-5".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        engine.activate(row.id, "client-1").await.unwrap();

        let models = engine.available_models(Some(row.id)).await;
        assert!(models.iter().all(|m| m.provider == "openai"));
        assert!(!models.is_empty());
    }
}
