//! REST facade (§6): typed async methods an HTTP layer can wire directly
//! into route handlers. HTTP wiring itself (the router, request
//! extraction) is out of scope here — every method below takes and
//! returns plain Rust values.

use std::sync::Arc;

use relay_core::{ClientKind, EnvironmentId, SessionId};
use relay_engine::{CreateSessionParams, ModelInfo};
use relay_storage::{ClientCapabilities, EnvironmentRow, SecretRow, SessionRow};

use crate::error::ServerResult;
use crate::state::ServerState;
use crate::wire::{
    ActivateResult, ExecOutcome, GetMessagesResult, MessageEvent, RepoSummary, SandboxProbe,
    SecretCreate, SecretSummary,
};

/// The REST-surface facade. Holds the same [`ServerState`] the RPC surface
/// does; this is a second view onto the same collaborators, not a second
/// set of them.
pub struct RestFacade {
    state: Arc<ServerState>,
}

impl RestFacade {
    /// Wrap a server state for facade dispatch.
    #[must_use]
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    /// `GET /health`.
    #[must_use]
    pub fn health(&self) -> bool {
        true
    }

    /// `POST /api/sessions`.
    pub async fn create_session(&self, params: CreateSessionParams) -> ServerResult<SessionRow> {
        Ok(self.state.engine.create(params).await?)
    }

    /// `GET /api/sessions`.
    pub async fn list_sessions(&self) -> ServerResult<Vec<SessionRow>> {
        Ok(self.state.session_store.list().await?)
    }

    /// `GET /api/sessions/:id`.
    pub async fn get_session(&self, session_id: SessionId) -> ServerResult<SessionRow> {
        Ok(self.state.session_store.get(session_id).await?)
    }

    /// `POST /api/sessions/:id/archive`.
    pub async fn archive_session(&self, session_id: SessionId) -> ServerResult<()> {
        Ok(self.state.engine.archive(session_id).await?)
    }

    /// `DELETE /api/sessions/:id`.
    pub async fn delete_session(&self, session_id: SessionId) -> ServerResult<()> {
        Ok(self.state.engine.delete(session_id).await?)
    }

    /// `POST /api/sessions/:id/activate`.
    pub async fn activate_session(
        &self,
        session_id: SessionId,
        client_id: impl Into<String>,
    ) -> ServerResult<ActivateResult> {
        Ok(self.state.engine.activate(session_id, client_id).await?.into())
    }

    /// `PUT /api/sessions/:id/clients/:clientId/capabilities`.
    pub async fn set_client_capabilities(
        &self,
        session_id: SessionId,
        client_id: impl Into<String>,
        client_kind: ClientKind,
        capabilities: ClientCapabilities,
    ) -> ServerResult<()> {
        // `facade` connections have no subscription, so there is no
        // connection id to record as a native-tool owner; a brand new one
        // is fine here since REST calls don't carry event fan-out anyway.
        let connection_id = relay_core::ConnectionId::new();
        Ok(self
            .state
            .engine
            .attach_client(connection_id, session_id, client_id, client_kind, capabilities)
            .await?)
    }

    /// `GET /api/sessions/:id/events?afterSeq=N&limit=M`.
    pub async fn get_events(
        &self,
        session_id: SessionId,
        after_seq: u64,
        limit: usize,
    ) -> ServerResult<GetMessagesResult> {
        let (events, last_seq) = self.state.journal.read_after(session_id, after_seq, limit).await?;
        Ok(GetMessagesResult { events: events.into_iter().map(MessageEvent::from).collect(), last_seq })
    }

    /// `GET /api/sessions/:id/history`: the full event history, oldest
    /// first, with no upper bound.
    pub async fn get_history(&self, session_id: SessionId) -> ServerResult<Vec<MessageEvent>> {
        let (events, _) = self.state.journal.read_after(session_id, 0, usize::MAX).await?;
        Ok(events.into_iter().map(MessageEvent::from).collect())
    }

    /// `POST /api/sessions/:id/exec`.
    pub async fn exec(&self, session_id: SessionId, command: impl Into<String>) -> ServerResult<ExecOutcome> {
        Ok(self.state.engine.exec(session_id, command).await?.into())
    }

    /// `GET /api/sessions/:id/sandbox`.
    pub async fn sandbox_probe(&self, session_id: SessionId) -> ServerResult<SandboxProbe> {
        let (status, capabilities) = self.state.engine.sandbox_probe(session_id).await?;
        Ok(SandboxProbe { status, capabilities })
    }

    /// `GET /api/environments`.
    pub async fn list_environments(&self) -> ServerResult<Vec<EnvironmentRow>> {
        Ok(self.state.environment_store.list().await?)
    }

    /// `GET /api/environments/:id`.
    pub async fn get_environment(&self, environment_id: EnvironmentId) -> ServerResult<EnvironmentRow> {
        Ok(self.state.environment_store.get(environment_id).await?)
    }

    /// `POST /api/environments`.
    pub async fn create_environment(&self, row: EnvironmentRow) -> ServerResult<EnvironmentRow> {
        Ok(self.state.environment_store.create(row).await?)
    }

    /// `PUT /api/environments/:id`.
    pub async fn update_environment(
        &self,
        environment_id: EnvironmentId,
        row: EnvironmentRow,
    ) -> ServerResult<EnvironmentRow> {
        Ok(self.state.environment_store.update(environment_id, row).await?)
    }

    /// `DELETE /api/environments/:id`.
    pub async fn delete_environment(&self, environment_id: EnvironmentId) -> ServerResult<()> {
        Ok(self.state.environment_store.delete(environment_id).await?)
    }

    /// `GET /api/github/repos`.
    pub async fn list_repos(&self) -> ServerResult<Vec<RepoSummary>> {
        self.state.github.list_repos().await
    }

    /// `GET /api/github/token`: the token's display hint, if one is set.
    pub async fn get_github_token_hint(&self) -> ServerResult<Option<String>> {
        self.state.github.token_hint().await
    }

    /// `POST /api/github/token`.
    pub async fn set_github_token(&self, token: &str) -> ServerResult<()> {
        self.state.github.set_token(token).await
    }

    /// `DELETE /api/github/token`.
    pub async fn delete_github_token(&self) -> ServerResult<()> {
        self.state.github.delete_token().await
    }

    /// `GET /api/models?sessionId=`. Scoped to the named session's current
    /// model provider if it's live, or the full static catalog otherwise.
    pub async fn list_models(&self, session_id: Option<SessionId>) -> Vec<ModelInfo> {
        self.state.engine.available_models(session_id).await
    }

    /// `GET /api/secrets`: metadata only, never ciphertext.
    pub async fn list_secrets(&self) -> ServerResult<Vec<SecretSummary>> {
        let rows: Vec<SecretRow> = self.state.secret_store.list().await?;
        Ok(rows.into_iter().map(SecretSummary::from).collect())
    }

    /// `PUT /api/secrets`: create or replace a secret.
    pub async fn put_secret(&self, create: SecretCreate) -> ServerResult<SecretSummary> {
        let row = self
            .state
            .secret_store
            .set(create.name, create.env_var, create.kind, &create.value)
            .await?;
        Ok(row.into())
    }

    /// `DELETE /api/secrets/:id`.
    pub async fn delete_secret(&self, secret_id: uuid::Uuid) -> ServerResult<()> {
        Ok(self.state.secret_store.delete(secret_id).await?)
    }
}
