//! [`RpcImpl`]: the server side of [`crate::rpc::RelayRpcServer`].
//!
//! Every method here is a thin delegation to [`crate::state::ServerState`]'s
//! collaborators, following the teacher's `RpcImpl`-delegates-to-submodules
//! shape collapsed into one module since this surface is a fraction of the
//! teacher's size.
//!
//! `hello`/`resume` and `subscribeEvents` are split across two calls because
//! `ConnectionRegistry` hands out one [`relay_registry::EventSink`] per
//! connection at `register`/`resume` time, but only a `#[subscription]`
//! method can accept a jsonrpsee `PendingSubscriptionSink`. `hello` creates
//! the channel and registers it immediately (so replayed/buffered events
//! queue up even before the client subscribes), stashing the receiving half
//! in `pending_receivers` keyed by the connection id it just minted;
//! `subscribeEvents` claims that receiver and forwards it into the
//! subscription sink.

use std::collections::HashMap;
use std::sync::Arc;

use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::{PendingSubscriptionSink, SubscriptionMessage};
use relay_core::{ConnectionId, SessionId};
use relay_engine::{CreateSessionParams, ToolCallOutcome};
use relay_registry::ServerEvent;
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use crate::error::ServerError;
use crate::rpc::RelayRpcServer;
use crate::state::ServerState;
use crate::wire::{
    ActivateResult, ClientInfo, CreatedSession, GetMessagesParams, GetMessagesResult, HelloParams,
    HelloResult, MessageEvent, NativeToolResponseParams, PromptParams, ResumeParams,
    ServerCapabilities, SessionAttachParams, SessionCreateParams, SessionState, SetModelParams,
};

/// Bound on each connection's outbound event channel. Matches the size the
/// registry itself uses in its own tests; a connection this far behind is
/// already past the point where buffering further helps it.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The replay buffer's retention window, advertised to clients via `hello`.
/// Kept in sync with `relay_registry::replay::REPLAY_WINDOW` by hand since
/// that constant isn't part of the registry's public surface.
const REPLAY_WINDOW_SECS: u64 = 60;

/// Implements [`crate::rpc::RelayRpcServer`] against a shared [`ServerState`].
pub struct RpcImpl {
    state: Arc<ServerState>,
    pending_receivers: Mutex<HashMap<ConnectionId, mpsc::Receiver<ServerEvent>>>,
}

impl RpcImpl {
    /// Wrap a server state for RPC dispatch.
    #[must_use]
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state, pending_receivers: Mutex::new(HashMap::new()) }
    }

    async fn begin_connection(
        &self,
        resume: Option<ResumeParams>,
    ) -> ConnectionId {
        let connection_id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        match resume {
            Some(resume) => {
                self.state
                    .registry
                    .resume(resume.connection_id, connection_id, tx, &resume.last_seq_by_session)
                    .await;
            }
            None => {
                self.state.registry.register(connection_id, tx).await;
            }
        }
        self.pending_receivers.lock().await.insert(connection_id, rx);
        connection_id
    }

    fn hello_result(connection_id: ConnectionId) -> HelloResult {
        HelloResult {
            connection_id,
            server_info: ClientInfo {
                name: "relay".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: ServerCapabilities { resume: true, replay_window_sec: REPLAY_WINDOW_SECS },
        }
    }
}

#[jsonrpsee::core::async_trait]
impl RelayRpcServer for RpcImpl {
    async fn hello(&self, params: HelloParams) -> Result<HelloResult, ErrorObjectOwned> {
        let connection_id = self.begin_connection(params.resume).await;
        Ok(Self::hello_result(connection_id))
    }

    async fn resume(&self, params: ResumeParams) -> Result<HelloResult, ErrorObjectOwned> {
        let connection_id = self.begin_connection(Some(params)).await;
        Ok(Self::hello_result(connection_id))
    }

    async fn repos_list(&self) -> Result<Vec<crate::wire::RepoSummary>, ErrorObjectOwned> {
        Ok(self.state.github.list_repos().await?)
    }

    async fn session_create(
        &self,
        connection_id: ConnectionId,
        params: SessionCreateParams,
    ) -> Result<CreatedSession, ErrorObjectOwned> {
        let _ = connection_id;
        let session = self
            .state
            .engine
            .create(CreateSessionParams {
                mode: params.mode,
                environment_id: params.environment_id,
                repo_id: params.repo_id,
                repo_full_name: params.repo_full_name,
                branch_name: params.branch_name,
                model_provider: params.model_provider,
                model_id: params.model_id,
                system_prompt: params.system_prompt,
                native_tools: params.native_tools_enabled,
            })
            .await
            .map_err(ServerError::from)?;
        // Not yet activated: the endpoint only resolves to a live handle
        // once `session.attach`/`activate` succeeds.
        let ws_endpoint = format!("/sessions/{}", session.id);
        Ok(CreatedSession { session, ws_endpoint })
    }

    async fn session_list(&self) -> Result<Vec<relay_storage::SessionRow>, ErrorObjectOwned> {
        Ok(self.state.session_store.list().await.map_err(ServerError::from)?)
    }

    async fn session_attach(
        &self,
        connection_id: ConnectionId,
        params: SessionAttachParams,
    ) -> Result<ActivateResult, ErrorObjectOwned> {
        self.state
            .engine
            .attach_client(
                connection_id,
                params.session_id,
                params.client_id.clone(),
                params.client_kind,
                params.capabilities,
            )
            .await
            .map_err(ServerError::from)?;
        let activation = self
            .state
            .engine
            .activate(params.session_id, params.client_id)
            .await
            .map_err(ServerError::from)?;
        Ok(activation.into())
    }

    async fn session_delete(&self, session_id: SessionId) -> Result<(), ErrorObjectOwned> {
        Ok(self.state.engine.delete(session_id).await.map_err(ServerError::from)?)
    }

    async fn prompt(&self, params: PromptParams) -> Result<(), ErrorObjectOwned> {
        Ok(self
            .state
            .engine
            .prompt(params.session_id, params.message)
            .await
            .map_err(ServerError::from)?)
    }

    async fn abort(&self, session_id: SessionId) -> Result<(), ErrorObjectOwned> {
        Ok(self.state.engine.abort(session_id).await.map_err(ServerError::from)?)
    }

    async fn get_state(&self, session_id: SessionId) -> Result<SessionState, ErrorObjectOwned> {
        let session = self
            .state
            .session_store
            .get(session_id)
            .await
            .map_err(ServerError::from)?;
        let probe = self.state.engine.sandbox_probe(session_id).await.ok();
        let sandbox_status = probe.map(|(status, _)| status);
        let capabilities = probe.map(|(_, capabilities)| capabilities);
        Ok(SessionState { session, sandbox_status, capabilities })
    }

    async fn get_messages(
        &self,
        params: GetMessagesParams,
    ) -> Result<GetMessagesResult, ErrorObjectOwned> {
        let (events, last_seq) = self
            .state
            .journal
            .read_after(params.session_id, params.after_seq, params.limit)
            .await
            .map_err(ServerError::from)?;
        Ok(GetMessagesResult { events: events.into_iter().map(MessageEvent::from).collect(), last_seq })
    }

    async fn get_available_models(&self, session_id: Option<SessionId>) -> Result<Vec<relay_engine::ModelInfo>, ErrorObjectOwned> {
        Ok(self.state.engine.available_models(session_id).await)
    }

    async fn set_model(&self, params: SetModelParams) -> Result<(), ErrorObjectOwned> {
        self.state
            .engine
            .set_model(params.session_id, params.model_provider, params.model_id)
            .await
            .map_err(ServerError::from)?;
        Ok(())
    }

    async fn native_tool_response(
        &self,
        params: NativeToolResponseParams,
    ) -> Result<(), ErrorObjectOwned> {
        let outcome = match (params.result, params.error) {
            (Some(result), _) => ToolCallOutcome::Result(result),
            (None, Some(error)) => ToolCallOutcome::Error(error),
            (None, None) => ToolCallOutcome::Error("empty native tool response".to_string()),
        };
        self.state.engine.respond_native_tool(params.call_id, outcome).await;
        Ok(())
    }

    async fn session_set_capabilities(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
        client_id: String,
        client_kind: relay_core::ClientKind,
        capabilities: relay_storage::ClientCapabilities,
    ) -> Result<(), ErrorObjectOwned> {
        self.state
            .engine
            .attach_client(connection_id, session_id, client_id, client_kind, capabilities)
            .await
            .map_err(ServerError::from)?;
        Ok(())
    }

    async fn subscribe_events(
        &self,
        pending: PendingSubscriptionSink,
        connection_id: ConnectionId,
    ) -> jsonrpsee::core::SubscriptionResult {
        let receiver = self.pending_receivers.lock().await.remove(&connection_id);
        let Some(mut receiver) = receiver else {
            return Err(jsonrpsee::core::StringError::from(format!(
                "no pending subscription for connection {connection_id}"
            )));
        };

        let sink = pending.accept().await?;
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                match SubscriptionMessage::from_json(&event) {
                    Ok(msg) => {
                        if sink.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to serialize event"),
                }
            }
        });

        Ok(())
    }
}
