//! JSON-RPC API definition for the client-session protocol (§4.9).
//!
//! Uses `jsonrpsee` proc macros to define the interface; [`crate::rpc_impl::RpcImpl`]
//! implements the server side.

use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObjectOwned;
use relay_core::{ClientKind, ConnectionId, SessionId};

use crate::wire::{
    ActivateResult, CreatedSession, GetMessagesParams, GetMessagesResult, HelloParams,
    HelloResult, NativeToolResponseParams, PromptParams, ResumeParams, SessionAttachParams,
    SessionCreateParams, SessionState, SetModelParams,
};

#[rpc(server, client, namespace = "relay")]
pub trait RelayRpc {
    /// First call on a new connection. Assigns a `connectionId` and, if
    /// `resume` is present, re-attaches the named prior connection's
    /// sessions and queues replay events ahead of `subscribeEvents`.
    #[method(name = "hello")]
    async fn hello(&self, params: HelloParams) -> Result<HelloResult, ErrorObjectOwned>;

    /// Re-establish a dropped connection's session attachments without a
    /// full `hello`. Equivalent to `hello` with only `resume` populated.
    #[method(name = "resume")]
    async fn resume(&self, params: ResumeParams) -> Result<HelloResult, ErrorObjectOwned>;

    /// List repositories the GitHub collaborator can see.
    #[method(name = "repos.list")]
    async fn repos_list(&self) -> Result<Vec<crate::wire::RepoSummary>, ErrorObjectOwned>;

    /// Create a session under an environment.
    #[method(name = "session.create")]
    async fn session_create(
        &self,
        connection_id: ConnectionId,
        params: SessionCreateParams,
    ) -> Result<CreatedSession, ErrorObjectOwned>;

    /// List sessions, newest first.
    #[method(name = "session.list")]
    async fn session_list(&self) -> Result<Vec<relay_storage::SessionRow>, ErrorObjectOwned>;

    /// Attach a client to a session, registering it with the connection and
    /// recording its declared capabilities.
    #[method(name = "session.attach")]
    async fn session_attach(
        &self,
        connection_id: ConnectionId,
        params: SessionAttachParams,
    ) -> Result<ActivateResult, ErrorObjectOwned>;

    /// Archive and tear down a session's live state permanently.
    #[method(name = "session.delete")]
    async fn session_delete(&self, session_id: SessionId) -> Result<(), ErrorObjectOwned>;

    /// Send a user message into a session's agent loop.
    #[method(name = "prompt")]
    async fn prompt(&self, params: PromptParams) -> Result<(), ErrorObjectOwned>;

    /// Cancel the session's in-flight agent turn, if any.
    #[method(name = "abort")]
    async fn abort(&self, session_id: SessionId) -> Result<(), ErrorObjectOwned>;

    /// Fetch a session's current row plus a live sandbox probe.
    #[method(name = "get_state")]
    async fn get_state(&self, session_id: SessionId) -> Result<SessionState, ErrorObjectOwned>;

    /// Fetch journaled events after a cursor.
    #[method(name = "get_messages")]
    async fn get_messages(
        &self,
        params: GetMessagesParams,
    ) -> Result<GetMessagesResult, ErrorObjectOwned>;

    /// List models available across configured providers. When
    /// `session_id` names a live session, the result is scoped to that
    /// session's current model provider; otherwise it's the full static
    /// catalog (see `SessionEngine::available_models`).
    #[method(name = "get_available_models")]
    async fn get_available_models(
        &self,
        session_id: Option<SessionId>,
    ) -> Result<Vec<relay_engine::ModelInfo>, ErrorObjectOwned>;

    /// Change a session's model.
    #[method(name = "set_model")]
    async fn set_model(&self, params: SetModelParams) -> Result<(), ErrorObjectOwned>;

    /// Resolve a native tool call previously delivered via the
    /// `native_tool_request` event.
    #[method(name = "native_tool_response")]
    async fn native_tool_response(
        &self,
        params: NativeToolResponseParams,
    ) -> Result<(), ErrorObjectOwned>;

    /// Update a connection's declared client kind/capabilities after
    /// attach, without re-attaching. `connection_id` must be the caller's
    /// own id from `hello`/`resume`, so a native-tools capability flip
    /// hands ownership to a connection the registry actually knows about.
    #[method(name = "session.set_capabilities")]
    async fn session_set_capabilities(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
        client_id: String,
        client_kind: ClientKind,
        capabilities: relay_storage::ClientCapabilities,
    ) -> Result<(), ErrorObjectOwned>;

    /// Subscribe to this connection's event stream. Must follow a `hello`
    /// or `resume` call on the same connection.
    #[subscription(name = "subscribeEvents" => "event", unsubscribe = "unsubscribeEvents", item = relay_registry::ServerEvent)]
    async fn subscribe_events(
        &self,
        connection_id: ConnectionId,
    ) -> jsonrpsee::core::SubscriptionResult;
}
