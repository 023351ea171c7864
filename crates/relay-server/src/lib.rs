//! jsonrpsee RPC surface, wire types, and REST facade for the relay daemon.
//!
//! This is the only crate in the workspace that needs the full wire error
//! vocabulary (see [`error::ServerError`]): every lower crate's error maps
//! onto a [`relay_core::ErrorKind`], and this crate is what assembles those
//! into `{code, message}` pairs a client actually sees.

mod error;
mod facade;
mod github;
mod rpc;
mod rpc_impl;
mod state;
mod wire;

pub use error::{error_codes, ServerError, ServerResult};
pub use facade::RestFacade;
pub use github::{GithubClient, NullGithubClient};
pub use rpc::{RelayRpcClient, RelayRpcServer};
pub use rpc_impl::RpcImpl;
pub use state::ServerState;
pub use wire::*;

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use relay_core::{ClientKind, EnvironmentId, ResourceTier};
    use relay_engine::{NativeToolBroker, SandboxManager, SessionEngine};
    use relay_journal::{InMemoryJournalStore, Journal};
    use relay_registry::ConnectionRegistry;
    use relay_sandbox::{LocalProcessProvider, SandboxProvider};
    use relay_storage::{
        ClientCapabilities, ClientStore, Database, EnvironmentRow, EnvironmentStore, SecretKey,
        SecretStore, SessionStore,
    };

    use super::*;
    use crate::rpc::RelayRpcServer;
    use crate::wire::{HelloParams, SessionCreateParams};

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

    async fn test_rpc() -> (RpcImpl, EnvironmentRow) {
        let db = Arc::new(Database::connect_memory().await.unwrap());
        let session_store = SessionStore::new(Arc::clone(&db));
        let environment_store = EnvironmentStore::new(Arc::clone(&db));
        let client_store = ClientStore::new(Arc::clone(&db));
        let secret_store = Arc::new(SecretStore::new(Arc::clone(&db), SecretKey::from_bytes([7u8; 32]), 1));
        let journal = Journal::new(Arc::new(InMemoryJournalStore::new()));
        let registry = Arc::new(ConnectionRegistry::new());

        let mut providers: HashMap<String, Arc<dyn SandboxProvider>> = HashMap::new();
        providers.insert(
            "local-process".into(),
            Arc::new(LocalProcessProvider::new(std::env::temp_dir(), "cat", Vec::new())),
        );
        let manager = Arc::new(SandboxManager::new(providers, session_store.clone(), Arc::clone(&secret_store)));
        let broker = Arc::new(NativeToolBroker::new());

        let env = environment_store.create(new_env_row()).await.unwrap();

        let engine = SessionEngine::new(
            session_store.clone(),
            environment_store.clone(),
            client_store,
            journal.clone(),
            Arc::clone(&registry),
            manager,
            broker,
            Duration::from_secs(5),
            "ws://localhost:8787",
        );

        let state = Arc::new(ServerState::new(
            engine,
            registry,
            session_store,
            environment_store,
            secret_store,
            journal,
            Arc::new(NullGithubClient),
        ));
        (RpcImpl::new(state), env)
    }

    #[tokio::test]
    async fn hello_registers_a_connection() {
        let (rpc, _env) = test_rpc().await;
        let result = rpc
            .hello(HelloParams {
                client: ClientInfo { name: "test".into(), version: "0.0.0".into() },
                resume: None,
            })
            .await
            .unwrap();
        assert!(result.capabilities.resume);
    }

    #[tokio::test]
    async fn session_create_then_attach_reaches_active() {
        let (rpc, env) = test_rpc().await;
        let hello = rpc
            .hello(HelloParams {
                client: ClientInfo { name: "test".into(), version: "0.0.0".into() },
                resume: None,
            })
            .await
            .unwrap();

        let created = rpc
            .session_create(
                hello.connection_id,
                SessionCreateParams { environment_id: env.id, ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(created.session.status, relay_core::SessionStatus::Creating);

        let activation = rpc
            .session_attach(
                hello.connection_id,
                SessionAttachParams {
                    session_id: created.session.id,
                    client_id: "client-1".into(),
                    client_kind: ClientKind::Web,
                    capabilities: ClientCapabilities::default(),
                },
            )
            .await
            .unwrap();
        assert_eq!(activation.status, relay_core::SessionStatus::Active);
    }

    #[tokio::test]
    async fn native_tool_response_without_a_pending_call_is_a_no_op() {
        let (rpc, _env) = test_rpc().await;
        let result = rpc
            .native_tool_response(NativeToolResponseParams {
                call_id: uuid::Uuid::new_v4(),
                result: Some(serde_json::json!({"ok": true})),
                error: None,
            })
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn get_available_models_returns_full_catalog_without_a_session() {
        let (rpc, _env) = test_rpc().await;
        let models = rpc.get_available_models(None).await.unwrap();
        assert!(models.iter().any(|m| m.provider == "anthropic"));
        assert!(models.iter().any(|m| m.provider == "openai"));
    }

    #[tokio::test]
    async fn get_available_models_scopes_to_an_active_sessions_provider() {
        let (rpc, env) = test_rpc().await;
        let hello = rpc
            .hello(HelloParams {
                client: ClientInfo { name: "test".into(), version: "0.0.0".into() },
                resume: None,
            })
            .await
            .unwrap();

        let created = rpc
            .session_create(
                hello.connection_id,
                SessionCreateParams {
                    environment_id: env.id,
                    model_provider: Some("openai".into()),
                    model_id: Some("gpt-5".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        rpc.session_attach(
            hello.connection_id,
            SessionAttachParams {
                session_id: created.session.id,
                client_id: "client-1".into(),
                client_kind: ClientKind::Web,
                capabilities: ClientCapabilities::default(),
            },
        )
        .await
        .unwrap();

        let models = rpc.get_available_models(Some(created.session.id)).await.unwrap();
        assert!(!models.is_empty());
        assert!(models.iter().all(|m| m.provider == "openai"));
    }
}
