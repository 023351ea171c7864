//! Component wiring: turns a loaded [`relay_config::Config`] into a bound
//! jsonrpsee server plus the background tasks that keep it running.
//!
//! Grounded on `astrid-gateway::server::startup::DaemonServer::start`'s
//! shape (resolve paths → load config → open stores → build providers →
//! bind server → start background loops → write pid/port files), collapsed
//! from a single in-process agent runtime to the relay's sandbox-provider
//! registry and session engine.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use jsonrpsee::server::{Server, ServerHandle};
use relay_config::Config;
use relay_engine::{IdleWatcher, IdleWatcherHandle, NativeToolBroker, SandboxManager, SessionEngine};
use relay_journal::Journal;
use relay_registry::ConnectionRegistry;
use relay_sandbox::{LocalProcessProvider, RemoteWorkerProvider, SandboxProvider};
use relay_server::{NullGithubClient, RelayRpcServer, RestFacade, RpcImpl, ServerState};
use relay_storage::{ClientStore, Database, EnvironmentStore, SecretKey, SecretStore, SessionStore};
use tracing::info;

use crate::error::{DaemonError, DaemonResult};
use crate::paths::DaemonPaths;

/// Everything `main` needs after a successful startup: the bound server
/// handle plus the facade/state for whichever HTTP layer an integrator
/// wires in front of it (out of scope here per spec §1), and the idle
/// watcher's lifetime guard.
pub struct Daemon {
    /// Listening address the jsonrpsee server bound to.
    pub addr: SocketAddr,
    /// The running jsonrpsee server handle.
    pub handle: ServerHandle,
    /// REST-surface facade, sharing the same collaborators as the RPC
    /// surface.
    pub facade: RestFacade,
    /// Guard that stops the idle-activity sweep when dropped.
    pub idle_watcher: IdleWatcherHandle,
}

/// Build every collaborator and bind the RPC server, but do not yet start
/// serving requests' background loops beyond the idle watcher (the caller
/// decides when to block on a shutdown signal).
///
/// # Errors
///
/// Returns [`DaemonError::Storage`] if the embedded database fails to open,
/// or [`DaemonError::ServerStart`] if the jsonrpsee server fails to bind.
pub async fn start(config: &Config, paths: &DaemonPaths) -> DaemonResult<Daemon> {
    let db_path = paths.db_dir();
    let db = Arc::new(Database::connect_embedded(db_path.to_string_lossy().as_ref()).await?);

    let session_store = SessionStore::new(Arc::clone(&db));
    let environment_store = EnvironmentStore::new(Arc::clone(&db));
    let client_store = ClientStore::new(Arc::clone(&db));
    let secret_store = Arc::new(SecretStore::new(
        Arc::clone(&db),
        SecretKey::from_bytes(*config.encryption_key.as_bytes()),
        config.encryption_key_version,
    ));

    let journal_store = relay_storage::SurrealJournalStore::new(Arc::clone(&db));
    let journal = Journal::new(Arc::new(journal_store));

    // The replay window (60s / 1000 events) is a fixed invariant of the
    // component contract, not a tunable; `config.server.replay_window_*`
    // exists for operators to confirm what's in effect, not to change it.
    let registry = Arc::new(ConnectionRegistry::new());

    let sessions_dir = paths.sessions_dir();
    let mut providers: HashMap<String, Arc<dyn SandboxProvider>> = HashMap::new();
    providers.insert(
        "local-process".to_string(),
        Arc::new(LocalProcessProvider::new(
            sessions_dir,
            config.sandbox.bridge_command.clone(),
            config.sandbox.bridge_args.clone(),
        )),
    );
    if let Some(worker_url) = &config.sandbox.remote_worker_url {
        providers.insert("remote-worker".to_string(), Arc::new(RemoteWorkerProvider::new(worker_url.clone())));
    }

    let manager = Arc::new(SandboxManager::new(providers, session_store.clone(), Arc::clone(&secret_store)));
    let broker = Arc::new(NativeToolBroker::new());

    let engine = SessionEngine::new(
        session_store.clone(),
        environment_store.clone(),
        client_store,
        journal.clone(),
        Arc::clone(&registry),
        Arc::clone(&manager),
        broker,
        Duration::from_secs(config.server.activation_timeout_secs),
        format!("ws://127.0.0.1:{}", config.server.port),
    );

    let state = Arc::new(ServerState::new(
        engine,
        Arc::clone(&registry),
        session_store.clone(),
        environment_store.clone(),
        secret_store,
        journal,
        Arc::new(NullGithubClient),
    ));

    let rpc_impl = RpcImpl::new(Arc::clone(&state));
    let facade = RestFacade::new(Arc::clone(&state));

    let bind_addr = format!("127.0.0.1:{}", config.server.port);
    let server = Server::builder()
        .build(&bind_addr)
        .await
        .map_err(|e| DaemonError::ServerStart(e.to_string()))?;
    let addr = server.local_addr().map_err(|e| DaemonError::ServerStart(e.to_string()))?;

    let handle = server.start(rpc_impl.into_rpc());

    std::fs::write(paths.pid_file(), std::process::id().to_string())
        .map_err(|source| DaemonError::StateFile { path: paths.pid_file(), source })?;
    std::fs::write(paths.port_file(), addr.port().to_string())
        .map_err(|source| DaemonError::StateFile { path: paths.port_file(), source })?;

    let idle_watcher = Arc::new(IdleWatcher::new(session_store, environment_store, registry, manager))
        .spawn(Duration::from_secs(config.server.idle_watcher_tick_secs));

    info!(addr = %addr, pid = std::process::id(), "relay daemon started");

    Ok(Daemon { addr, handle, facade, idle_watcher })
}
