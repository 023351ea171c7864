//! Shared collaborators wired up once by the daemon binary and handed to
//! both the RPC surface and the REST facade.

use std::sync::Arc;

use relay_engine::SessionEngine;
use relay_journal::Journal;
use relay_registry::ConnectionRegistry;
use relay_storage::{EnvironmentStore, SecretStore, SessionStore};

use crate::github::GithubClient;

/// Everything a request needs to serve a relay operation.
///
/// `registry` is held separately from `engine` (which also holds one
/// internally) because connection lifecycle — `hello`, `resume`,
/// `subscribeEvents` — operates on connections before any session is
/// attached, a concern the engine's facade doesn't expose.
pub struct ServerState {
    /// Session lifecycle, sandbox orchestration, native tool bridging.
    pub engine: SessionEngine,
    /// Connection fan-out, shared with the engine's internal copy.
    pub registry: Arc<ConnectionRegistry>,
    /// Direct read access for `session.list` and the REST facade, which
    /// the engine's facade does not expose (it only models live sessions).
    pub session_store: SessionStore,
    /// Environment CRUD for the REST facade.
    pub environment_store: EnvironmentStore,
    /// Secret CRUD for the REST facade.
    pub secret_store: Arc<SecretStore>,
    /// Direct read access for `get_messages` and the REST facade's
    /// `events`/`history` endpoints, which the engine's facade does not
    /// expose (it only appends, through `prompt`/`abort`).
    pub journal: Journal,
    /// External collaborator for repository listing and token management.
    pub github: Arc<dyn GithubClient>,
}

impl ServerState {
    /// Wire up a state from its collaborators.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: SessionEngine,
        registry: Arc<ConnectionRegistry>,
        session_store: SessionStore,
        environment_store: EnvironmentStore,
        secret_store: Arc<SecretStore>,
        journal: Journal,
        github: Arc<dyn GithubClient>,
    ) -> Self {
        Self { engine, registry, session_store, environment_store, secret_store, journal, github }
    }
}
