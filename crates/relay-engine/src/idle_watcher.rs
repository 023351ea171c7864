//! Coarse timer that transitions idle sessions to `idle` and pauses their
//! sandboxes.
//!
//! One task per running [`SandboxManager`](crate::manager::SandboxManager),
//! not one per session: each tick it lists every `active` session, compares
//! `lastActivityAt` against its environment's idle timeout, and pauses the
//! ones with no attached connection. Grounded on
//! `astrid-gateway::server::monitoring::spawn_health_loop`'s
//! tick-and-sweep shape, adapted from a fixed interval to one clamped at the
//! 30s ceiling the component contract specifies.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use relay_core::SessionStatus;
use relay_registry::ConnectionRegistry;
use relay_storage::{EnvironmentStore, SessionStore};
use tracing::{debug, warn};

use crate::manager::SandboxManager;

const MAX_TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Guard that aborts the watcher's background task when dropped.
pub struct IdleWatcherHandle(tokio::task::JoinHandle<()>);

impl Drop for IdleWatcherHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Sweeps `active` sessions for inactivity and pauses their sandboxes.
pub struct IdleWatcher {
    session_store: SessionStore,
    environment_store: EnvironmentStore,
    registry: Arc<ConnectionRegistry>,
    manager: Arc<SandboxManager>,
}

impl IdleWatcher {
    /// Wire a watcher against the stores, registry, and manager it needs to
    /// sweep. Does not start ticking until [`Self::spawn`] is called.
    #[must_use]
    pub fn new(session_store: SessionStore, environment_store: EnvironmentStore, registry: Arc<ConnectionRegistry>, manager: Arc<SandboxManager>) -> Self {
        Self {
            session_store,
            environment_store,
            registry,
            manager,
        }
    }

    /// Spawn the sweep loop at `tick_interval`, clamped to the 30s ceiling.
    /// Returns a guard that aborts the task on drop.
    #[must_use]
    pub fn spawn(self: Arc<Self>, tick_interval: Duration) -> IdleWatcherHandle {
        let tick_interval = tick_interval.min(MAX_TICK_INTERVAL);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            loop {
                interval.tick().await;
                self.sweep_once().await;
            }
        });
        IdleWatcherHandle(handle)
    }

    /// Run a single sweep pass. Exposed directly so tests can drive it
    /// without waiting on a real timer.
    pub async fn sweep_once(&self) {
        let sessions = match self.session_store.list().await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(error = %e, "idle watcher failed to list sessions");
                return;
            }
        };

        for session in sessions {
            if session.status != SessionStatus::Active {
                continue;
            }
            if self.registry.has_attached_connections(session.id).await {
                continue;
            }

            let environment = match self.environment_store.get(session.environment_id).await {
                Ok(env) => env,
                Err(e) => {
                    warn!(session_id = %session.id, error = %e, "idle watcher could not load environment");
                    continue;
                }
            };

            let idle_for = Utc::now().signed_duration_since(session.last_activity_at);
            if idle_for.num_seconds() < environment.idle_timeout_secs as i64 {
                continue;
            }

            let Ok(handle) = self.manager.get_for_session(&session).await else {
                continue;
            };
            if !handle.capabilities().lossless_pause {
                continue;
            }

            debug!(session_id = %session.id, idle_secs = idle_for.num_seconds(), "pausing idle session");
            if let Err(e) = handle.pause().await {
                warn!(session_id = %session.id, error = %e, "failed to pause idle sandbox");
                continue;
            }
            if let Err(e) = self.session_store.set_status(session.id, SessionStatus::Idle).await {
                warn!(session_id = %session.id, error = %e, "failed to mark session idle");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;
    use relay_core::{Mode, ResourceTier};
    use relay_registry::ConnectionRegistry;
    use relay_sandbox::{LocalProcessProvider, SandboxProvider};
    use relay_storage::{Database, EnvironmentRow, SecretKey, SecretStore, SessionRow};

    use super::*;

    fn new_env_row() -> EnvironmentRow {
        EnvironmentRow {
            id: relay_core::EnvironmentId::new(),
            name: "default".into(),
            sandbox_type: "local-process".into(),
            image_reference: "ghcr.io/example/agent:latest".into(),
            worker_url: None,
            base_secret_ref: None,
            idle_timeout_secs: 900,
            resource_tier: ResourceTier::Small,
            created_at: Utc::now(),
        }
    }

    async fn test_db() -> Arc<Database> {
        Arc::new(Database::connect_memory().await.unwrap())
    }

    #[tokio::test]
    async fn sweep_ignores_sessions_with_attached_connections() {
        let db = test_db().await;
        let session_store = SessionStore::new(Arc::clone(&db));
        let environment_store = EnvironmentStore::new(Arc::clone(&db));
        let secret_store = Arc::new(SecretStore::new(Arc::clone(&db), SecretKey::from_bytes([7u8; 32]), 1));
        let registry = Arc::new(ConnectionRegistry::new());

        let mut env = new_env_row();
        env.idle_timeout_secs = 0;
        let env = environment_store.create(env).await.unwrap();

        let mut row = SessionRow::new_creating(Mode::Chat, env.id, None, "anthropic".into(), "claude".into(), None, false);
        row.status = SessionStatus::Active;
        row.last_activity_at = Utc::now() - chrono::Duration::hours(1);
        let row = session_store.create(row).await.unwrap();

        let conn = relay_core::ConnectionId::new();
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        registry.register(conn, tx).await;
        registry.attach(conn, row.id).await;

        let mut providers: HashMap<String, Arc<dyn SandboxProvider>> = HashMap::new();
        providers.insert(
            "local-process".into(),
            Arc::new(LocalProcessProvider::new(std::env::temp_dir(), "true", Vec::new())),
        );
        let manager = Arc::new(SandboxManager::new(providers, session_store.clone(), secret_store));

        let watcher = IdleWatcher::new(session_store.clone(), environment_store, registry, manager);
        watcher.sweep_once().await;

        let reloaded = session_store.get(row.id).await.unwrap();
        assert_eq!(reloaded.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn sweep_leaves_recently_active_sessions_alone() {
        let db = test_db().await;
        let session_store = SessionStore::new(Arc::clone(&db));
        let environment_store = EnvironmentStore::new(Arc::clone(&db));
        let secret_store = Arc::new(SecretStore::new(Arc::clone(&db), SecretKey::from_bytes([7u8; 32]), 1));
        let registry = Arc::new(ConnectionRegistry::new());

        let mut env = new_env_row();
        env.idle_timeout_secs = 3600;
        let env = environment_store.create(env).await.unwrap();

        let mut row = SessionRow::new_creating(Mode::Chat, env.id, None, "anthropic".into(), "claude".into(), None, false);
        row.status = SessionStatus::Active;
        let row = session_store.create(row).await.unwrap();

        let mut providers: HashMap<String, Arc<dyn SandboxProvider>> = HashMap::new();
        providers.insert(
            "local-process".into(),
            Arc::new(LocalProcessProvider::new(std::env::temp_dir(), "true", Vec::new())),
        );
        let manager = Arc::new(SandboxManager::new(providers, session_store.clone(), secret_store));

        let watcher = IdleWatcher::new(session_store.clone(), environment_store, registry, manager);
        watcher.sweep_once().await;

        let reloaded = session_store.get(row.id).await.unwrap();
        assert_eq!(reloaded.status, SessionStatus::Active);
    }
}
