//! Persistence for client registration rows.

use std::sync::Arc;

use chrono::Utc;
use relay_core::{ClientKind, SessionId};

use crate::db::Database;
use crate::error::{StorageError, StorageResult};
use crate::models::{ClientCapabilities, ClientRegistrationRow};

const TABLE: &str = "client_registration";

/// CRUD over [`ClientRegistrationRow`]s, keyed by `(session_id, client_id)`.
#[derive(Clone)]
pub struct ClientStore {
    db: Arc<Database>,
}

impl ClientStore {
    /// Wrap a database connection.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Register a client against a session, or update its capabilities if
    /// it is already registered (upsert on `(session_id, client_id)`).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a backend failure.
    pub async fn upsert(
        &self,
        session_id: SessionId,
        client_id: impl Into<String>,
        client_kind: ClientKind,
        capabilities: ClientCapabilities,
    ) -> StorageResult<ClientRegistrationRow> {
        let client_id = client_id.into();
        let record_id = format!("{session_id}:{client_id}");
        let row = ClientRegistrationRow {
            session_id,
            client_id,
            client_kind,
            capabilities,
            created_at: Utc::now(),
        };
        let updated: Option<ClientRegistrationRow> = self
            .db
            .client()
            .update((TABLE, record_id))
            .content(row)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        updated.ok_or_else(|| StorageError::Query("upsert returned no row".into()))
    }

    /// List every client registered against a session.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a backend failure.
    pub async fn list_for_session(&self, session_id: SessionId) -> StorageResult<Vec<ClientRegistrationRow>> {
        self.db
            .client()
            .query("SELECT * FROM type::table($tb) WHERE session_id = $sid")
            .bind(("tb", TABLE))
            .bind(("sid", session_id))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?
            .take(0)
            .map_err(|e| StorageError::Query(e.to_string()))
    }

    /// Remove a client's registration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a backend failure.
    pub async fn remove(&self, session_id: SessionId, client_id: &str) -> StorageResult<()> {
        let record_id = format!("{session_id}:{client_id}");
        let _: Option<ClientRegistrationRow> = self
            .db
            .client()
            .delete((TABLE, record_id))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_then_list_returns_latest_capabilities() {
        let db = Arc::new(Database::connect_memory().await.unwrap());
        let store = ClientStore::new(db);
        let session_id = SessionId::new();

        store
            .upsert(session_id, "c-1", ClientKind::Web, ClientCapabilities { native_tools: false })
            .await
            .unwrap();
        store
            .upsert(session_id, "c-1", ClientKind::Web, ClientCapabilities { native_tools: true })
            .await
            .unwrap();

        let clients = store.list_for_session(session_id).await.unwrap();
        assert_eq!(clients.len(), 1);
        assert!(clients[0].capabilities.native_tools);
    }

    #[tokio::test]
    async fn remove_drops_registration() {
        let db = Arc::new(Database::connect_memory().await.unwrap());
        let store = ClientStore::new(db);
        let session_id = SessionId::new();

        store
            .upsert(session_id, "c-1", ClientKind::Ios, ClientCapabilities::default())
            .await
            .unwrap();
        store.remove(session_id, "c-1").await.unwrap();

        let clients = store.list_for_session(session_id).await.unwrap();
        assert!(clients.is_empty());
    }
}
