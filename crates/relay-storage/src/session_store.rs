//! Transactional persistence for session rows.

use std::sync::Arc;

use chrono::Utc;
use relay_core::{EnvironmentId, SessionId, SessionStatus};

use crate::db::Database;
use crate::error::{StorageError, StorageResult};
use crate::models::SessionRow;

const TABLE: &str = "session";

/// Persistence for [`SessionRow`]s.
///
/// The session row is, per the data model, the single synchronization point
/// for status transitions: every mutating method here either no-ops or
/// fails outright against an `archived` row rather than silently applying
/// a change the row's own invariants forbid.
#[derive(Clone)]
pub struct SessionStore {
    db: Arc<Database>,
}

impl SessionStore {
    /// Wrap a database connection.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new session row, transactionally, before any sandbox side
    /// effect is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] if the insert fails.
    pub async fn create(&self, row: SessionRow) -> StorageResult<SessionRow> {
        let id = row.id.to_string();
        let created: Option<SessionRow> = self
            .db
            .client()
            .create((TABLE, id))
            .content(row)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        created.ok_or_else(|| StorageError::Query("create returned no row".into()))
    }

    /// Fetch a session row by id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no row exists, or
    /// [`StorageError::Query`] on a backend failure.
    pub async fn get(&self, id: SessionId) -> StorageResult<SessionRow> {
        let row: Option<SessionRow> = self
            .db
            .client()
            .select((TABLE, id.to_string()))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        row.ok_or_else(|| StorageError::NotFound(format!("session {id}")))
    }

    /// List every session row.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a backend failure.
    pub async fn list(&self) -> StorageResult<Vec<SessionRow>> {
        self.db
            .client()
            .select(TABLE)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))
    }

    /// Transition `id`'s status, rejecting the write if the row is already
    /// `archived` (terminal per the invariant in §3 of the spec).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidTransition`] if the row is archived,
    /// [`StorageError::NotFound`] if the row doesn't exist, or
    /// [`StorageError::Query`] on a backend failure.
    pub async fn set_status(&self, id: SessionId, status: SessionStatus) -> StorageResult<SessionRow> {
        let current = self.get(id).await?;
        if current.status.is_terminal() {
            return Err(StorageError::InvalidTransition(format!(
                "session {id} is archived; cannot transition to {status:?}"
            )));
        }

        let mut updated: Option<SessionRow> = self
            .db
            .client()
            .query("UPDATE type::thing($tb, $id) SET status = $status WHERE status != 'archived' RETURN AFTER")
            .bind(("tb", TABLE))
            .bind(("id", id.to_string()))
            .bind(("status", status))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?
            .take(0)
            .map_err(|e| StorageError::Query(e.to_string()))?;

        updated.take().ok_or_else(|| StorageError::InvalidTransition(format!("session {id} rejected status write")))
    }

    /// Record a sandbox's provider key/id/image digest after creation, and
    /// promote to `active` in the same write.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a backend failure, or
    /// [`StorageError::NotFound`] if the row doesn't exist.
    pub async fn set_sandbox(
        &self,
        id: SessionId,
        provider_key: impl Into<String>,
        provider_id: impl Into<String>,
        image_digest: impl Into<String>,
    ) -> StorageResult<SessionRow> {
        let updated: Option<SessionRow> = self
            .db
            .client()
            .query(
                "UPDATE type::thing($tb, $id) SET \
                 sandbox_provider_key = $key, \
                 sandbox_provider_id = $pid, \
                 image_digest = $digest, \
                 status = 'active' \
                 RETURN AFTER",
            )
            .bind(("tb", TABLE))
            .bind(("id", id.to_string()))
            .bind(("key", provider_key.into()))
            .bind(("pid", provider_id.into()))
            .bind(("digest", image_digest.into()))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?
            .take(0)
            .map_err(|e| StorageError::Query(e.to_string()))?;

        updated.ok_or_else(|| StorageError::NotFound(format!("session {id}")))
    }

    /// Change which model a session targets.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidTransition`] if the row is archived,
    /// [`StorageError::NotFound`] if the row doesn't exist, or
    /// [`StorageError::Query`] on a backend failure.
    pub async fn set_model(&self, id: SessionId, model_provider: impl Into<String>, model_id: impl Into<String>) -> StorageResult<SessionRow> {
        let current = self.get(id).await?;
        if current.status.is_terminal() {
            return Err(StorageError::InvalidTransition(format!("session {id} is archived; cannot change model")));
        }

        let updated: Option<SessionRow> = self
            .db
            .client()
            .query("UPDATE type::thing($tb, $id) SET model_provider = $provider, model_id = $model WHERE status != 'archived' RETURN AFTER")
            .bind(("tb", TABLE))
            .bind(("id", id.to_string()))
            .bind(("provider", model_provider.into()))
            .bind(("model", model_id.into()))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?
            .take(0)
            .map_err(|e| StorageError::Query(e.to_string()))?;

        updated.ok_or_else(|| StorageError::InvalidTransition(format!("session {id} rejected model write")))
    }

    /// Clear the sandbox provider id, e.g. after `terminate()`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a backend failure.
    pub async fn clear_sandbox_id(&self, id: SessionId) -> StorageResult<()> {
        self.db
            .client()
            .query("UPDATE type::thing($tb, $id) SET sandbox_provider_id = NONE")
            .bind(("tb", TABLE))
            .bind(("id", id.to_string()))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }

    /// Set `first_user_message` if not already set, and bump
    /// `last_activity_at`. Idempotent: subsequent prompts only touch
    /// activity.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a backend failure.
    pub async fn record_prompt(&self, id: SessionId, message: &str) -> StorageResult<()> {
        self.db
            .client()
            .query(
                "UPDATE type::thing($tb, $id) SET \
                 first_user_message = (IF first_user_message = NONE THEN $msg ELSE first_user_message END), \
                 last_activity_at = $now",
            )
            .bind(("tb", TABLE))
            .bind(("id", id.to_string()))
            .bind(("msg", message.to_string()))
            .bind(("now", Utc::now()))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }

    /// Bump `last_activity_at` to now.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a backend failure.
    pub async fn touch_activity(&self, id: SessionId) -> StorageResult<()> {
        self.db
            .client()
            .query("UPDATE type::thing($tb, $id) SET last_activity_at = $now")
            .bind(("tb", TABLE))
            .bind(("id", id.to_string()))
            .bind(("now", Utc::now()))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }

    /// List session ids whose environment matches `environment_id` and
    /// whose status is `active`, for the Idle Watcher's sweep.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a backend failure.
    pub async fn list_active_for_environment(&self, environment_id: EnvironmentId) -> StorageResult<Vec<SessionRow>> {
        self.db
            .client()
            .query("SELECT * FROM type::table($tb) WHERE status = 'active' AND environment_id = $env")
            .bind(("tb", TABLE))
            .bind(("env", environment_id))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?
            .take(0)
            .map_err(|e| StorageError::Query(e.to_string()))
    }

    /// Hard-delete a session row. Irreversible; callers must have already
    /// deleted the journaled events for this session.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a backend failure.
    pub async fn delete(&self, id: SessionId) -> StorageResult<()> {
        let _: Option<SessionRow> = self
            .db
            .client()
            .delete((TABLE, id.to_string()))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::Mode;

    async fn store() -> SessionStore {
        let db = Database::connect_memory().await.unwrap();
        SessionStore::new(Arc::new(db))
    }

    fn new_row() -> SessionRow {
        SessionRow::new_creating(
            Mode::Chat,
            EnvironmentId::new(),
            None,
            "anthropic".into(),
            "claude-default".into(),
            None,
            false,
        )
    }

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let store = store().await;
        let row = new_row();
        let id = row.id;
        store.create(row).await.unwrap();

        let fetched = store.get(id).await.unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.status, SessionStatus::Creating);
    }

    #[tokio::test]
    async fn archived_rejects_further_transitions() {
        let store = store().await;
        let row = new_row();
        let id = row.id;
        store.create(row).await.unwrap();

        store.set_status(id, SessionStatus::Active).await.unwrap();
        store.set_status(id, SessionStatus::Archived).await.unwrap();

        let result = store.set_status(id, SessionStatus::Idle).await;
        assert!(matches!(result, Err(StorageError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn record_prompt_sets_first_user_message_once() {
        let store = store().await;
        let row = new_row();
        let id = row.id;
        store.create(row).await.unwrap();

        store.record_prompt(id, "hello").await.unwrap();
        store.record_prompt(id, "second message").await.unwrap();

        let fetched = store.get(id).await.unwrap();
        assert_eq!(fetched.first_user_message.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn set_model_updates_provider_and_id_but_not_after_archive() {
        let store = store().await;
        let row = new_row();
        let id = row.id;
        store.create(row).await.unwrap();

        let updated = store.set_model(id, "openai", "gpt-5").await.unwrap();
        assert_eq!(updated.model_provider, "openai");
        assert_eq!(updated.model_id, "gpt-5");

        store.set_status(id, SessionStatus::Archived).await.unwrap();
        let result = store.set_model(id, "anthropic", "claude-opus-4").await;
        assert!(matches!(result, Err(StorageError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let store = store().await;
        let row = new_row();
        let id = row.id;
        store.create(row).await.unwrap();

        store.delete(id).await.unwrap();
        let result = store.get(id).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }
}
