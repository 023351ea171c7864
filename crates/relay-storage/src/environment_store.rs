//! Persistence for environment configuration rows.

use std::sync::Arc;

use relay_core::EnvironmentId;

use crate::db::Database;
use crate::error::{StorageError, StorageResult};
use crate::models::EnvironmentRow;

const TABLE: &str = "environment";

/// CRUD over [`EnvironmentRow`]s.
#[derive(Clone)]
pub struct EnvironmentStore {
    db: Arc<Database>,
}

impl EnvironmentStore {
    /// Wrap a database connection.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create an environment row.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a backend failure.
    pub async fn create(&self, row: EnvironmentRow) -> StorageResult<EnvironmentRow> {
        let id = row.id.to_string();
        let created: Option<EnvironmentRow> = self
            .db
            .client()
            .create((TABLE, id))
            .content(row)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        created.ok_or_else(|| StorageError::Query("create returned no row".into()))
    }

    /// Fetch an environment row by id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no row exists.
    pub async fn get(&self, id: EnvironmentId) -> StorageResult<EnvironmentRow> {
        let row: Option<EnvironmentRow> = self
            .db
            .client()
            .select((TABLE, id.to_string()))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        row.ok_or_else(|| StorageError::NotFound(format!("environment {id}")))
    }

    /// List every environment row.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a backend failure.
    pub async fn list(&self) -> StorageResult<Vec<EnvironmentRow>> {
        self.db
            .client()
            .select(TABLE)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))
    }

    /// Replace an environment row wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no row exists to update.
    pub async fn update(&self, id: EnvironmentId, row: EnvironmentRow) -> StorageResult<EnvironmentRow> {
        let updated: Option<EnvironmentRow> = self
            .db
            .client()
            .update((TABLE, id.to_string()))
            .content(row)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        updated.ok_or_else(|| StorageError::NotFound(format!("environment {id}")))
    }

    /// Delete an environment row.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a backend failure.
    pub async fn delete(&self, id: EnvironmentId) -> StorageResult<()> {
        let _: Option<EnvironmentRow> = self
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
    use chrono::Utc;
    use relay_core::ResourceTier;

    fn new_row() -> EnvironmentRow {
        EnvironmentRow {
            id: EnvironmentId::new(),
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

    #[tokio::test]
    async fn create_get_delete_round_trips() {
        let db = Arc::new(Database::connect_memory().await.unwrap());
        let store = EnvironmentStore::new(db);

        let row = new_row();
        let id = row.id;
        store.create(row).await.unwrap();

        let fetched = store.get(id).await.unwrap();
        assert_eq!(fetched.name, "default");

        store.delete(id).await.unwrap();
        assert!(store.get(id).await.is_err());
    }
}
