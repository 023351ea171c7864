//! Persistence for encrypted secret rows.
//!
//! The core only ever consumes the decrypted name→value mapping via
//! [`SecretStore::get_all_as_env`]; nothing downstream of this store ever
//! sees ciphertext or key material.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::db::Database;
use crate::error::{StorageError, StorageResult};
use crate::models::SecretRow;
use crate::secret_cipher::{seal, unseal, SecretKey};

const TABLE: &str = "secret";

/// CRUD plus decrypt-on-read over [`SecretRow`]s.
#[derive(Clone)]
pub struct SecretStore {
    db: Arc<Database>,
    key: SecretKey,
    key_version: u32,
}

impl SecretStore {
    /// Wrap a database connection and the active encryption key/version.
    #[must_use]
    pub fn new(db: Arc<Database>, key: SecretKey, key_version: u32) -> Self {
        Self { db, key, key_version }
    }

    /// Create a secret, encrypting `value` under the store's active key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a backend failure.
    pub async fn set(
        &self,
        name: impl Into<String>,
        env_var: impl Into<String>,
        kind: impl Into<String>,
        value: &str,
    ) -> StorageResult<SecretRow> {
        let (ciphertext, nonce) = seal(&self.key, self.key_version, value.as_bytes());
        let row = SecretRow {
            id: uuid::Uuid::new_v4(),
            name: name.into(),
            env_var: env_var.into(),
            kind: kind.into(),
            enabled: true,
            ciphertext,
            nonce,
            key_version: self.key_version,
            created_at: Utc::now(),
        };
        let created: Option<SecretRow> = self
            .db
            .client()
            .create((TABLE, row.id.to_string()))
            .content(row)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        created.ok_or_else(|| StorageError::Query("create returned no row".into()))
    }

    /// List every secret row (ciphertext still sealed).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a backend failure.
    pub async fn list(&self) -> StorageResult<Vec<SecretRow>> {
        self.db
            .client()
            .select(TABLE)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))
    }

    /// Enable or disable a secret without touching its ciphertext.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no row exists.
    pub async fn set_enabled(&self, id: uuid::Uuid, enabled: bool) -> StorageResult<SecretRow> {
        let updated: Option<SecretRow> = self
            .db
            .client()
            .query("UPDATE type::thing($tb, $id) SET enabled = $enabled RETURN AFTER")
            .bind(("tb", TABLE))
            .bind(("id", id.to_string()))
            .bind(("enabled", enabled))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?
            .take(0)
            .map_err(|e| StorageError::Query(e.to_string()))?;
        updated.ok_or_else(|| StorageError::NotFound(format!("secret {id}")))
    }

    /// Delete a secret.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a backend failure.
    pub async fn delete(&self, id: uuid::Uuid) -> StorageResult<()> {
        let _: Option<SecretRow> = self
            .db
            .client()
            .delete((TABLE, id.to_string()))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }

    /// Decrypt every enabled secret into an env-var name → value mapping,
    /// ready to hand to a sandbox provider at creation or resume time.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DecryptionFailed`] if any enabled secret
    /// fails to decrypt (e.g. its `key_version` predates the active key and
    /// no migration has re-encrypted it).
    pub async fn get_all_as_env(&self) -> StorageResult<HashMap<String, String>> {
        let rows = self.list().await?;
        let mut env = HashMap::new();
        for row in rows.into_iter().filter(|r| r.enabled) {
            let plaintext = unseal(&self.key, row.key_version, &row.ciphertext, &row.nonce)?;
            let value = String::from_utf8(plaintext)
                .map_err(|e| StorageError::DecryptionFailed(e.to_string()))?;
            env.insert(row.env_var, value);
        }
        Ok(env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(db: Arc<Database>) -> SecretStore {
        SecretStore::new(db, SecretKey::from_bytes([9u8; 32]), 1)
    }

    #[tokio::test]
    async fn set_then_get_all_as_env_decrypts() {
        let db = Arc::new(Database::connect_memory().await.unwrap());
        let store = store(db);

        store.set("GitHub token", "GITHUB_TOKEN", "token", "ghp_abc123").await.unwrap();
        let env = store.get_all_as_env().await.unwrap();

        assert_eq!(env.get("GITHUB_TOKEN").map(String::as_str), Some("ghp_abc123"));
    }

    #[tokio::test]
    async fn disabled_secrets_are_excluded() {
        let db = Arc::new(Database::connect_memory().await.unwrap());
        let store = store(db);

        let row = store.set("x", "X_TOKEN", "token", "value").await.unwrap();
        store.set_enabled(row.id, false).await.unwrap();

        let env = store.get_all_as_env().await.unwrap();
        assert!(!env.contains_key("X_TOKEN"));
    }

    #[tokio::test]
    async fn restart_with_same_key_still_decrypts() {
        let db = Arc::new(Database::connect_memory().await.unwrap());
        store(Arc::clone(&db)).set("x", "X_TOKEN", "token", "value").await.unwrap();

        // Simulate a fresh process: new SecretStore, same key, same db.
        let reopened = store(db);
        let env = reopened.get_all_as_env().await.unwrap();
        assert_eq!(env.get("X_TOKEN").map(String::as_str), Some("value"));
    }
}
