//! `SurrealDB` connection wrapper.
//!
//! # Connection strings
//!
//! | Mode | Connection | Backend |
//! |------|-----------|---------|
//! | Embedded (prod) | `surrealkv://<state_dir>/db` | `SurrealKV` |
//! | Embedded (test) | `mem://` | In-memory |

use crate::error::{StorageError, StorageResult};

/// `SurrealDB` connection, namespaced to the relay's own `ns`/`db` pair.
pub struct Database {
    inner: surrealdb::Surreal<surrealdb::engine::any::Any>,
}

impl Database {
    /// Connect to an embedded `SurrealKV`-backed database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the connection fails.
    pub async fn connect_embedded(path: &str) -> StorageResult<Self> {
        let endpoint = format!("surrealkv://{path}");
        Self::connect(&endpoint).await
    }

    /// Connect to an in-memory database. Used by tests and the local-process
    /// sandbox backend's development mode.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the connection fails.
    pub async fn connect_memory() -> StorageResult<Self> {
        Self::connect("mem://").await
    }

    async fn connect(endpoint: &str) -> StorageResult<Self> {
        let db: surrealdb::Surreal<surrealdb::engine::any::Any> = surrealdb::Surreal::init();
        db.connect(endpoint)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        db.use_ns("relay")
            .use_db("main")
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self { inner: db })
    }

    /// Borrow the underlying client for direct `SurrealQL` queries.
    #[must_use]
    pub fn client(&self) -> &surrealdb::Surreal<surrealdb::engine::any::Any> {
        &self.inner
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
