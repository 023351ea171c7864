//! Append-only per-session event journal.
//!
//! Durable replay for client resumption and post-hoc session inspection are
//! decoupled from live fan-out (that's [`relay_registry`]'s job): the
//! journal only ever appends and reads by seq cursor.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod event;
mod memory;

pub use error::{JournalError, JournalResult};
pub use event::JournalEvent;
pub use memory::InMemoryJournalStore;

use async_trait::async_trait;
use relay_core::SessionId;

/// Storage backend a [`Journal`] appends to and reads from.
///
/// Implementations must guarantee: assigning the next `seq` for a session
/// and persisting the event happen atomically from the caller's point of
/// view — on failure the seq counter must not have advanced. `relay-storage`
/// provides a `SurrealDB`-backed implementation; [`InMemoryJournalStore`] is
/// the in-process implementation used by tests and the local-process
/// sandbox backend.
#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Append an event, assigning it the next `seq` for `session_id`.
    async fn append(
        &self,
        session_id: SessionId,
        event_type: String,
        payload: serde_json::Value,
    ) -> JournalResult<JournalEvent>;

    /// Read events with `seq > after_seq`, ascending, at most `limit` rows,
    /// plus the maximum known `seq` for the session (0 if none).
    async fn read_after(
        &self,
        session_id: SessionId,
        after_seq: u64,
        limit: usize,
    ) -> JournalResult<(Vec<JournalEvent>, u64)>;

    /// Remove every journaled event for `session_id`. Used only by a hard
    /// `delete`; `archive` never calls this, since archived sessions retain
    /// their history.
    async fn delete(&self, session_id: SessionId) -> JournalResult<()>;
}

/// The journal: a thin, generic-free wrapper over a [`JournalStore`].
///
/// Kept as a separate type from the trait (rather than exposing the trait
/// object directly) so call sites read `Journal::append(...)` instead of
/// threading `dyn JournalStore` through every signature.
#[derive(Clone)]
pub struct Journal {
    store: std::sync::Arc<dyn JournalStore>,
}

impl Journal {
    /// Wrap a storage backend.
    #[must_use]
    pub fn new(store: std::sync::Arc<dyn JournalStore>) -> Self {
        Self { store }
    }

    /// Append an event for `session_id`. See [`JournalStore::append`].
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the backend fails to persist the event;
    /// per the component contract, the backend must not have advanced its
    /// seq counter in that case.
    pub async fn append(
        &self,
        session_id: SessionId,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> JournalResult<JournalEvent> {
        self.store.append(session_id, event_type.into(), payload).await
    }

    /// Read events after `after_seq`. See [`JournalStore::read_after`].
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the backend query fails.
    pub async fn read_after(
        &self,
        session_id: SessionId,
        after_seq: u64,
        limit: usize,
    ) -> JournalResult<(Vec<JournalEvent>, u64)> {
        self.store.read_after(session_id, after_seq, limit).await
    }

    /// Delete a session's journaled events. See [`JournalStore::delete`].
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the backend fails to delete the events.
    pub async fn delete(&self, session_id: SessionId) -> JournalResult<()> {
        self.store.delete(session_id).await
    }
}
