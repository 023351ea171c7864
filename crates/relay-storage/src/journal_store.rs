//! `SurrealDB`-backed [`relay_journal::JournalStore`].
//!
//! Per the persisted-state layout (spec §6), journaled events live in a SQL
//! table alongside sessions, environments, secrets, and clients, not only
//! in the in-process replay buffer `relay-registry` holds. Grounded on
//! [`crate::session_store::SessionStore`]'s `UPDATE type::thing(...)`
//! pattern, extended with a `BEGIN/COMMIT TRANSACTION` block so seq
//! assignment and event persistence succeed or fail together — the
//! component contract requires that a failed append never advances the
//! seq counter.

use std::sync::Arc;

use async_trait::async_trait;
use relay_core::SessionId;
use relay_journal::{JournalError, JournalEvent, JournalResult, JournalStore};
use serde::Deserialize;

use crate::db::Database;

const EVENT_TABLE: &str = "journal_event";
const SEQ_TABLE: &str = "journal_seq";

/// Durable journal storage over the same embedded `SurrealDB` the other
/// stores use.
pub struct SurrealJournalStore {
    db: Arc<Database>,
}

impl SurrealJournalStore {
    /// Wrap a database connection.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[derive(Debug, Deserialize)]
struct SeqCounter {
    seq: u64,
}

#[async_trait]
impl JournalStore for SurrealJournalStore {
    async fn append(&self, session_id: SessionId, event_type: String, payload: serde_json::Value) -> JournalResult<JournalEvent> {
        let mut response = self
            .db
            .client()
            .query(
                "BEGIN TRANSACTION; \
                 LET $next = (UPDATE type::thing($seq_tb, $sid) SET seq = (seq OR 0) + 1 RETURN AFTER); \
                 LET $row = (CREATE type::table($ev_tb) CONTENT { \
                     session_id: $sid, \
                     seq: $next[0].seq, \
                     event_type: $etype, \
                     payload: $payload, \
                     created_at: time::now() \
                 }); \
                 RETURN $row[0]; \
                 COMMIT TRANSACTION;",
            )
            .bind(("seq_tb", SEQ_TABLE))
            .bind(("ev_tb", EVENT_TABLE))
            .bind(("sid", session_id.to_string()))
            .bind(("etype", event_type))
            .bind(("payload", payload))
            .await
            .map_err(|e| JournalError::AppendFailed(e.to_string()))?;

        let event: Option<JournalEvent> = response.take(0).map_err(|e| JournalError::AppendFailed(e.to_string()))?;
        event.ok_or_else(|| JournalError::AppendFailed(format!("transaction for session {session_id} returned no row")))
    }

    async fn read_after(&self, session_id: SessionId, after_seq: u64, limit: usize) -> JournalResult<(Vec<JournalEvent>, u64)> {
        let mut response = self
            .db
            .client()
            .query(
                "SELECT * FROM type::table($ev_tb) WHERE session_id = $sid AND seq > $after ORDER BY seq ASC LIMIT $limit; \
                 SELECT seq FROM type::thing($seq_tb, $sid);",
            )
            .bind(("ev_tb", EVENT_TABLE))
            .bind(("seq_tb", SEQ_TABLE))
            .bind(("sid", session_id.to_string()))
            .bind(("after", after_seq))
            .bind(("limit", limit))
            .await
            .map_err(|e| JournalError::ReadFailed(e.to_string()))?;

        let events: Vec<JournalEvent> = response.take(0).map_err(|e| JournalError::ReadFailed(e.to_string()))?;
        let counter: Option<SeqCounter> = response.take(1).map_err(|e| JournalError::ReadFailed(e.to_string()))?;
        let last_seq = counter.map_or(0, |c| c.seq);
        Ok((events, last_seq))
    }

    async fn delete(&self, session_id: SessionId) -> JournalResult<()> {
        self.db
            .client()
            .query("DELETE FROM type::table($ev_tb) WHERE session_id = $sid; DELETE type::thing($seq_tb, $sid);")
            .bind(("ev_tb", EVENT_TABLE))
            .bind(("seq_tb", SEQ_TABLE))
            .bind(("sid", session_id.to_string()))
            .await
            .map_err(|e| JournalError::DeleteFailed(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store() -> SurrealJournalStore {
        let db = Database::connect_memory().await.unwrap();
        SurrealJournalStore::new(Arc::new(db))
    }

    #[tokio::test]
    async fn seq_is_gap_free_and_starts_at_one() {
        let store = store().await;
        let session = SessionId::new();

        let e1 = store.append(session, "prompt".into(), json!({})).await.unwrap();
        let e2 = store.append(session, "agent_start".into(), json!({})).await.unwrap();

        assert_eq!(e1.seq, 1);
        assert_eq!(e2.seq, 2);
    }

    #[tokio::test]
    async fn read_after_returns_ascending_events_and_last_seq() {
        let store = store().await;
        let session = SessionId::new();
        for i in 0..5 {
            store.append(session, format!("event_{i}"), json!({"i": i})).await.unwrap();
        }

        let (events, last_seq) = store.read_after(session, 2, 10).await.unwrap();
        assert_eq!(last_seq, 5);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].seq, 3);
    }

    #[tokio::test]
    async fn delete_removes_events_and_resets_seq() {
        let store = store().await;
        let session = SessionId::new();
        store.append(session, "prompt".into(), json!({})).await.unwrap();

        store.delete(session).await.unwrap();

        let (events, last_seq) = store.read_after(session, 0, 10).await.unwrap();
        assert!(events.is_empty());
        assert_eq!(last_seq, 0);

        let fresh = store.append(session, "prompt".into(), json!({})).await.unwrap();
        assert_eq!(fresh.seq, 1);
    }

    #[tokio::test]
    async fn different_sessions_have_independent_seq_counters() {
        let store = store().await;
        let a = SessionId::new();
        let b = SessionId::new();

        store.append(a, "x".into(), json!({})).await.unwrap();
        let b_event = store.append(b, "y".into(), json!({})).await.unwrap();

        assert_eq!(b_event.seq, 1);
    }
}
