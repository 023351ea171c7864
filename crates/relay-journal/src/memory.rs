//! In-process journal store used by tests and the local-process sandbox
//! backend's development mode.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use relay_core::SessionId;
use tokio::sync::Mutex;

use crate::error::JournalResult;
use crate::event::JournalEvent;
use crate::JournalStore;

#[derive(Default)]
struct SessionLog {
    events: Vec<JournalEvent>,
}

/// `JournalStore` backed by an in-memory per-session vector.
///
/// Each session's log is guarded by its own lock so appends to different
/// sessions never contend; within a session, the lock held across the
/// read-modify-write of "assign next seq, push" is what gives append its
/// gap-free guarantee.
#[derive(Default)]
pub struct InMemoryJournalStore {
    sessions: Mutex<HashMap<SessionId, Arc<Mutex<SessionLog>>>>,
}

impl InMemoryJournalStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn log_for(&self, session_id: SessionId) -> Arc<Mutex<SessionLog>> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(SessionLog::default())))
            .clone()
    }
}

#[async_trait]
impl JournalStore for InMemoryJournalStore {
    async fn append(
        &self,
        session_id: SessionId,
        event_type: String,
        payload: serde_json::Value,
    ) -> JournalResult<JournalEvent> {
        let log = self.log_for(session_id).await;
        let mut log = log.lock().await;
        let seq = log.events.last().map_or(1, |e| e.seq + 1);
        let event = JournalEvent {
            session_id,
            seq,
            event_type,
            payload,
            created_at: Utc::now(),
        };
        log.events.push(event.clone());
        Ok(event)
    }

    async fn read_after(
        &self,
        session_id: SessionId,
        after_seq: u64,
        limit: usize,
    ) -> JournalResult<(Vec<JournalEvent>, u64)> {
        let log = self.log_for(session_id).await;
        let log = log.lock().await;
        let last_seq = log.events.last().map_or(0, |e| e.seq);
        let events = log
            .events
            .iter()
            .filter(|e| e.seq > after_seq)
            .take(limit)
            .cloned()
            .collect();
        Ok((events, last_seq))
    }

    async fn delete(&self, session_id: SessionId) -> JournalResult<()> {
        self.sessions.lock().await.remove(&session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn seq_is_gap_free_and_starts_at_one() {
        let store = InMemoryJournalStore::new();
        let session = SessionId::new();

        let e1 = store.append(session, "prompt".into(), json!({})).await.unwrap();
        let e2 = store.append(session, "agent_start".into(), json!({})).await.unwrap();

        assert_eq!(e1.seq, 1);
        assert_eq!(e2.seq, 2);
    }

    #[tokio::test]
    async fn read_after_returns_ascending_events_and_last_seq() {
        let store = InMemoryJournalStore::new();
        let session = SessionId::new();
        for i in 0..5 {
            store
                .append(session, format!("event_{i}"), json!({"i": i}))
                .await
                .unwrap();
        }

        let (events, last_seq) = store.read_after(session, 2, 10).await.unwrap();
        assert_eq!(last_seq, 5);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].seq, 3);
        assert_eq!(events[2].seq, 5);
    }

    #[tokio::test]
    async fn read_after_respects_limit() {
        let store = InMemoryJournalStore::new();
        let session = SessionId::new();
        for i in 0..10 {
            store
                .append(session, format!("event_{i}"), json!({}))
                .await
                .unwrap();
        }

        let (events, last_seq) = store.read_after(session, 0, 3).await.unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(last_seq, 10);
    }

    #[tokio::test]
    async fn different_sessions_have_independent_seq_counters() {
        let store = InMemoryJournalStore::new();
        let a = SessionId::new();
        let b = SessionId::new();

        store.append(a, "x".into(), json!({})).await.unwrap();
        let b_event = store.append(b, "y".into(), json!({})).await.unwrap();

        assert_eq!(b_event.seq, 1);
    }

    #[tokio::test]
    async fn delete_removes_all_events_and_resets_seq() {
        let store = InMemoryJournalStore::new();
        let session = SessionId::new();
        store.append(session, "prompt".into(), json!({})).await.unwrap();
        store.append(session, "agent_start".into(), json!({})).await.unwrap();

        store.delete(session).await.unwrap();

        let (events, last_seq) = store.read_after(session, 0, 10).await.unwrap();
        assert!(events.is_empty());
        assert_eq!(last_seq, 0);

        let fresh = store.append(session, "prompt".into(), json!({})).await.unwrap();
        assert_eq!(fresh.seq, 1);
    }
}
