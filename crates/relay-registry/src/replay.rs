//! Per-session bounded replay buffer.
//!
//! Each buffered event carries a session-scoped, connection-independent
//! `buffer_seq` so a later resume can cheaply resolve "everything after the
//! client's last known position" without re-deriving it from any one
//! connection's own seq numbering.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::event::BufferedEvent;

/// Buffer retains events whose age is at most this many seconds...
pub const REPLAY_WINDOW: Duration = Duration::from_secs(60);
/// ...or at most this many events, whichever bound is hit first.
pub const REPLAY_MAX_EVENTS: usize = 1000;

/// One entry in a session's replay buffer.
#[derive(Debug, Clone)]
pub struct ReplayEntry {
    /// Session-scoped monotonic position, independent of any connection.
    pub buffer_seq: u64,
    /// The event itself.
    pub event: BufferedEvent,
}

/// Bounded per-session buffer of recently broadcast events.
#[derive(Debug, Default)]
pub struct ReplayBuffer {
    next_buffer_seq: u64,
    entries: VecDeque<ReplayEntry>,
}

impl ReplayBuffer {
    /// Append an event, evicting anything now outside the window or count
    /// bound. Returns the `buffer_seq` assigned to this event.
    pub fn push(&mut self, event_type: String, payload: serde_json::Value) -> u64 {
        self.next_buffer_seq += 1;
        let buffer_seq = self.next_buffer_seq;
        self.entries.push_back(ReplayEntry {
            buffer_seq,
            event: BufferedEvent {
                event_type,
                payload,
                buffered_at: Instant::now(),
            },
        });
        self.evict();
        buffer_seq
    }

    fn evict(&mut self) {
        while self.entries.len() > REPLAY_MAX_EVENTS {
            self.entries.pop_front();
        }
        while self
            .entries
            .front()
            .is_some_and(|e| e.event.buffered_at.elapsed() > REPLAY_WINDOW)
        {
            self.entries.pop_front();
        }
    }

    /// The highest `buffer_seq` currently known for this session (0 if the
    /// buffer is empty or has never been pushed to).
    #[must_use]
    pub fn max_buffer_seq(&self) -> u64 {
        self.next_buffer_seq
    }

    /// Every buffered event with `buffer_seq > after`, oldest first.
    pub fn after(&mut self, after: u64) -> impl Iterator<Item = &ReplayEntry> {
        self.evict();
        self.entries.iter().filter(move |e| e.buffer_seq > after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn push_assigns_increasing_buffer_seq() {
        let mut buf = ReplayBuffer::default();
        let a = buf.push("agent_start".into(), json!({}));
        let b = buf.push("agent_end".into(), json!({}));
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn after_filters_by_buffer_seq() {
        let mut buf = ReplayBuffer::default();
        buf.push("a".into(), json!({}));
        buf.push("b".into(), json!({}));
        buf.push("c".into(), json!({}));

        let replayed: Vec<_> = buf.after(1).map(|e| e.event.event_type.clone()).collect();
        assert_eq!(replayed, vec!["b", "c"]);
    }

    #[test]
    fn evicts_past_max_events() {
        let mut buf = ReplayBuffer::default();
        for i in 0..(REPLAY_MAX_EVENTS + 5) {
            buf.push(format!("e{i}"), json!({}));
        }
        assert!(buf.entries.len() <= REPLAY_MAX_EVENTS);
    }
}
