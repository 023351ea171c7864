//! A duplex, newline-delimited JSON-line channel on top of a sandbox's
//! attached I/O.
//!
//! The channel deliberately does not parse the lines it carries: the
//! agent's stdout-as-JSONL wire format is forwarded byte-for-byte so the
//! relay stays forward-compatible as that protocol evolves. Only leading
//! ANSI escape sequences are stripped, since some agent runtimes emit a
//! color reset before their first JSON line.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, ChildStdin, ChildStdout};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, warn};

use crate::error::{SandboxError, SandboxResult};

const INBOUND_BUFFER: usize = 256;
/// Bounded stderr ring kept for REST log access, per session.
const STDERR_RING_CAPACITY: usize = 500;

fn ansi_leader() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:\x1b\[[0-9;]*[a-zA-Z])+").expect("static pattern"))
}

fn strip_leading_ansi(line: &str) -> &str {
    let m = ansi_leader().find(line);
    match m {
        Some(m) if m.start() == 0 => &line[m.end()..],
        _ => line,
    }
}

/// A thread-safe bounded ring of recent stderr lines.
#[derive(Clone, Default)]
pub struct StderrRing {
    inner: Arc<std::sync::Mutex<VecDeque<String>>>,
}

impl StderrRing {
    fn push(&self, line: String) {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.len() >= STDERR_RING_CAPACITY {
            guard.pop_front();
        }
        guard.push_back(line);
    }

    /// Snapshot the ring's current contents, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

/// A duplex frame channel over a sandbox's attached stdin/stdout/stderr.
///
/// Constructed once per live attach; dropping or calling [`Self::close`]
/// stops the background reader tasks and drops the write half. At most one
/// channel is meant to be live per handle at a time (enforced by the
/// handle, not the channel itself).
pub struct SandboxChannel {
    stdin: Mutex<Option<ChildStdin>>,
    inbound: Mutex<mpsc::Receiver<String>>,
    close_tx: watch::Sender<Option<String>>,
    close_rx: watch::Receiver<Option<String>>,
    closed: Arc<AtomicBool>,
    stderr_ring: StderrRing,
    session_label: String,
}

impl SandboxChannel {
    /// Wrap a spawned child's stdio into a channel, spawning background
    /// tasks that read stdout (forwarded, ANSI-stripped, line by line) and
    /// stderr (logged and ringed) until either stream closes.
    pub fn spawn(session_label: impl Into<String>, stdin: ChildStdin, stdout: ChildStdout, stderr: ChildStderr) -> Self {
        let session_label = session_label.into();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        let (close_tx, close_rx) = watch::channel(None);
        let closed = Arc::new(AtomicBool::new(false));
        let stderr_ring = StderrRing::default();

        spawn_stdout_reader(session_label.clone(), stdout, inbound_tx, close_tx.clone(), closed.clone());
        spawn_stderr_reader(session_label.clone(), stderr, stderr_ring.clone());

        Self {
            stdin: Mutex::new(Some(stdin)),
            inbound: Mutex::new(inbound_rx),
            close_tx,
            close_rx,
            closed,
            stderr_ring,
            session_label,
        }
    }

    /// Write `message` followed by a single newline to sandbox stdin.
    /// No-op (not an error) once the channel is closed, matching the
    /// component contract.
    pub async fn send(&self, message: &str) -> SandboxResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut guard = self.stdin.lock().await;
        let Some(stdin) = guard.as_mut() else {
            return Ok(());
        };
        stdin
            .write_all(message.as_bytes())
            .await
            .map_err(|e| SandboxError::Provider(format!("write to sandbox stdin failed: {e}")))?;
        stdin
            .write_all(b"\n")
            .await
            .map_err(|e| SandboxError::Provider(format!("write newline to sandbox stdin failed: {e}")))?;
        Ok(())
    }

    /// Receive the next complete line from sandbox stdout, or `None` once
    /// the channel has closed and no buffered lines remain.
    pub async fn recv(&self) -> Option<String> {
        let mut guard = self.inbound.lock().await;
        guard.recv().await
    }

    /// Resolves once the channel closes, yielding the reason if one was
    /// recorded. Fires exactly once per close; safe to call from multiple
    /// tasks (each gets its own clone of the underlying watch).
    pub async fn closed(&self) -> Option<String> {
        let mut rx = self.close_rx.clone();
        if rx.borrow().is_some() || self.closed.load(Ordering::Acquire) {
            return rx.borrow().clone();
        }
        let _ = rx.changed().await;
        rx.borrow().clone()
    }

    /// Idempotently close the channel: drops the write half (so the
    /// process sees EOF on stdin) and marks closed, triggering
    /// [`Self::closed`] for anyone awaiting it.
    pub async fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.stdin.lock().await.take();
        let _ = self.close_tx.send(Some("closed by caller".to_string()));
        debug!(session = %self.session_label, "sandbox channel closed");
    }

    /// Recent stderr lines captured for this channel's lifetime.
    #[must_use]
    pub fn stderr_ring(&self) -> &StderrRing {
        &self.stderr_ring
    }
}

fn spawn_stdout_reader(
    session_label: String,
    stdout: ChildStdout,
    inbound_tx: mpsc::Sender<String>,
    close_tx: watch::Sender<Option<String>>,
    closed: Arc<AtomicBool>,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let stripped = strip_leading_ansi(&line).to_string();
                    if inbound_tx.send(stripped).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!(session = %session_label, "sandbox stdout closed (eof)");
                    break;
                }
                Err(e) => {
                    warn!(session = %session_label, error = %e, "sandbox stdout read error");
                    if closed.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok() {
                        let _ = close_tx.send(Some(format!("stdout read error: {e}")));
                    }
                    break;
                }
            }
        }
        if closed.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok() {
            let _ = close_tx.send(Some("sandbox stdout closed".to_string()));
        }
    });
}

fn spawn_stderr_reader(session_label: String, stderr: ChildStderr, ring: StderrRing) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let stripped = strip_leading_ansi(&line).to_string();
            debug!(session = %session_label, sandbox_stderr = %stripped);
            ring.push(stripped);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_only_leading_ansi() {
        let line = "\x1b[0mhello\x1b[1m world";
        assert_eq!(strip_leading_ansi(line), "hello\x1b[1m world");
    }

    #[test]
    fn leaves_plain_lines_untouched() {
        assert_eq!(strip_leading_ansi("{\"type\":\"agent_start\"}"), "{\"type\":\"agent_start\"}");
    }

    #[test]
    fn stderr_ring_caps_at_capacity() {
        let ring = StderrRing::default();
        for i in 0..(STDERR_RING_CAPACITY + 10) {
            ring.push(format!("line {i}"));
        }
        assert_eq!(ring.snapshot().len(), STDERR_RING_CAPACITY);
        assert_eq!(ring.snapshot().first().unwrap(), &format!("line {}", 10));
    }
}
