//! Session-level enums shared between storage, engine, and server crates.

use serde::{Deserialize, Serialize};

/// Whether a session is a plain chat or a code session bound to a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// No repository attached.
    #[default]
    Chat,
    /// Requires `repoId`.
    Code,
}

/// The session state machine's states.
///
/// `Archived` is terminal: no operation may transition away from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Row inserted, sandbox creation running in the background.
    Creating,
    /// Sandbox is running and reachable.
    Active,
    /// No channel activity within the idle timeout; sandbox paused.
    Idle,
    /// Sandbox terminated, row retained for history. Terminal.
    Archived,
    /// Unrecoverable provider failure.
    Error,
}

impl SessionStatus {
    /// Whether this status permits transitioning to another status at all.
    ///
    /// Only `Archived` is a dead end.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Archived)
    }
}

/// The kind of client attached to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    /// Web dashboard.
    Web,
    /// iOS native client.
    Ios,
    /// macOS native client.
    Macos,
    /// Unidentified client.
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_archived_is_terminal() {
        assert!(SessionStatus::Archived.is_terminal());
        assert!(!SessionStatus::Active.is_terminal());
        assert!(!SessionStatus::Error.is_terminal());
    }
}
