//! Engine error types.

use relay_core::error::{ErrorKind, HasErrorKind};
use relay_core::SessionId;
use relay_journal::JournalError;
use relay_sandbox::SandboxError;
use relay_storage::StorageError;

/// Errors raised by [`crate::engine::SessionEngine`], [`crate::manager::SandboxManager`],
/// and [`crate::broker::NativeToolBroker`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No session row exists for the given id.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// `mode=code` was requested without a `repoId`.
    #[error("mode=code requires repoId")]
    RepoRequired,

    /// No environment is configured under the requested key, or the
    /// environment names a sandbox backend this daemon has no provider for.
    #[error("no provider configured for sandbox type {0}")]
    UnknownProvider(String),

    /// `activate` exceeded its bounded deadline waiting for the sandbox to
    /// reach `running`.
    #[error("activation timed out waiting for sandbox to become running")]
    ActivationTimeout,

    /// The session is `archived`; no further mutation is permitted.
    #[error("session {0} is archived and cannot be modified")]
    ArchivedSessionImmutable(SessionId),

    /// A storage-layer failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A sandbox provider/handle/channel failure.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// A journal append/read failure.
    #[error(transparent)]
    Journal(#[from] JournalError),

    /// A native tool call was aborted by the engine or the client.
    #[error("native tool call aborted")]
    ToolCallAborted,

    /// The native tool call's owning client disconnected before responding.
    #[error("native tool call's owning client disconnected before responding")]
    ToolCallOwnerLost,

    /// There is no attached client capable of native tool execution to
    /// route the call to.
    #[error("no native-tool-capable client attached to session {0}")]
    NoToolCallOwner(SessionId),
}

impl HasErrorKind for EngineError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            Self::SessionNotFound(_) | Self::UnknownProvider(_) => ErrorKind::HandlerError,
            Self::RepoRequired => ErrorKind::InvalidRequest,
            Self::ActivationTimeout => ErrorKind::Timeout,
            Self::ArchivedSessionImmutable(_) => ErrorKind::SandboxStateMismatch,
            Self::Storage(e) => e.error_kind(),
            Self::Sandbox(e) => e.error_kind(),
            Self::Journal(e) => e.error_kind(),
            Self::ToolCallAborted => ErrorKind::ToolCallAborted,
            Self::ToolCallOwnerLost | Self::NoToolCallOwner(_) => ErrorKind::ToolCallOwnerLost,
        }
    }
}

/// Convenience alias for fallible engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
