//! Journal error types.

use relay_core::error::{ErrorKind, HasErrorKind};

/// Errors raised by a [`crate::JournalStore`].
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// The backend failed to persist an append.
    #[error("failed to append journal event: {0}")]
    AppendFailed(String),

    /// The backend failed to read events.
    #[error("failed to read journal events: {0}")]
    ReadFailed(String),

    /// The backend failed to delete a session's events.
    #[error("failed to delete journal events: {0}")]
    DeleteFailed(String),
}

impl HasErrorKind for JournalError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            Self::AppendFailed(_) | Self::ReadFailed(_) | Self::DeleteFailed(_) => ErrorKind::HandlerError,
        }
    }
}

/// Convenience alias for fallible journal operations.
pub type JournalResult<T> = Result<T, JournalError>;
