//! Registry error types.

use relay_core::error::{ErrorKind, HasErrorKind};

/// Errors raised by the [`crate::ConnectionRegistry`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The named connection is not registered.
    #[error("connection not registered: {0}")]
    UnknownConnection(String),

    /// The resume request named a `lastSeqBySession` value ahead of what the
    /// connection was ever sent, or otherwise malformed.
    #[error("invalid resume request: {0}")]
    InvalidResume(String),
}

impl HasErrorKind for RegistryError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            Self::UnknownConnection(_) => ErrorKind::NotConnected,
            Self::InvalidResume(_) => ErrorKind::InvalidRequest,
        }
    }
}

/// Convenience alias for fallible registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
