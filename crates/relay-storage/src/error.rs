//! Storage error types.

use relay_core::error::{ErrorKind, HasErrorKind};

/// Errors raised by the session/environment/client/secret stores.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The underlying database connection failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// A query against the database failed.
    #[error("query error: {0}")]
    Query(String),

    /// A row could not be (de)serialized to/from its storage representation.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Attempted a transition that the invariant in question forbids, e.g.
    /// mutating an `archived` session row.
    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    /// Secret ciphertext failed to decrypt: wrong key, wrong key version, or
    /// corrupted ciphertext.
    #[error("secret decryption failed: {0}")]
    DecryptionFailed(String),
}

impl HasErrorKind for StorageError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::HandlerError,
            Self::Connection(_) => ErrorKind::ProviderError,
            Self::Query(_) | Self::Serialization(_) => ErrorKind::HandlerError,
            Self::InvalidTransition(_) => ErrorKind::SandboxStateMismatch,
            Self::DecryptionFailed(_) => ErrorKind::HandlerError,
        }
    }
}

/// Convenience alias for fallible storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
