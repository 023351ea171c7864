//! The server's error type: the only crate in the workspace that needs the
//! full wire vocabulary, assembled by delegating to each lower error's
//! [`HasErrorKind::error_kind`].

use jsonrpsee::types::ErrorObjectOwned;
use relay_core::error::{ErrorKind, HasErrorKind};
use relay_engine::EngineError;
use relay_journal::JournalError;
use relay_registry::RegistryError;
use relay_storage::StorageError;

use crate::wire::WireError;

/// Errors raised by the RPC and REST surfaces.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A lower engine-layer failure.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A lower storage-layer failure, reached directly (not through the
    /// engine) by facade methods that only touch a store.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A lower registry failure, reached directly by connection-lifecycle
    /// RPC methods (`hello`, `subscribeEvents`).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A lower journal failure, reached directly (not through the engine)
    /// by `get_messages` and the REST facade's history endpoints.
    #[error(transparent)]
    Journal(#[from] JournalError),

    /// `subscribeEvents` named a `connectionId` that never called `hello`,
    /// or whose pending receiver was already claimed.
    #[error("no pending subscription for connection {0}")]
    NoPendingSubscription(relay_core::ConnectionId),

    /// Request params failed to deserialize into the expected shape.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// The external GitHub collaborator failed or is unconfigured.
    #[error("github: {0}")]
    Github(String),
}

impl HasErrorKind for ServerError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Engine(e) => e.error_kind(),
            Self::Storage(e) => e.error_kind(),
            Self::Registry(e) => e.error_kind(),
            Self::Journal(e) => e.error_kind(),
            Self::NoPendingSubscription(_) => ErrorKind::NotConnected,
            Self::InvalidParams(_) => ErrorKind::InvalidRequest,
            Self::Github(_) => ErrorKind::ProviderError,
        }
    }
}

/// Convenience alias for fallible server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// JSON-RPC error codes, in the reserved application range.
pub mod error_codes {
    /// Wire-level `ErrorKind` could not be mapped to anything more
    /// specific; the `data` field carries the kind string.
    pub const HANDLER_ERROR: i32 = -32001;
    /// Session/connection/environment id not found.
    pub const NOT_FOUND: i32 = -32002;
    /// Request params were malformed or violated an invariant.
    pub const INVALID_REQUEST: i32 = -32003;
    /// Sandbox is in a state that can't serve the request.
    pub const SANDBOX_STATE_MISMATCH: i32 = -32004;
    /// Sandbox backend is unreachable or image pull failed.
    pub const SANDBOX_UNAVAILABLE: i32 = -32005;
    /// Activation or tool call exceeded its deadline.
    pub const TIMEOUT: i32 = -32006;
    /// External provider (model API, GitHub) failed.
    pub const PROVIDER_ERROR: i32 = -32007;
}

impl From<ServerError> for ErrorObjectOwned {
    fn from(err: ServerError) -> Self {
        let kind = err.error_kind();
        let code = match kind {
            ErrorKind::NotConnected
            | ErrorKind::ConnectionLost
            | ErrorKind::ConnectionFailed => error_codes::NOT_FOUND,
            ErrorKind::InvalidRequest | ErrorKind::UnknownMethod => error_codes::INVALID_REQUEST,
            ErrorKind::SandboxStateMismatch
            | ErrorKind::ResumeOutOfWindow
            | ErrorKind::ToolCallAborted
            | ErrorKind::ToolCallOwnerLost => error_codes::SANDBOX_STATE_MISMATCH,
            ErrorKind::SandboxUnavailable | ErrorKind::ImageUnavailable => {
                error_codes::SANDBOX_UNAVAILABLE
            }
            ErrorKind::Timeout => error_codes::TIMEOUT,
            ErrorKind::ProviderError => error_codes::PROVIDER_ERROR,
            ErrorKind::HandlerError => error_codes::HANDLER_ERROR,
        };
        let message = err.to_string();
        let data = WireError { code: kind.as_str(), message: message.clone(), details: None };
        ErrorObjectOwned::owned(code, message, Some(data))
    }
}

impl From<ServerError> for WireError {
    fn from(err: ServerError) -> Self {
        let kind = err.error_kind();
        WireError { code: kind.as_str(), message: err.to_string(), details: None }
    }
}
