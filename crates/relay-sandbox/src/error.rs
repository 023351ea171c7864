//! Sandbox error types.

use relay_core::error::{ErrorKind, HasErrorKind};

/// Errors raised by [`crate::channel::SandboxChannel`], [`crate::handle::SandboxHandle`],
/// and [`crate::provider::SandboxProvider`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// The sandbox's status does not permit the requested operation (e.g.
    /// `attach` while `paused`, `exec` while not `running`).
    #[error("sandbox state mismatch: {0}")]
    StateMismatch(String),

    /// No sandbox is running or known for the session/provider id addressed.
    #[error("no sandbox available: {0}")]
    Unavailable(String),

    /// The provider backend itself reported a failure (spawn failed, HTTP
    /// error from a remote worker, image pull failed).
    #[error("sandbox provider error: {0}")]
    Provider(String),

    /// The requested operation is not implemented by this backend (e.g.
    /// `openPty` on a backend with `capabilities.pty == false`).
    #[error("capability not supported by this provider: {0}")]
    CapabilityUnsupported(String),

    /// The environment's configured image could not be resolved.
    #[error("image unavailable: {0}")]
    ImageUnavailable(String),

    /// Preparing host-side directories or secret material failed.
    #[error("host setup failed: {0}")]
    HostSetup(String),
}

impl HasErrorKind for SandboxError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            Self::StateMismatch(_) => ErrorKind::SandboxStateMismatch,
            Self::Unavailable(_) => ErrorKind::SandboxUnavailable,
            Self::Provider(_) | Self::HostSetup(_) => ErrorKind::ProviderError,
            Self::CapabilityUnsupported(_) => ErrorKind::ProviderError,
            Self::ImageUnavailable(_) => ErrorKind::ImageUnavailable,
        }
    }
}

/// Convenience alias for fallible sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;
