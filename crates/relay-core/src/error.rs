//! Wire-level error kind taxonomy.
//!
//! Every crate in the workspace defines its own `thiserror` enum scoped to
//! its own concern (storage, journal, sandbox, engine...); each of those
//! implements `error_kind()` to project itself onto this shared vocabulary,
//! which is what ultimately appears in `{code, message}` over the wire.

use serde::{Deserialize, Serialize};

/// The wire-level error kind vocabulary.
///
/// These are kinds, not types: several internal error variants across
/// several crates may all map onto the same kind here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The client is not attached to the session it addressed.
    NotConnected,
    /// A connection attempt to a backend failed.
    ConnectionFailed,
    /// An established connection was lost.
    ConnectionLost,
    /// An operation exceeded its bounded deadline.
    Timeout,
    /// The incoming request was malformed.
    InvalidRequest,
    /// The requested RPC method does not exist.
    UnknownMethod,
    /// A handler raised an error while processing a well-formed request.
    HandlerError,
    /// No sandbox is available for the requested operation.
    SandboxUnavailable,
    /// The sandbox reported a state inconsistent with the request.
    SandboxStateMismatch,
    /// The sandbox provider backend reported an error.
    ProviderError,
    /// The environment's configured image could not be resolved.
    ImageUnavailable,
    /// The requested resume point is outside the replay window.
    ResumeOutOfWindow,
    /// A native tool call was aborted.
    ToolCallAborted,
    /// The native tool call's owning client disconnected before responding.
    ToolCallOwnerLost,
}

impl ErrorKind {
    /// The wire string for this kind, as it appears in `{code, message}`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::ConnectionFailed => "connection_failed",
            Self::ConnectionLost => "connection_lost",
            Self::Timeout => "timeout",
            Self::InvalidRequest => "invalid_request",
            Self::UnknownMethod => "unknown_method",
            Self::HandlerError => "handler_error",
            Self::SandboxUnavailable => "sandbox_unavailable",
            Self::SandboxStateMismatch => "sandbox_state_mismatch",
            Self::ProviderError => "provider_error",
            Self::ImageUnavailable => "image_unavailable",
            Self::ResumeOutOfWindow => "resume_out_of_window",
            Self::ToolCallAborted => "tool_call_aborted",
            Self::ToolCallOwnerLost => "tool_call_owner_lost",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait implemented by every crate-local error enum so `relay-server` can
/// project any of them onto the shared wire vocabulary without a match
/// statement per crate.
pub trait HasErrorKind {
    /// The wire-level kind this error corresponds to.
    fn error_kind(&self) -> ErrorKind;
}

/// A catch-all error used at crate boundaries that don't yet have their own
/// dedicated enum (primarily tests and small helper functions).
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Generic handler failure with a human-readable message.
    #[error("{0}")]
    Handler(String),
    /// The request was malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl HasErrorKind for RelayError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Handler(_) => ErrorKind::HandlerError,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }
}

/// Convenience alias for fallible operations returning a [`RelayError`].
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_round_trips_through_serde() {
        let kind = ErrorKind::SandboxStateMismatch;
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, "\"sandbox_state_mismatch\"");
        let back: ErrorKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }

    #[test]
    fn display_matches_wire_string() {
        assert_eq!(ErrorKind::Timeout.to_string(), "timeout");
    }
}
