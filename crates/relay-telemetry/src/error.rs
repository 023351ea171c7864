//! Telemetry error types.

/// Errors raised while configuring logging.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// A directive string (e.g. `"relay_sandbox=debug"`) failed to parse.
    #[error("invalid log directive '{0}'")]
    InvalidDirective(String),

    /// The global subscriber was already installed (e.g. `setup_logging`
    /// called twice, or from within a test harness that installs its own).
    #[error("global tracing subscriber already set")]
    AlreadyInitialized,
}

/// Convenience alias for fallible telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
