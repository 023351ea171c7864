//! Daemon-level errors: everything that can go wrong before the RPC
//! surface is up and serving requests.

/// Errors from daemon startup and lifecycle management.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Configuration failed to load (missing encryption key, bad file, ...).
    #[error(transparent)]
    Config(#[from] relay_config::ConfigError),

    /// The embedded database failed to open.
    #[error(transparent)]
    Storage(#[from] relay_storage::StorageError),

    /// A daemon is already running against this state directory (the PID
    /// file's advisory lock is held by another process).
    #[error("a relay daemon is already running against {0} (pid file locked)")]
    AlreadyRunning(std::path::PathBuf),

    /// Failed to create or write a daemon state file (pid, port, log dir).
    #[error("failed to write daemon state file {path}: {source}")]
    StateFile {
        /// Path that failed.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The jsonrpsee server failed to bind or start.
    #[error("failed to start RPC server: {0}")]
    ServerStart(String),
}

/// Convenience alias for fallible daemon startup operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
