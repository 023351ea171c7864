//! Configuration error types.

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file exists but is not valid TOML.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// `RELAY_ENCRYPTION_KEY` was not set.
    #[error(
        "RELAY_ENCRYPTION_KEY is not set. Generate one with:\n  \
         openssl rand -base64 32\n\
         and set it in the environment before starting the relay."
    )]
    MissingEncryptionKey,

    /// `RELAY_ENCRYPTION_KEY` was set but is not valid base64, or does not
    /// decode to exactly 32 bytes.
    #[error("RELAY_ENCRYPTION_KEY must be 32 bytes, base64-encoded: {0}")]
    InvalidEncryptionKey(String),

    /// An environment variable held a value that could not be parsed as the
    /// expected type (e.g. `PORT` not being an integer).
    #[error("invalid value for {variable}: {value}")]
    InvalidEnvValue {
        /// Name of the offending environment variable.
        variable: &'static str,
        /// The value that failed to parse.
        value: String,
    },
}

/// Convenience alias for fallible configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
