//! Unified configuration for the relay daemon.
//!
//! This crate has **no dependency on other internal `relay-*` crates**. It
//! only depends on `serde`, `toml`, `thiserror`, `directories`, and
//! `tracing`. Conversion from config types to domain types (resource tiers,
//! provider keys) happens at the integration boundary in `relay-daemon`.
//!
//! # Configuration precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Environment variables** (`RELAY_*`)
//! 2. **Config file** (`<state-dir>/config.toml`, or a path given explicitly)
//! 3. **Embedded defaults**
//!
//! # Usage
//!
//! ```rust,no_run
//! use relay_config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("listening on port {}", config.server.port);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod loader;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use loader::load;
pub use types::{Config, SandboxConfig, ServerConfig, SessionDefaults, StorageConfig};

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// See [`loader::load`] for the algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a config file is present but malformed,
    /// if `RELAY_ENCRYPTION_KEY` is absent or not valid base64-encoded 32
    /// bytes, or if the resolved configuration otherwise fails validation.
    pub fn load(config_path: Option<&std::path::Path>) -> ConfigResult<Config> {
        loader::load(config_path)
    }
}
