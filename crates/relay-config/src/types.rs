//! Configuration struct definitions.

use serde::{Deserialize, Serialize};

/// Top-level resolved configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listener configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Where session state and host directories live.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Defaults applied to new sessions when the caller doesn't override them.
    #[serde(default)]
    pub session_defaults: SessionDefaults,
    /// Sandbox backend wiring (local-process bridge command, optional
    /// remote-worker URL).
    #[serde(default)]
    pub sandbox: SandboxConfig,
    /// 32-byte secret encryption key, base64-decoded.
    ///
    /// Not serialized: this only ever comes from `RELAY_ENCRYPTION_KEY` and
    /// never from the file tier, so it never round-trips through
    /// `Config::default()` or a written-out config file.
    #[serde(skip)]
    pub encryption_key: EncryptionKey,
    /// Key version tag attached to newly written ciphertext.
    #[serde(default)]
    pub encryption_key_version: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            session_defaults: SessionDefaults::default(),
            sandbox: SandboxConfig::default(),
            encryption_key: EncryptionKey([0u8; 32]),
            encryption_key_version: 1,
        }
    }
}

/// A 32-byte symmetric key used to encrypt/decrypt secret values at rest.
///
/// Deliberately not `Serialize`/`Deserialize`/`Debug`-printable with its
/// contents visible; only the byte length is public API.
#[derive(Clone)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// Wrap 32 raw bytes as an encryption key.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port to bind. `0` lets the OS choose a free port.
    pub port: u16,
    /// Bounded deadline (seconds) `activate` waits for a sandbox to reach
    /// `running` before returning a timeout error.
    pub activation_timeout_secs: u64,
    /// Idle watcher tick interval, in seconds. Must be `<= 30` per the
    /// component contract.
    pub idle_watcher_tick_secs: u64,
    /// Replay window length, in seconds.
    pub replay_window_secs: u64,
    /// Maximum number of events retained per session in the replay buffer.
    pub replay_window_max_events: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            activation_timeout_secs: 10,
            idle_watcher_tick_secs: 15,
            replay_window_secs: 60,
            replay_window_max_events: 1000,
        }
    }
}

/// Where session state and host directories live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for daemon state (pid/port files, logs, databases).
    pub state_dir: String,
    /// SurrealDB connection string for the session/journal/secret store.
    /// Defaults to an embedded `SurrealKV` file under `state_dir`.
    pub database_url: Option<String>,
    /// Root directory for per-session host directories
    /// (`<state_dir>/sessions/<id>/{workspace,agent,git}`).
    pub sessions_dir: Option<String>,
    /// Root directory secrets are materialized under
    /// (`<secrets_base_dir>/pi-secrets-<id>/`).
    pub secrets_base_dir: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            database_url: None,
            sessions_dir: None,
            secrets_base_dir: None,
        }
    }
}

fn default_state_dir() -> String {
    directories::ProjectDirs::from("", "", "relay")
        .map(|dirs| dirs.data_dir().to_string_lossy().into_owned())
        .unwrap_or_else(|| ".relay".to_string())
}

/// Sandbox backend wiring.
///
/// Every deployment gets a `"local-process"` provider (for development and
/// single-host operation); a `"remote-worker"` provider is registered
/// alongside it only when `remote_worker_url` is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Executable the local-process backend spawns per sandbox to bridge
    /// the agent's standard I/O (see `relay_sandbox::LocalProcessProvider`).
    pub bridge_command: String,
    /// Arguments passed to `bridge_command` on every spawn.
    pub bridge_args: Vec<String>,
    /// Base URL of a remote sandbox worker pool. When set, a
    /// `"remote-worker"` provider is registered in addition to
    /// `"local-process"`.
    pub remote_worker_url: Option<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            bridge_command: "relay-agent-bridge".to_string(),
            bridge_args: Vec::new(),
            remote_worker_url: None,
        }
    }
}

/// Defaults applied to new sessions when the caller doesn't override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    /// Default model provider for new sessions.
    pub model_provider: String,
    /// Default model id for new sessions.
    pub model_id: String,
    /// Whether native tool routing is enabled by default.
    pub native_tools_enabled: bool,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            model_provider: "anthropic".to_string(),
            model_id: "claude-default".to_string(),
            native_tools_enabled: true,
        }
    }
}
