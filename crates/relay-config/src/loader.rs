//! Configuration file discovery and loading.

use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Config, EncryptionKey};

/// Load configuration with the full precedence chain:
/// embedded defaults → optional TOML file → `RELAY_*` environment
/// variables (highest priority).
///
/// # Errors
///
/// See [`crate::Config::load`].
pub fn load(config_path: Option<&Path>) -> ConfigResult<Config> {
    let mut config = match config_path {
        Some(path) => load_file(path)?,
        None => Config::default(),
    };

    apply_env(&mut config)?;
    config.encryption_key = load_encryption_key()?;

    Ok(config)
}

fn load_file(path: &Path) -> ConfigResult<Config> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn apply_env(config: &mut Config) -> ConfigResult<()> {
    if let Ok(port) = std::env::var("PORT") {
        config.server.port = port
            .parse()
            .map_err(|_| ConfigError::InvalidEnvValue {
                variable: "PORT",
                value: port,
            })?;
    }
    if let Ok(dir) = std::env::var("RELAY_STATE_DIR") {
        config.storage.state_dir = dir;
    }
    if let Ok(url) = std::env::var("RELAY_REMOTE_WORKER_URL") {
        config.sandbox.remote_worker_url = Some(url);
    }
    if let Ok(cmd) = std::env::var("RELAY_BRIDGE_COMMAND") {
        config.sandbox.bridge_command = cmd;
    }
    if let Ok(version) = std::env::var("RELAY_ENCRYPTION_KEY_VERSION") {
        config.encryption_key_version =
            version
                .parse()
                .map_err(|_| ConfigError::InvalidEnvValue {
                    variable: "RELAY_ENCRYPTION_KEY_VERSION",
                    value: version,
                })?;
    }
    Ok(())
}

fn load_encryption_key() -> ConfigResult<EncryptionKey> {
    use base64::Engine as _;

    let raw = std::env::var("RELAY_ENCRYPTION_KEY").map_err(|_| ConfigError::MissingEncryptionKey)?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(raw.trim())
        .map_err(|e| ConfigError::InvalidEncryptionKey(e.to_string()))?;
    let bytes: [u8; 32] = decoded
        .try_into()
        .map_err(|v: Vec<u8>| ConfigError::InvalidEncryptionKey(format!("got {} bytes, want 32", v.len())))?;
    Ok(EncryptionKey::from_bytes(bytes))
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn with_key<T>(key_b64: &str, f: impl FnOnce() -> T) -> T {
        unsafe {
            std::env::set_var("RELAY_ENCRYPTION_KEY", key_b64);
        }
        let result = f();
        unsafe {
            std::env::remove_var("RELAY_ENCRYPTION_KEY");
        }
        result
    }

    #[test]
    fn missing_encryption_key_is_fatal() {
        unsafe {
            std::env::remove_var("RELAY_ENCRYPTION_KEY");
        }
        let result = load(None);
        assert!(matches!(result, Err(ConfigError::MissingEncryptionKey)));
    }

    #[test]
    fn valid_key_loads_defaults() {
        let key = base64_of_32_zero_bytes();
        with_key(&key, || {
            let config = load(None).unwrap();
            assert_eq!(config.server.activation_timeout_secs, 10);
        });
    }

    #[test]
    fn file_overrides_defaults_and_env_overrides_file() {
        let key = base64_of_32_zero_bytes();
        with_key(&key, || {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            write!(file, "[server]\nport = 9999\n").unwrap();

            unsafe {
                std::env::set_var("PORT", "7000");
            }
            let config = load(Some(file.path())).unwrap();
            assert_eq!(config.server.port, 7000);
            unsafe {
                std::env::remove_var("PORT");
            }
        });
    }

    fn base64_of_32_zero_bytes() -> String {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.encode([0u8; 32])
    }
}
