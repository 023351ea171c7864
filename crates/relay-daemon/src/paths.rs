//! Daemon state file paths, grounded on the teacher's
//! `astrid-gateway::server::paths::DaemonPaths` (pid/port/log/mode files
//! under a single base directory).

use std::path::{Path, PathBuf};

/// Paths for daemon state files, rooted at the configured state directory.
pub struct DaemonPaths {
    /// Directory for daemon files (`<state_dir>/`).
    pub base_dir: PathBuf,
}

impl DaemonPaths {
    /// Root paths at `base_dir`, creating it (and `logs/` beneath it) if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directories cannot be created.
    pub fn ensure(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        std::fs::create_dir_all(base_dir.join("logs"))?;
        std::fs::create_dir_all(base_dir.join("sessions"))?;
        Ok(Self { base_dir })
    }

    /// PID file path; also the file the startup lock is taken on.
    #[must_use]
    pub fn pid_file(&self) -> PathBuf {
        self.base_dir.join("daemon.pid")
    }

    /// Port file path, written after bind so a CLI client can discover the
    /// listening address without parsing logs.
    #[must_use]
    pub fn port_file(&self) -> PathBuf {
        self.base_dir.join("daemon.port")
    }

    /// Root directory for per-session host directories
    /// (`<base_dir>/sessions/<id>/{workspace,agent,git}`), used when the
    /// config doesn't override `storage.sessions_dir`.
    #[must_use]
    pub fn sessions_dir(&self) -> PathBuf {
        self.base_dir.join("sessions")
    }

    /// Embedded database directory (`<base_dir>/db`).
    #[must_use]
    pub fn db_dir(&self) -> PathBuf {
        self.base_dir.join("db")
    }
}

/// Resolve the effective state directory: `override_dir` if given, else
/// `config.storage.state_dir`.
#[must_use]
pub fn resolve_state_dir(override_dir: Option<&Path>, config_state_dir: &str) -> PathBuf {
    override_dir.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(config_state_dir))
}
