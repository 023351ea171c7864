//! Single-instance locking and shutdown cleanup.
//!
//! Grounded on the daemon lifecycle pattern in the retrieval pack's
//! `oddjobs` daemon (`fs2::FileExt::try_lock_exclusive` on a pid file held
//! for the process's lifetime) rather than the teacher's own daemon, which
//! never enforces single-instance startup; a relay that brokers live
//! sandbox attachments must not run twice against the same state directory.

use std::fs::{File, OpenOptions};

use fs2::FileExt;
use tracing::info;

use crate::error::{DaemonError, DaemonResult};
use crate::paths::DaemonPaths;

/// Holds the PID file's advisory lock for as long as the daemon runs;
/// dropping it releases the lock and is safe to do unconditionally since
/// the OS releases `flock`-style locks on process exit regardless.
pub struct InstanceLock {
    #[allow(dead_code)]
    file: File,
}

/// Acquire the single-instance lock, writing this process's PID into the
/// file once held.
///
/// # Errors
///
/// Returns [`DaemonError::AlreadyRunning`] if another process holds the
/// lock, or [`DaemonError::StateFile`] if the file cannot be opened or
/// written.
pub fn acquire(paths: &DaemonPaths) -> DaemonResult<InstanceLock> {
    let pid_path = paths.pid_file();
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&pid_path)
        .map_err(|source| DaemonError::StateFile { path: pid_path.clone(), source })?;

    file.try_lock_exclusive().map_err(|_| DaemonError::AlreadyRunning(pid_path.clone()))?;

    use std::io::{Seek, SeekFrom, Write as _};
    let mut writable = &file;
    writable
        .set_len(0)
        .and_then(|()| writable.seek(SeekFrom::Start(0)))
        .and_then(|_| write!(writable, "{}", std::process::id()))
        .map_err(|source| DaemonError::StateFile { path: pid_path, source })?;

    Ok(InstanceLock { file })
}

/// Clean up daemon state files on shutdown. Best-effort: a failure here
/// never blocks the rest of the shutdown sequence.
pub fn cleanup(paths: &DaemonPaths) {
    let _ = std::fs::remove_file(paths.pid_file());
    let _ = std::fs::remove_file(paths.port_file());
    info!("daemon state files cleaned up");
}
