//! Sandbox lifecycle status.

use serde::{Deserialize, Serialize};

/// A [`crate::handle::SandboxHandle`]'s lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxStatus {
    /// Backend is still provisioning (image pull, host dir setup, clone).
    Creating,
    /// Container/process is running and reachable.
    Running,
    /// Frozen via whichever primitive the backend exposes; no live channel.
    Paused,
    /// Stopped but not yet removed; `attach` will restart it.
    Stopped,
    /// Unrecoverable backend failure.
    Error,
}

/// What a provider backend can actually do; the engine consults this before
/// attempting an operation rather than discovering it fails at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// `pause()` freezes state without data loss (vs. a kill-and-restart).
    pub lossless_pause: bool,
    /// Host-side workspace/agent directories survive a terminate+recreate.
    pub persistent_disk: bool,
    /// `exec()` is implemented.
    pub exec: bool,
    /// `open_pty()` is implemented.
    pub pty: bool,
}
