//! Per-sandbox lifecycle object returned by a [`crate::provider::SandboxProvider`].

use async_trait::async_trait;
use tokio::sync::watch;

use crate::channel::SandboxChannel;
use crate::error::SandboxResult;
use crate::status::{Capabilities, SandboxStatus};

/// Result of [`SandboxHandle::exec`].
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Process exit code.
    pub exit_code: i32,
    /// Merged stdout+stderr (backends may choose to distinguish them; this
    /// trait only requires the merged form).
    pub output: String,
}

/// A raw-mode interactive shell stream opened by [`SandboxHandle::open_pty`].
///
/// Left as a thin placeholder trait: no shipped backend implements PTY
/// support yet (`capabilities.pty == false` for both), so this only needs
/// to exist as an extension point a future backend can return.
#[async_trait]
pub trait PtyHandle: Send + Sync {
    /// Write raw bytes to the pty's input.
    async fn write(&self, data: &[u8]) -> SandboxResult<()>;

    /// Resize the pty's reported terminal dimensions.
    async fn resize(&self, cols: u16, rows: u16) -> SandboxResult<()>;

    /// Close the pty.
    async fn close(&self);
}

/// Per-sandbox lifecycle handle. Object-safe so the engine can hold
/// `Arc<dyn SandboxHandle>` regardless of backend.
///
/// `exec` and `open_pty` are modeled as trait methods that return
/// [`crate::error::SandboxError::CapabilityUnsupported`] for backends that
/// don't implement them, rather than being absent from the trait — this
/// keeps the trait object-safe and lets callers (the REST exec endpoint,
/// the PTY upgrade) get a uniform error shape regardless of backend.
#[async_trait]
pub trait SandboxHandle: Send + Sync {
    /// What this backend can actually do.
    fn capabilities(&self) -> Capabilities;

    /// Current lifecycle status.
    async fn status(&self) -> SandboxStatus;

    /// Attach a new [`SandboxChannel`]. If stopped, starts the container
    /// first. If paused, callers must `resume()` first. If a prior channel
    /// is live, it is closed before the new one is returned.
    async fn attach(&self) -> SandboxResult<std::sync::Arc<SandboxChannel>>;

    /// Refresh on-host secret material and perform whichever transition is
    /// required to end in `running`. A no-op if already running.
    async fn resume(&self, secrets: Option<std::collections::HashMap<String, String>>, github_token: Option<String>) -> SandboxResult<()>;

    /// Close any live channel and transition to `paused`. Requires
    /// `capabilities().lossless_pause`; callers that ignore that and call
    /// anyway get [`crate::error::SandboxError::CapabilityUnsupported`].
    async fn pause(&self) -> SandboxResult<()>;

    /// Run a shell command inside the sandbox. Only valid in `running`.
    async fn exec(&self, command: &str) -> SandboxResult<ExecResult>;

    /// Open an interactive pty. Only valid in `running`.
    async fn open_pty(&self, cols: u16, rows: u16) -> SandboxResult<std::sync::Arc<dyn PtyHandle>>;

    /// Close the channel, stop, and remove the sandbox. Transitions to
    /// `stopped`.
    async fn terminate(&self) -> SandboxResult<()>;

    /// Subscribe to status transitions.
    fn on_status_change(&self) -> watch::Receiver<SandboxStatus>;

    /// The backend-opaque identifier for this sandbox instance.
    fn provider_id(&self) -> relay_core::SandboxProviderId;

    /// The image digest recorded at creation time, if known.
    fn image_digest(&self) -> Option<String>;
}
