//! Local-process backend: spawns the agent bridge as a child process on
//! this host rather than inside a real container. Used for single-host
//! development and as the backend behind the in-memory test fakes; it has
//! no cgroup/namespace enforcement of `resource_tier`, only the bind-mount
//! layout and secret manifest conventions every backend shares.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use relay_core::{SandboxProviderId, SessionId};
use tokio::process::{Child, Command};
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{info, warn};

use crate::channel::SandboxChannel;
use crate::error::{SandboxError, SandboxResult};
use crate::handle::{ExecResult, PtyHandle, SandboxHandle};
use crate::host_dirs::{materialize_git_identity, materialize_secrets, prepare_session_dirs, strip_token_from_url, SessionDirs};
use crate::provider::{CreateSandboxRequest, SandboxProvider, SandboxSummary};
use crate::status::{Capabilities, SandboxStatus};

const CAPABILITIES: Capabilities = Capabilities {
    lossless_pause: false,
    persistent_disk: true,
    exec: true,
    pty: false,
};

struct Inner {
    child: Option<Child>,
    channel: Option<Arc<SandboxChannel>>,
    status: SandboxStatus,
}

/// A [`SandboxHandle`] backed by a local `tokio::process::Child`.
pub struct LocalProcessHandle {
    provider_id: SandboxProviderId,
    dirs: SessionDirs,
    bridge_command: String,
    bridge_args: Vec<String>,
    image_digest: Option<String>,
    inner: Mutex<Inner>,
    status_tx: watch::Sender<SandboxStatus>,
    status_rx: watch::Receiver<SandboxStatus>,
}

impl LocalProcessHandle {
    fn new(provider_id: SandboxProviderId, dirs: SessionDirs, bridge_command: String, bridge_args: Vec<String>, image_digest: Option<String>) -> Arc<Self> {
        let (status_tx, status_rx) = watch::channel(SandboxStatus::Creating);
        Arc::new(Self {
            provider_id,
            dirs,
            bridge_command,
            bridge_args,
            image_digest,
            inner: Mutex::new(Inner {
                child: None,
                channel: None,
                status: SandboxStatus::Creating,
            }),
            status_tx,
            status_rx,
        })
    }

    fn set_status(&self, status: SandboxStatus) {
        let _ = self.status_tx.send(status);
    }

    async fn spawn_child(&self) -> SandboxResult<Child> {
        let mut cmd = Command::new(&self.bridge_command);
        cmd.args(&self.bridge_args)
            .env("RELAY_WORKSPACE_DIR", &self.dirs.workspace)
            .env("RELAY_AGENT_DATA_DIR", &self.dirs.agent_data)
            .env("RELAY_PRIVATE_DIR", &self.dirs.private)
            .current_dir(&self.dirs.workspace)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd.spawn().map_err(|e| SandboxError::Provider(format!("spawning local-process sandbox: {e}")))
    }
}

#[async_trait]
impl SandboxHandle for LocalProcessHandle {
    fn capabilities(&self) -> Capabilities {
        CAPABILITIES
    }

    async fn status(&self) -> SandboxStatus {
        self.inner.lock().await.status
    }

    async fn attach(&self) -> SandboxResult<Arc<SandboxChannel>> {
        let mut inner = self.inner.lock().await;
        match inner.status {
            SandboxStatus::Paused => {
                return Err(SandboxError::StateMismatch("sandbox is paused; call resume() first".to_string()));
            }
            SandboxStatus::Error => {
                return Err(SandboxError::StateMismatch("sandbox is in an error state".to_string()));
            }
            _ => {}
        }

        if let Some(prior) = inner.channel.take() {
            prior.close().await;
        }

        if inner.child.is_none() {
            let child = self.spawn_child().await?;
            inner.child = Some(child);
        }

        let child = inner.child.as_mut().expect("just populated above");
        let stdin = child.stdin.take().ok_or_else(|| SandboxError::Provider("child stdin already taken".to_string()))?;
        let stdout = child.stdout.take().ok_or_else(|| SandboxError::Provider("child stdout already taken".to_string()))?;
        let stderr = child.stderr.take().ok_or_else(|| SandboxError::Provider("child stderr already taken".to_string()))?;

        let channel = Arc::new(SandboxChannel::spawn(self.provider_id.to_string(), stdin, stdout, stderr));
        inner.channel = Some(channel.clone());
        inner.status = SandboxStatus::Running;
        drop(inner);
        self.set_status(SandboxStatus::Running);
        Ok(channel)
    }

    async fn resume(&self, secrets: Option<HashMap<String, String>>, github_token: Option<String>) -> SandboxResult<()> {
        if let Some(secrets) = secrets {
            materialize_secrets(&self.dirs.private, self.provider_id_as_session(), &secrets).await?;
        }
        if let Some(token) = github_token {
            materialize_git_identity(&self.dirs.private, Some(&token), None).await?;
        }
        let status = self.inner.lock().await.status;
        if status == SandboxStatus::Running {
            return Ok(());
        }
        self.attach().await.map(|_| ())
    }

    async fn pause(&self) -> SandboxResult<()> {
        Err(SandboxError::CapabilityUnsupported(
            "local-process backend does not support lossless pause; terminate and resume instead".to_string(),
        ))
    }

    async fn exec(&self, command: &str) -> SandboxResult<ExecResult> {
        let status = self.status().await;
        if status != SandboxStatus::Running {
            return Err(SandboxError::StateMismatch(format!("exec requires running, got {status:?}")));
        }
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.dirs.workspace)
            .output()
            .await
            .map_err(|e| SandboxError::Provider(format!("exec failed: {e}")))?;

        let mut merged = String::from_utf8_lossy(&output.stdout).into_owned();
        merged.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(ExecResult {
            exit_code: output.status.code().unwrap_or(-1),
            output: merged,
        })
    }

    async fn open_pty(&self, _cols: u16, _rows: u16) -> SandboxResult<Arc<dyn PtyHandle>> {
        Err(SandboxError::CapabilityUnsupported("local-process backend does not support pty".to_string()))
    }

    async fn terminate(&self) -> SandboxResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(channel) = inner.channel.take() {
            channel.close().await;
        }
        if let Some(mut child) = inner.child.take() {
            let _ = child.kill().await;
        }
        inner.status = SandboxStatus::Stopped;
        drop(inner);
        self.set_status(SandboxStatus::Stopped);
        Ok(())
    }

    fn on_status_change(&self) -> watch::Receiver<SandboxStatus> {
        self.status_rx.clone()
    }

    fn provider_id(&self) -> SandboxProviderId {
        self.provider_id.clone()
    }

    fn image_digest(&self) -> Option<String> {
        self.image_digest.clone()
    }
}

impl LocalProcessHandle {
    /// Secrets are keyed by env-var, not by session, but `materialize_secrets`
    /// wants a session id purely to salt opaque filenames; reuse the
    /// provider id's textual form since this backend mints it from the
    /// session id in the first place (see [`LocalProcessProvider::create_sandbox`]).
    fn provider_id_as_session(&self) -> SessionId {
        self.provider_id
            .as_str()
            .parse()
            .unwrap_or_else(|_| SessionId::new())
    }
}

/// Concrete [`SandboxProvider`] that spawns the configured bridge binary as
/// a local child process per session.
pub struct LocalProcessProvider {
    state_dir: PathBuf,
    bridge_command: String,
    bridge_args: Vec<String>,
    handles: RwLock<HashMap<SessionId, Arc<LocalProcessHandle>>>,
}

impl LocalProcessProvider {
    /// `bridge_command`/`bridge_args` describe how to launch the agent
    /// bridge process (e.g. a wrapper script that execs the actual agent
    /// and speaks JSONL on stdio); `state_dir` is the root under which
    /// per-session host directories are created.
    #[must_use]
    pub fn new(state_dir: PathBuf, bridge_command: impl Into<String>, bridge_args: Vec<String>) -> Self {
        Self {
            state_dir,
            bridge_command: bridge_command.into(),
            bridge_args,
            handles: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SandboxProvider for LocalProcessProvider {
    async fn is_available(&self) -> bool {
        tokio::fs::metadata(&self.bridge_command).await.is_ok() || which_on_path(&self.bridge_command)
    }

    async fn create_sandbox(&self, request: CreateSandboxRequest) -> SandboxResult<Arc<dyn SandboxHandle>> {
        {
            let handles = self.handles.read().await;
            if let Some(existing) = handles.get(&request.session_id) {
                return Ok(existing.clone() as Arc<dyn SandboxHandle>);
            }
        }

        let dirs = prepare_session_dirs(&self.state_dir, request.session_id).await?;
        materialize_secrets(&dirs.private, request.session_id, &request.secrets).await?;
        materialize_git_identity(
            &dirs.private,
            request.github_token.as_deref(),
            request.git_author.as_ref().map(|(n, e)| (n.as_str(), e.as_str())),
        )
        .await?;

        if let Some(repo_url) = &request.repo_url {
            let clone_url = request
                .github_token
                .as_ref()
                .map(|t| repo_url.replacen("https://", &format!("https://x-access-token:{t}@"), 1))
                .unwrap_or_else(|| repo_url.clone());

            let mut args = vec!["clone".to_string(), clone_url];
            if let Some(branch) = &request.repo_branch {
                args.push("--branch".to_string());
                args.push(branch.clone());
            }
            args.push(".".to_string());

            let status = Command::new("git")
                .args(&args)
                .current_dir(&dirs.workspace)
                .status()
                .await
                .map_err(|e| SandboxError::Provider(format!("git clone failed: {e}")))?;
            if !status.success() {
                return Err(SandboxError::Provider(format!("git clone exited with {status}")));
            }

            let clean_origin = strip_token_from_url(repo_url);
            let _ = Command::new("git")
                .args(["remote", "set-url", "origin", &clean_origin])
                .current_dir(&dirs.workspace)
                .status()
                .await;
        }

        let provider_id = SandboxProviderId::new(request.session_id.to_string());
        // No real image to pull for a local process; the digest is the
        // bridge command's own identity, recorded immediately so a crash
        // between here and handle construction never leaves a stale value.
        let image_digest = Some(blake3::hash(self.bridge_command.as_bytes()).to_hex().to_string());

        let handle = LocalProcessHandle::new(provider_id.clone(), dirs, self.bridge_command.clone(), self.bridge_args.clone(), image_digest);

        self.handles.write().await.insert(request.session_id, handle.clone());
        info!(session_id = %request.session_id, tier = ?request.resource_tier, "local-process sandbox created");
        Ok(handle as Arc<dyn SandboxHandle>)
    }

    async fn get_sandbox(&self, provider_id: &SandboxProviderId) -> SandboxResult<Arc<dyn SandboxHandle>> {
        let handles = self.handles.read().await;
        handles
            .values()
            .find(|h| &h.provider_id() == provider_id)
            .cloned()
            .map(|h| h as Arc<dyn SandboxHandle>)
            .ok_or_else(|| SandboxError::Unavailable(format!("no local-process sandbox for {provider_id}")))
    }

    async fn list_sandboxes(&self) -> SandboxResult<Vec<SandboxSummary>> {
        let handles = self.handles.read().await;
        let mut out = Vec::with_capacity(handles.len());
        for (session_id, handle) in handles.iter() {
            out.push(SandboxSummary {
                session_id: Some(*session_id),
                provider_id: handle.provider_id(),
                status: handle.status().await,
                created_at: Utc::now(),
            });
        }
        Ok(out)
    }

    async fn cleanup(&self) -> SandboxResult<()> {
        let mut handles = self.handles.write().await;
        let mut stopped = Vec::new();
        for (session_id, handle) in handles.iter() {
            if handle.status().await == SandboxStatus::Stopped {
                stopped.push(*session_id);
            }
        }
        for session_id in stopped {
            handles.remove(&session_id);
            let dir = self.state_dir.join("sandboxes").join(session_id.to_string());
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                warn!(session_id = %session_id, error = %e, "failed to remove sandbox host directory during cleanup");
            }
        }
        Ok(())
    }
}

fn which_on_path(command: &str) -> bool {
    let Ok(path_var) = std::env::var("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| dir.join(command).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn provider() -> LocalProcessProvider {
        LocalProcessProvider::new(std::env::temp_dir().join(format!("relay-lp-test-{}", uuid::Uuid::new_v4())), "cat", Vec::new())
    }

    fn request(session_id: SessionId) -> CreateSandboxRequest {
        CreateSandboxRequest {
            session_id,
            env: HashMap::new(),
            secrets: HashMap::new(),
            repo_url: None,
            repo_branch: None,
            github_token: None,
            git_author: None,
            native_tools_enabled: false,
            resource_tier: relay_core::ResourceTier::Small,
        }
    }

    #[tokio::test]
    async fn create_sandbox_is_cached_per_session() {
        let provider = provider();
        let session = SessionId::new();
        let a = provider.create_sandbox(request(session)).await.unwrap();
        let b = provider.create_sandbox(request(session)).await.unwrap();
        assert_eq!(a.provider_id(), b.provider_id());
    }

    #[tokio::test]
    async fn attach_starts_process_and_reports_running() {
        let provider = provider();
        let session = SessionId::new();
        let handle = provider.create_sandbox(request(session)).await.unwrap();
        assert_eq!(handle.status().await, SandboxStatus::Creating);
        let channel = handle.attach().await.unwrap();
        assert_eq!(handle.status().await, SandboxStatus::Running);
        channel.send("hello").await.unwrap();
        channel.close().await;
        handle.terminate().await.unwrap();
        assert_eq!(handle.status().await, SandboxStatus::Stopped);
    }

    #[tokio::test]
    async fn pause_is_unsupported() {
        let provider = provider();
        let session = SessionId::new();
        let handle = provider.create_sandbox(request(session)).await.unwrap();
        assert!(matches!(handle.pause().await, Err(SandboxError::CapabilityUnsupported(_))));
    }

    #[tokio::test]
    async fn exec_requires_running_state() {
        let provider = provider();
        let session = SessionId::new();
        let handle = provider.create_sandbox(request(session)).await.unwrap();
        assert!(matches!(handle.exec("echo hi").await, Err(SandboxError::StateMismatch(_))));
    }
}
