//! Stub remote-worker backend: records the shape of an HTTP-driven remote
//! sandbox provider (a fleet of worker hosts, each running containers and
//! a bridge per sandbox) without requiring a live network dependency to
//! exist in this workspace. A real deployment points `worker_base_url` at
//! an actual worker control plane; nothing here assumes one is reachable.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::{SandboxProviderId, SessionId};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, RwLock};

use crate::bridge::{BridgeClient, HttpBridgeClient};
use crate::channel::SandboxChannel;
use crate::error::{SandboxError, SandboxResult};
use crate::handle::{ExecResult, PtyHandle, SandboxHandle};
use crate::provider::{CreateSandboxRequest, SandboxProvider, SandboxSummary};
use crate::status::{Capabilities, SandboxStatus};

const CAPABILITIES: Capabilities = Capabilities {
    lossless_pause: true,
    persistent_disk: true,
    exec: true,
    pty: false,
};

fn sandboxes_url(worker_base_url: &str) -> String {
    format!("{worker_base_url}/sandboxes")
}

fn sandbox_url(worker_base_url: &str, provider_id: &SandboxProviderId) -> String {
    format!("{worker_base_url}/sandboxes/{provider_id}")
}

#[derive(Serialize)]
struct CreateSandboxBody<'a> {
    #[serde(rename = "sessionId")]
    session_id: SessionId,
    env: &'a HashMap<String, String>,
    #[serde(rename = "resourceTier")]
    resource_tier: relay_core::ResourceTier,
    #[serde(rename = "repoUrl", skip_serializing_if = "Option::is_none")]
    repo_url: Option<&'a str>,
    #[serde(rename = "repoBranch", skip_serializing_if = "Option::is_none")]
    repo_branch: Option<&'a str>,
    #[serde(rename = "nativeToolsEnabled")]
    native_tools_enabled: bool,
}

#[derive(Deserialize)]
struct CreateSandboxResponse {
    #[serde(rename = "providerId")]
    provider_id: String,
    #[serde(rename = "bridgeUrl")]
    bridge_url: String,
    #[serde(rename = "imageDigest")]
    image_digest: Option<String>,
}

#[derive(Deserialize)]
struct WorkerSandboxStatus {
    status: String,
}

fn parse_worker_status(raw: &str) -> SandboxStatus {
    match raw {
        "creating" => SandboxStatus::Creating,
        "running" => SandboxStatus::Running,
        "paused" => SandboxStatus::Paused,
        "stopped" => SandboxStatus::Stopped,
        _ => SandboxStatus::Error,
    }
}

/// A [`SandboxHandle`] whose actual state lives on a remote worker, reached
/// over HTTP via `worker_base_url`, with per-sandbox exec routed through
/// that sandbox's own bridge at `bridge_url`.
pub struct RemoteWorkerHandle {
    worker_base_url: String,
    provider_id: SandboxProviderId,
    bridge_url: String,
    image_digest: Option<String>,
    http: reqwest::Client,
    status: Mutex<SandboxStatus>,
    status_tx: watch::Sender<SandboxStatus>,
    status_rx: watch::Receiver<SandboxStatus>,
}

impl RemoteWorkerHandle {
    fn new(worker_base_url: String, provider_id: SandboxProviderId, bridge_url: String, image_digest: Option<String>, http: reqwest::Client, initial: SandboxStatus) -> Arc<Self> {
        let (status_tx, status_rx) = watch::channel(initial);
        Arc::new(Self {
            worker_base_url,
            provider_id,
            bridge_url,
            image_digest,
            http,
            status: Mutex::new(initial),
            status_tx,
            status_rx,
        })
    }

    async fn set_status(&self, status: SandboxStatus) {
        *self.status.lock().await = status;
        let _ = self.status_tx.send(status);
    }

    fn bridge_client(&self) -> HttpBridgeClient {
        HttpBridgeClient::new(self.bridge_url.clone())
    }

    async fn post_action(&self, action: &str) -> SandboxResult<()> {
        let url = format!("{}/{action}", sandbox_url(&self.worker_base_url, &self.provider_id));
        let resp = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|e| SandboxError::Provider(format!("worker action {action} failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(SandboxError::Provider(format!("worker action {action} returned {}", resp.status())));
        }
        Ok(())
    }
}

#[async_trait]
impl SandboxHandle for RemoteWorkerHandle {
    fn capabilities(&self) -> Capabilities {
        CAPABILITIES
    }

    async fn status(&self) -> SandboxStatus {
        *self.status.lock().await
    }

    async fn attach(&self) -> SandboxResult<Arc<SandboxChannel>> {
        // A real remote-worker deployment drives this by upgrading an HTTP
        // connection to the sandbox's bridge to a WebSocket and wrapping
        // its split halves the same way the local-process backend wraps a
        // child's stdio. This stub has no WebSocket client in its
        // dependency set, so it reports the capability gap explicitly
        // rather than silently returning a channel that never receives.
        Err(SandboxError::CapabilityUnsupported(
            "remote-worker stub backend does not implement the bridge WebSocket upgrade".to_string(),
        ))
    }

    async fn resume(&self, _secrets: Option<HashMap<String, String>>, _github_token: Option<String>) -> SandboxResult<()> {
        if self.status().await == SandboxStatus::Running {
            return Ok(());
        }
        self.post_action("resume").await?;
        self.set_status(SandboxStatus::Running).await;
        Ok(())
    }

    async fn pause(&self) -> SandboxResult<()> {
        self.post_action("pause").await?;
        self.set_status(SandboxStatus::Paused).await;
        Ok(())
    }

    async fn exec(&self, command: &str) -> SandboxResult<ExecResult> {
        if self.status().await != SandboxStatus::Running {
            return Err(SandboxError::StateMismatch("exec requires running".to_string()));
        }
        self.bridge_client().exec(command).await
    }

    async fn open_pty(&self, _cols: u16, _rows: u16) -> SandboxResult<Arc<dyn PtyHandle>> {
        Err(SandboxError::CapabilityUnsupported("remote-worker backend does not support pty".to_string()))
    }

    async fn terminate(&self) -> SandboxResult<()> {
        self.post_action("terminate").await?;
        self.set_status(SandboxStatus::Stopped).await;
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

/// Concrete [`SandboxProvider`] that delegates to a remote worker control
/// plane reachable at `worker_base_url`.
pub struct RemoteWorkerProvider {
    worker_base_url: String,
    http: reqwest::Client,
    handles: RwLock<HashMap<SessionId, Arc<RemoteWorkerHandle>>>,
}

impl RemoteWorkerProvider {
    /// Point at a worker control plane's base URL (e.g.
    /// `https://worker-1.internal:9443`).
    #[must_use]
    pub fn new(worker_base_url: impl Into<String>) -> Self {
        Self {
            worker_base_url: worker_base_url.into(),
            http: reqwest::Client::new(),
            handles: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SandboxProvider for RemoteWorkerProvider {
    async fn is_available(&self) -> bool {
        self.http
            .get(format!("{}/health", self.worker_base_url))
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    async fn create_sandbox(&self, request: CreateSandboxRequest) -> SandboxResult<Arc<dyn SandboxHandle>> {
        {
            let handles = self.handles.read().await;
            if let Some(existing) = handles.get(&request.session_id) {
                return Ok(existing.clone() as Arc<dyn SandboxHandle>);
            }
        }

        let body = CreateSandboxBody {
            session_id: request.session_id,
            env: &request.env,
            resource_tier: request.resource_tier,
            repo_url: request.repo_url.as_deref(),
            repo_branch: request.repo_branch.as_deref(),
            native_tools_enabled: request.native_tools_enabled,
        };

        let resp: CreateSandboxResponse = self
            .http
            .post(sandboxes_url(&self.worker_base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| SandboxError::Provider(format!("worker create_sandbox failed: {e}")))?
            .json()
            .await
            .map_err(|e| SandboxError::Provider(format!("worker create_sandbox response malformed: {e}")))?;

        // Recorded immediately, before the handle is constructed, so a
        // crash in between never leaves a session with a stale digest.
        let image_digest = resp.image_digest;

        let handle = RemoteWorkerHandle::new(
            self.worker_base_url.clone(),
            SandboxProviderId::new(resp.provider_id),
            resp.bridge_url,
            image_digest,
            self.http.clone(),
            SandboxStatus::Creating,
        );

        self.handles.write().await.insert(request.session_id, handle.clone());
        Ok(handle as Arc<dyn SandboxHandle>)
    }

    async fn get_sandbox(&self, provider_id: &SandboxProviderId) -> SandboxResult<Arc<dyn SandboxHandle>> {
        if let Some(handle) = self.handles.read().await.values().find(|h| &h.provider_id() == provider_id) {
            return Ok(handle.clone() as Arc<dyn SandboxHandle>);
        }

        let resp: WorkerSandboxStatus = self
            .http
            .get(sandbox_url(&self.worker_base_url, provider_id))
            .send()
            .await
            .map_err(|e| SandboxError::Unavailable(format!("worker get_sandbox failed: {e}")))?
            .json()
            .await
            .map_err(|e| SandboxError::Unavailable(format!("worker get_sandbox response malformed: {e}")))?;

        Err(SandboxError::Unavailable(format!(
            "sandbox {provider_id} known to worker (status {}) but not reconstructable without a cached bridge URL",
            resp.status
        )))
    }

    async fn list_sandboxes(&self) -> SandboxResult<Vec<SandboxSummary>> {
        #[derive(Deserialize)]
        struct ListEntry {
            #[serde(rename = "providerId")]
            provider_id: String,
            status: String,
            #[serde(rename = "createdAt")]
            created_at: DateTime<Utc>,
        }

        let entries: Vec<ListEntry> = self
            .http
            .get(sandboxes_url(&self.worker_base_url))
            .send()
            .await
            .map_err(|e| SandboxError::Provider(format!("worker list_sandboxes failed: {e}")))?
            .json()
            .await
            .map_err(|e| SandboxError::Provider(format!("worker list_sandboxes response malformed: {e}")))?;

        Ok(entries
            .into_iter()
            .map(|e| SandboxSummary {
                session_id: None,
                provider_id: SandboxProviderId::new(e.provider_id),
                status: parse_worker_status(&e.status),
                created_at: e.created_at,
            })
            .collect())
    }

    async fn cleanup(&self) -> SandboxResult<()> {
        let resp = self
            .http
            .post(format!("{}/cleanup", self.worker_base_url))
            .send()
            .await
            .map_err(|e| SandboxError::Provider(format!("worker cleanup failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(SandboxError::Provider(format!("worker cleanup returned {}", resp.status())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_url_joins_base_and_id() {
        let id = SandboxProviderId::new("worker-sandbox-42");
        assert_eq!(sandbox_url("https://worker.internal", &id), "https://worker.internal/sandboxes/worker-sandbox-42");
    }

    #[test]
    fn parses_known_worker_statuses() {
        assert_eq!(parse_worker_status("running"), SandboxStatus::Running);
        assert_eq!(parse_worker_status("paused"), SandboxStatus::Paused);
        assert_eq!(parse_worker_status("whatever-unknown"), SandboxStatus::Error);
    }
}
