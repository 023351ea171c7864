//! Typed client for the bridge process that runs inside every sandbox.
//!
//! The bridge itself is an external collaborator (built and shipped with
//! the sandbox image, out of scope for this crate); this module only
//! defines the contract the relay core needs to talk to it over the
//! provider's internal network. No authentication: the bridge is reachable
//! only from inside the provider's private network, never exposed
//! directly to clients.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{SandboxError, SandboxResult};
use crate::handle::ExecResult;

/// Response from `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeHealth {
    /// Bridge's own reported status string.
    pub status: String,
    /// PID of the agent process the bridge is supervising, if started.
    pub pid: Option<u32>,
    /// Number of WebSocket clients currently attached to the bridge.
    pub ws_clients: u32,
}

/// Client contract for the in-sandbox bridge's HTTP surface. The WebSocket
/// upgrade it also exposes is driven directly by [`crate::channel::SandboxChannel`]
/// rather than through this trait.
#[async_trait]
pub trait BridgeClient: Send + Sync {
    /// `GET /health`.
    async fn health(&self) -> SandboxResult<BridgeHealth>;

    /// `POST /backup` — streams a gzip tar of persistent directories back
    /// to the caller.
    async fn backup(&self) -> SandboxResult<Vec<u8>>;

    /// `POST /restore` — ingests a gzip tar produced by [`Self::backup`]
    /// and starts the agent if it was waiting on restore.
    async fn restore(&self, archive: Vec<u8>) -> SandboxResult<()>;

    /// `POST /start-pi` — starts the agent process the bridge supervises.
    async fn start_agent(&self) -> SandboxResult<()>;

    /// `POST /exec` — runs a command inside the sandbox via the bridge
    /// rather than a direct subprocess spawn (used by backends, like the
    /// remote-worker one, with no other way to reach the sandbox's shell).
    async fn exec(&self, command: &str) -> SandboxResult<ExecResult>;
}

/// HTTP implementation of [`BridgeClient`] against a bridge reachable at
/// `base_url` (e.g. `http://10.0.0.5:7331`).
pub struct HttpBridgeClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpBridgeClient {
    /// Build a client pointed at the bridge's base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct ExecResponse {
    #[serde(rename = "exitCode")]
    exit_code: i32,
    stdout: String,
    stderr: String,
}

#[async_trait]
impl BridgeClient for HttpBridgeClient {
    async fn health(&self) -> SandboxResult<BridgeHealth> {
        self.http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|e| SandboxError::Provider(format!("bridge health check failed: {e}")))?
            .json()
            .await
            .map_err(|e| SandboxError::Provider(format!("bridge health response malformed: {e}")))
    }

    async fn backup(&self) -> SandboxResult<Vec<u8>> {
        let resp = self
            .http
            .post(format!("{}/backup", self.base_url))
            .send()
            .await
            .map_err(|e| SandboxError::Provider(format!("bridge backup failed: {e}")))?;
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| SandboxError::Provider(format!("reading backup archive: {e}")))
    }

    async fn restore(&self, archive: Vec<u8>) -> SandboxResult<()> {
        let resp = self
            .http
            .post(format!("{}/restore", self.base_url))
            .body(archive)
            .send()
            .await
            .map_err(|e| SandboxError::Provider(format!("bridge restore failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(SandboxError::Provider(format!("bridge restore returned {}", resp.status())));
        }
        Ok(())
    }

    async fn start_agent(&self) -> SandboxResult<()> {
        let resp = self
            .http
            .post(format!("{}/start-pi", self.base_url))
            .send()
            .await
            .map_err(|e| SandboxError::Provider(format!("bridge start-agent failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(SandboxError::Provider(format!("bridge start-agent returned {}", resp.status())));
        }
        Ok(())
    }

    async fn exec(&self, command: &str) -> SandboxResult<ExecResult> {
        let resp: ExecResponse = self
            .http
            .post(format!("{}/exec", self.base_url))
            .json(&serde_json::json!({ "command": command }))
            .send()
            .await
            .map_err(|e| SandboxError::Provider(format!("bridge exec failed: {e}")))?
            .json()
            .await
            .map_err(|e| SandboxError::Provider(format!("bridge exec response malformed: {e}")))?;

        let mut output = resp.stdout;
        output.push_str(&resp.stderr);
        Ok(ExecResult {
            exit_code: resp.exit_code,
            output,
        })
    }
}
