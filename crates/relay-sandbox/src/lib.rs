//! Sandbox provider abstraction: a uniform lifecycle over heterogeneous
//! backends (local process, remote worker, and — as a documented extension
//! point — microVM), plus the duplex channel each backend's attach
//! produces.
//!
//! This crate knows nothing about sessions, journals, or RPC framing;
//! `relay-engine` is the only crate that wires a [`SandboxProvider`] to the
//! rest of the system.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod bridge;
mod channel;
mod error;
mod handle;
mod host_dirs;
mod local_process;
mod provider;
mod remote_worker;
mod status;

pub use bridge::{BridgeClient, BridgeHealth, HttpBridgeClient};
pub use channel::{SandboxChannel, StderrRing};
pub use error::{SandboxError, SandboxResult};
pub use handle::{ExecResult, PtyHandle, SandboxHandle};
pub use host_dirs::{materialize_git_identity, materialize_secrets, prepare_session_dirs, strip_token_from_url, SessionDirs};
pub use local_process::{LocalProcessHandle, LocalProcessProvider};
pub use provider::{CreateSandboxRequest, SandboxProvider, SandboxSummary};
pub use remote_worker::{RemoteWorkerHandle, RemoteWorkerProvider};
pub use status::{Capabilities, SandboxStatus};
