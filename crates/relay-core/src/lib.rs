//! Shared identifiers, error taxonomy, and resource types used across the
//! relay core crates.
//!
//! This crate has no dependency on the other `relay-*` crates; everything
//! here is a leaf type that `relay-storage`, `relay-journal`,
//! `relay-registry`, `relay-sandbox`, `relay-engine`, and `relay-server`
//! all build on.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod ids;
pub mod resource;
pub mod session;

pub use error::{ErrorKind, RelayError, RelayResult};
pub use ids::{ClientId, ConnectionId, EnvironmentId, SandboxProviderId, SessionId};
pub use resource::{ResourceLimits, ResourceTier};
pub use session::{ClientKind, Mode, SessionStatus};
