//! Tracks open client connections, their session attachments, and fans out
//! journaled events with per-connection sequencing and a bounded replay
//! buffer for short-term resumption.
//!
//! This crate has no notion of WebSockets or RPC framing; it only knows
//! about [`relay_core::ConnectionId`]/[`relay_core::SessionId`] and an
//! `mpsc` sink each connection provides. `relay-server` is the only crate
//! that wires an actual transport to it.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod event;
mod registry;
mod replay;

pub use error::{RegistryError, RegistryResult};
pub use event::{ServerEvent, PROTOCOL_VERSION};
pub use registry::{ConnectionRegistry, EventSink};
