//! Transactional persistence for the relay: sessions, environments, client
//! registrations, and secrets.
//!
//! All rows are `SurrealDB` documents. In production this is an embedded
//! `SurrealKV`-backed database (see [`Database::connect_embedded`]); tests
//! and the local-process sandbox backend's development mode use
//! [`Database::connect_memory`] instead. The stores in this crate are the
//! only code in the workspace that touches `SurrealQL` directly —
//! `relay-engine` only ever sees [`SessionRow`], [`EnvironmentRow`],
//! [`ClientRegistrationRow`], and decrypted secret maps.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod client_store;
mod db;
mod environment_store;
mod error;
mod journal_store;
mod models;
mod secret_cipher;
mod secret_store;
mod session_store;

pub use client_store::ClientStore;
pub use db::Database;
pub use environment_store::EnvironmentStore;
pub use error::{StorageError, StorageResult};
pub use journal_store::SurrealJournalStore;
pub use models::{ClientCapabilities, ClientRegistrationRow, EnvironmentRow, SecretRow, SessionRow};
pub use secret_cipher::SecretKey;
pub use secret_store::SecretStore;
pub use session_store::SessionStore;
