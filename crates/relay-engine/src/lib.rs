//! Session lifecycle state machine, sandbox orchestration, and native tool
//! bridging.
//!
//! This crate owns the one thing none of its dependencies own alone: the
//! decision of what a session's live, in-memory state looks like and how it
//! moves between the states `relay_core::SessionStatus` names. It composes
//! `relay-storage` (persisted rows), `relay-journal` (the event log),
//! `relay-registry` (connection fanout), and `relay-sandbox` (the process or
//! container backing each session) into a single [`SessionEngine`] facade.

mod broker;
mod catalog;
mod engine;
mod error;
mod idle_watcher;
mod manager;
mod session_task;

pub use broker::{NativeToolBroker, ToolCallOutcome};
pub use catalog::{all_models, for_provider, ModelInfo};
pub use engine::{ActivationResult, CreateSessionParams, SessionEngine};
pub use error::{EngineError, EngineResult};
pub use idle_watcher::{IdleWatcher, IdleWatcherHandle};
pub use manager::{SandboxCreation, SandboxManager};
