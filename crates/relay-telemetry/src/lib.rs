//! Logging setup for the relay daemon.
//!
//! # Example
//!
//! ```rust,no_run
//! use relay_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), relay_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Pretty)
//!     .with_directive("relay_sandbox=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("relay starting");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, setup_default_logging, setup_logging};
