//! `relayd` — the relay server core's daemon binary.
//!
//! A thin entry point: parse CLI args, load configuration, wire every
//! collaborator `relay-engine`/`relay-server` need, bind the RPC server,
//! and block until a shutdown signal arrives. Grounded on
//! `astrid-cli::daemon_main` (clap `Parser`, `tracing` setup, `ctrl_c`
//! select, ordered shutdown-then-cleanup), adapted to the relay's
//! single-instance pid lock and background idle watcher rather than the
//! teacher's ephemeral-mode client-count monitor.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]

mod error;
mod lifecycle;
mod paths;
mod startup;

use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;

use crate::paths::DaemonPaths;

/// Relay daemon — brokers conversational agent sessions between clients
/// and sandboxed agent processes.
#[derive(Parser)]
#[command(name = "relayd")]
#[command(author, version, about = "Relay server core daemon")]
struct Args {
    /// Path to a TOML config file. Falls back to embedded defaults layered
    /// with `RELAY_*`/`PORT` environment variables if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the state directory (pid/port files, embedded database,
    /// per-session host directories).
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    let log_config = relay_telemetry::LogConfig::new(level);
    if let Err(e) = relay_telemetry::setup_logging(&log_config) {
        eprintln!("failed to initialize logging: {e}");
    }

    let config = relay_config::Config::load(args.config.as_deref())?;
    let state_dir = paths::resolve_state_dir(args.state_dir.as_deref(), &config.storage.state_dir);
    let paths = DaemonPaths::ensure(&state_dir)?;

    let _lock = lifecycle::acquire(&paths)?;

    let daemon = startup::start(&config, &paths).await?;
    println!("{}", format!("relayd listening on {}", daemon.addr).cyan().bold());
    let _ = &daemon.facade; // kept alive for whichever HTTP layer wires it in front of this process

    tokio::signal::ctrl_c().await?;
    println!("\n{}", "shutting down relay daemon...".yellow());

    drop(daemon.idle_watcher);
    daemon.handle.stop()?;
    daemon.handle.stopped().await;

    lifecycle::cleanup(&paths);
    println!("{}", "relay daemon stopped".green().bold());
    Ok(())
}
