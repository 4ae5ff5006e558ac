//! Harvester management server.
//!
//! # Architecture Overview
//!
//! ```text
//!   flags + env + options file
//!            │
//!            ▼
//!   ┌─────────────────┐      invalid       ┌──────────────┐
//!   │ config validate │───────────────────▶│ Fatal, exit 1│
//!   └────────┬────────┘                    └──────────────┘
//!            │ StartupOptions (Arc)
//!            ▼
//!   ┌─────────────────┐   SIGTERM/SIGINT   ┌───────────────────┐
//!   │   orchestrator  │◀───────────────────│ signal watcher    │
//!   └────────┬────────┘                    └───────────────────┘
//!            │ shared ExecutionContext
//!   ┌────────┼──────────────┬─────────────────────┐
//!   ▼        ▼              ▼                     ▼
//! diagnostics  controllers   HTTP listener   HTTPS listener
//! (best-effort) (N workers)  └──── one axum Router ────┘
//! ```

use std::process::ExitCode;

use clap::Parser;

use harvester::config::{Cli, LogFormat};
use harvester::observability::{logging, metrics};
use harvester::{ExitOutcome, ProcessOrchestrator, RootContext, Subsystems};

#[tokio::main]
async fn main() -> ExitCode {
    let raw = match Cli::parse().into_raw_options() {
        Ok(raw) => raw,
        Err(e) => {
            let _ = logging::init(false, false, LogFormat::default());
            tracing::error!(error = %e, "Failed to load options");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(raw.debug, raw.trace, raw.log_format.unwrap_or_default()) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }
    metrics::install();

    tracing::info!(
        version = harvester::config::cli::VERSION,
        commit = harvester::config::cli::GIT_COMMIT,
        "harvester starting"
    );

    let outcome = ProcessOrchestrator::new()
        .run(raw, RootContext::Signals, Subsystems::production)
        .await;

    match &outcome {
        ExitOutcome::Clean => tracing::info!("Shutdown complete"),
        ExitOutcome::Fatal(cause) => {
            tracing::error!(kind = cause.kind(), error = %cause, "harvester exited with error");
        }
    }
    outcome.exit_code()
}
