//! Structured logging.
//!
//! # Responsibilities
//! - Install the process-wide tracing subscriber once, at startup
//! - Map the debug/trace flags to a level filter
//! - Select the output format
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the flags when set
//! - Everything goes to stdout so the fatal cause lands next to the rest

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

/// Level selected by the verbosity flags. Trace wins over debug.
pub fn level(debug: bool, trace: bool) -> LevelFilter {
    if trace {
        LevelFilter::TRACE
    } else if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init(debug: bool, trace: bool, format: LogFormat) -> Result<(), TryInitError> {
    let selected = level(debug, trace);
    let filter = EnvFilter::builder()
        .with_default_directive(selected.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stdout))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stdout))
            .try_init(),
        LogFormat::Simple => registry
            .with(fmt::layer().compact().with_target(false).with_writer(std::io::stdout))
            .try_init(),
    };

    if result.is_ok() {
        tracing::debug!(level = %selected, format = ?format, "Logging initialized");
    }
    result
}
