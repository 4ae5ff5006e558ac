//! Top-level error taxonomy and exit outcome.
//!
//! Every subsystem owns its error enum. Only the variants collected here can
//! reach the process exit decision; diagnostics failures are absorbed where
//! they happen and never appear in this type.

use std::process::ExitCode;
use std::time::Duration;

use thiserror::Error;

use crate::cluster::ClusterConfigError;
use crate::config::ConfigError;
use crate::controller::ControllerError;
use crate::net::ListenerError;

/// A fatal cause that terminates the process.
#[derive(Debug, Error)]
pub enum HarvesterError {
    /// Missing or invalid startup option. Reported before anything starts.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The cluster API configuration could not be located or parsed.
    #[error("failed to load cluster configuration: {0}")]
    ClusterConfig(#[from] ClusterConfigError),

    /// One of the management API sockets failed.
    #[error(transparent)]
    Listener(#[from] ListenerError),

    /// The reconciliation runtime reported an unrecoverable error.
    #[error("controller runtime failed: {0}")]
    Controller(#[from] ControllerError),

    /// Termination signal handlers could not be registered.
    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    /// A subsystem task panicked instead of returning.
    #[error("{name} task panicked")]
    SubsystemPanicked { name: &'static str },

    /// Subsystems were still running when the drain grace period ran out.
    #[error("subsystems did not stop within {0:?}")]
    ShutdownTimedOut(Duration),
}

impl HarvesterError {
    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            HarvesterError::Config(_) => "config",
            HarvesterError::ClusterConfig(_) => "cluster_config",
            HarvesterError::Listener(_) => "listener",
            HarvesterError::Controller(_) => "controller",
            HarvesterError::Signals(_) => "signals",
            HarvesterError::SubsystemPanicked { .. } => "panic",
            HarvesterError::ShutdownTimedOut(_) => "shutdown_timeout",
        }
    }
}

/// Result of a full orchestration run.
#[derive(Debug)]
pub enum ExitOutcome {
    /// Shutdown was requested and every subsystem returned without error.
    Clean,
    /// A required subsystem failed, or configuration was rejected.
    Fatal(HarvesterError),
}

impl ExitOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, ExitOutcome::Clean)
    }

    /// The fatal cause, if any.
    pub fn cause(&self) -> Option<&HarvesterError> {
        match self {
            ExitOutcome::Clean => None,
            ExitOutcome::Fatal(cause) => Some(cause),
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            ExitOutcome::Clean => ExitCode::SUCCESS,
            ExitOutcome::Fatal(_) => ExitCode::FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_outcome_has_no_cause() {
        let outcome = ExitOutcome::Clean;
        assert!(outcome.is_clean());
        assert!(outcome.cause().is_none());
    }

    #[test]
    fn fatal_outcome_exposes_cause() {
        let outcome = ExitOutcome::Fatal(HarvesterError::ShutdownTimedOut(Duration::from_secs(3)));
        assert!(!outcome.is_clean());
        assert_eq!(outcome.cause().map(HarvesterError::kind), Some("shutdown_timeout"));
    }
}
