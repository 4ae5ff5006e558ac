//! Harvester management server library.

pub mod cluster;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::{RawOptions, StartupOptions};
pub use error::{ExitOutcome, HarvesterError};
pub use lifecycle::{ExecutionContext, Phase, ProcessOrchestrator, RootContext, Subsystems};
