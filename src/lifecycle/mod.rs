//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestration (orchestrator.rs):
//!     Init → Validating → Starting → Running → Draining → Terminated
//!
//! Cancellation (shutdown.rs):
//!     one ExecutionContext, cloned into every long-running subsystem
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → cancel root context
//!     second signal or hard timeout → forced exit
//!
//! Seams (subsystem.rs):
//!     ApiServer, Diagnostics, ControllerRuntime → Subsystems
//! ```
//!
//! # Design Decisions
//! - Context is armed before any subsystem begins blocking work
//! - Required subsystems run concurrently, never sequentially
//! - Shutdown is cooperative and bounded by a grace period

pub mod orchestrator;
pub mod shutdown;
pub mod signals;
pub mod subsystem;

pub use orchestrator::{Phase, ProcessOrchestrator, RootContext, DRAIN_MARGIN};
pub use shutdown::ExecutionContext;
pub use subsystem::{ApiServer, Diagnostics, Subsystems};
