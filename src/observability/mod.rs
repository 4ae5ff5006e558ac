//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields, stdout)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → logging.rs (subscriber installed once by the binary)
//!     → diagnostics.rs (/metrics and /debug/runtime side channel)
//! ```
//!
//! # Design Decisions
//! - Library code only emits; the binary owns subscriber setup
//! - Diagnostics is best-effort and never fatal

pub mod diagnostics;
pub mod logging;
pub mod metrics;
