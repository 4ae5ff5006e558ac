//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerOptions
//!     → listener.rs (bind http + https concurrently)
//!     → tls.rs (PEM files or self-signed certificate)
//!     → ServerHandle (both sockets bound, one handler)
//!     → serve until the execution context is cancelled
//!
//! Listener States:
//!     Binding → Serving → Draining → Closed
//! ```
//!
//! # Design Decisions
//! - A failed bind never leaves the sibling socket open
//! - Both sockets share one handler tree and one cancellation scope
//! - Graceful stop waits for in-flight requests up to the grace period

pub mod listener;
pub mod tls;

pub use listener::{DualProtocolListener, ListenerError, Protocol, ServerHandle};
