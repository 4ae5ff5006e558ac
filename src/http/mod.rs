//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP or HTTPS connection (net::listener)
//!     → request.rs (request ID assigned or kept)
//!     → server.rs (trace span, timeout, metrics, routes)
//!     → response carries the same x-request-id
//! ```

pub mod request;
pub mod server;

pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{build_router, ApiState};
