//! Reconciliation controller runtime.
//!
//! # Data Flow
//! ```text
//! producers (API handlers, watchers)
//!     → workqueue.rs (de-duplicated WorkItems)
//!     → manager.rs (threadiness workers)
//!     → Reconciler::reconcile(key)
//!     → Done | Requeue | RequeueAfter | Transient error (backoff.rs) | Fatal error
//! ```
//!
//! # Design Decisions
//! - The orchestrator only sees `ControllerRuntime::run`; retries stay inside
//! - A fatal reconcile error stops every worker and is returned once
//! - Workers observe the shared execution context and exit when it cancels

pub mod backoff;
pub mod manager;
pub mod workqueue;

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use kube::Config as ClusterConfig;
use crate::lifecycle::shutdown::ExecutionContext;

pub use backoff::Backoff;
pub use manager::ControllerManager;
pub use workqueue::{WorkItem, WorkQueue};

/// Error type for the controller runtime.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// A reconciler gave up on an item.
    #[error("controller {controller} failed on {key}: {reason}")]
    Unrecoverable {
        controller: String,
        key: String,
        reason: String,
    },

    /// The runtime returned although nobody asked it to stop.
    #[error("controller runtime exited before shutdown was requested")]
    ExitedEarly,

    /// A worker task panicked.
    #[error("reconcile worker panicked")]
    WorkerPanicked,
}

/// Runs reconciliation loops until cancelled.
#[async_trait]
pub trait ControllerRuntime: Send + Sync {
    /// Run `threadiness` workers until `ctx` is cancelled.
    ///
    /// Returns promptly after cancellation. An error before cancellation is
    /// fatal for the process.
    async fn run(&self, ctx: ExecutionContext, threadiness: NonZeroUsize) -> Result<(), ControllerError>;
}

/// What to do with a key after a successful reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Done,
    Requeue,
    RequeueAfter(Duration),
}

/// Reconcile failure.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Retried with backoff.
    #[error("{0}")]
    Transient(String),
    /// Stops the runtime.
    #[error("{0}")]
    Fatal(String),
}

/// Drives one resource kind toward its desired state.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Controller name; work items are routed by it.
    fn name(&self) -> &str;

    async fn reconcile(&self, key: &str, ctx: &ReconcileContext) -> Result<Action, ReconcileError>;
}

/// Read-only state handed to every reconcile call.
#[derive(Debug, Clone)]
pub struct ReconcileContext {
    pub cluster: Arc<ClusterConfig>,
    /// Namespace holding management resources.
    pub namespace: String,
}

impl ReconcileContext {
    pub fn new(cluster: Arc<ClusterConfig>, namespace: String) -> Self {
        Self { cluster, namespace }
    }
}
