//! Work-queue backed controller runtime.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinSet;

use crate::controller::{
    Action, Backoff, ControllerError, ControllerRuntime, ReconcileContext, ReconcileError,
    Reconciler, WorkItem, WorkQueue,
};
use crate::lifecycle::shutdown::ExecutionContext;
use crate::observability::metrics;

/// Runs registered reconcilers on a pool of workers.
pub struct ControllerManager {
    reconcilers: HashMap<String, Arc<dyn Reconciler>>,
    queue: WorkQueue,
    context: ReconcileContext,
    backoff: Backoff,
}

impl ControllerManager {
    pub fn new(context: ReconcileContext) -> Self {
        Self {
            reconcilers: HashMap::new(),
            queue: WorkQueue::new(),
            context,
            backoff: Backoff::default(),
        }
    }

    /// Add a reconciler. A later one with the same name replaces the earlier.
    pub fn register(mut self, reconciler: Arc<dyn Reconciler>) -> Self {
        self.reconcilers
            .insert(reconciler.name().to_string(), reconciler);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Handle for scheduling work.
    pub fn queue(&self) -> WorkQueue {
        self.queue.clone()
    }

    pub fn controllers(&self) -> impl Iterator<Item = &str> {
        self.reconcilers.keys().map(String::as_str)
    }
}

#[async_trait]
impl ControllerRuntime for ControllerManager {
    async fn run(&self, ctx: ExecutionContext, threadiness: NonZeroUsize) -> Result<(), ControllerError> {
        let scope = ctx.child();
        let shared = Arc::new(Shared {
            reconcilers: self.reconcilers.clone(),
            queue: self.queue.clone(),
            context: self.context.clone(),
            backoff: self.backoff,
            failures: DashMap::new(),
            scope: scope.clone(),
        });

        let mut workers = JoinSet::new();
        for id in 0..threadiness.get() {
            workers.spawn(worker(id, shared.clone()));
        }
        tracing::info!(
            workers = threadiness.get(),
            controllers = self.reconcilers.len(),
            "Controller workers started"
        );

        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(ControllerError::WorkerPanicked),
                Err(_) => Ok(()),
            };
            if let Err(e) = result {
                // Stop the sibling workers; keep only the first cause.
                scope.cancel();
                first_error.get_or_insert(e);
            }
        }

        tracing::info!("Controller workers stopped");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct Shared {
    reconcilers: HashMap<String, Arc<dyn Reconciler>>,
    queue: WorkQueue,
    context: ReconcileContext,
    backoff: Backoff,
    failures: DashMap<WorkItem, u32>,
    scope: ExecutionContext,
}

async fn worker(id: usize, shared: Arc<Shared>) -> Result<(), ControllerError> {
    loop {
        let item = tokio::select! {
            biased;
            _ = shared.scope.cancelled() => break,
            item = shared.queue.next() => item,
        };

        tracing::trace!(worker = id, item = %item, "Processing work item");
        tokio::select! {
            biased;
            _ = shared.scope.cancelled() => break,
            result = process(&shared, item.clone()) => {
                shared.queue.done(&item);
                result?
            }
        }
    }
    tracing::debug!(worker = id, "Worker exiting");
    Ok(())
}

async fn process(shared: &Shared, item: WorkItem) -> Result<(), ControllerError> {
    let Some(reconciler) = shared.reconcilers.get(&item.controller) else {
        tracing::warn!(item = %item, "No controller registered for work item");
        return Ok(());
    };

    let start = Instant::now();
    match reconciler.reconcile(&item.key, &shared.context).await {
        Ok(action) => {
            shared.failures.remove(&item);
            metrics::record_reconcile(&item.controller, "ok", start);
            match action {
                Action::Done => {}
                Action::Requeue => {
                    shared.queue.add(item);
                }
                Action::RequeueAfter(delay) => requeue_after(shared, item, delay),
            }
            Ok(())
        }
        Err(ReconcileError::Transient(reason)) => {
            let attempt = {
                let mut failures = shared.failures.entry(item.clone()).or_insert(0);
                *failures += 1;
                *failures
            };
            let delay = shared.backoff.delay(attempt);
            metrics::record_reconcile(&item.controller, "retry", start);
            tracing::warn!(item = %item, attempt, delay = ?delay, error = %reason, "Reconcile failed, requeueing");
            requeue_after(shared, item, delay);
            Ok(())
        }
        Err(ReconcileError::Fatal(reason)) => {
            metrics::record_reconcile(&item.controller, "fatal", start);
            tracing::error!(item = %item, error = %reason, "Reconcile failed unrecoverably");
            Err(ControllerError::Unrecoverable {
                controller: item.controller,
                key: item.key,
                reason,
            })
        }
    }
}

/// Re-add `item` after `delay` unless the runtime stops first.
fn requeue_after(shared: &Shared, item: WorkItem, delay: Duration) {
    let queue = shared.queue.clone();
    let scope = shared.scope.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                queue.add(item);
            }
            _ = scope.cancelled() => {}
        }
    });
}
