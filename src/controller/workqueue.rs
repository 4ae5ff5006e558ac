//! De-duplicating work queue shared by all workers.
//!
//! # Responsibilities
//! - Hand each queued item to exactly one worker
//! - Collapse repeated enqueues of an item that is still waiting
//! - Never let two workers hold the same item at once
//!
//! # Design Decisions
//! - An item is "dirty" from enqueue until a worker takes it and
//!   "processing" from take until `done`. Both transitions happen under one
//!   lock, so a change arriving mid-reconcile queues exactly one more pass
//! - Unbounded: producers never block on slow workers

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

/// One unit of work: a key for one registered controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkItem {
    pub controller: String,
    pub key: String,
}

impl WorkItem {
    pub fn new(controller: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.controller, self.key)
    }
}

#[derive(Default)]
struct State {
    queue: VecDeque<WorkItem>,
    dirty: HashSet<WorkItem>,
    processing: HashSet<WorkItem>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    ready: Notify,
}

/// Shared queue; cheap to clone.
#[derive(Clone, Default)]
pub struct WorkQueue {
    inner: Arc<Inner>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mark `item` dirty. Returns false if it was already waiting.
    ///
    /// An item currently being processed is parked until [`WorkQueue::done`].
    pub fn add(&self, item: WorkItem) -> bool {
        let mut state = self.state();
        if !state.dirty.insert(item.clone()) {
            return false;
        }
        if !state.processing.contains(&item) {
            state.queue.push_back(item);
            drop(state);
            self.inner.ready.notify_one();
        }
        true
    }

    /// Take the next item, waiting until one is available.
    ///
    /// The caller owns the item until it calls [`WorkQueue::done`].
    pub async fn next(&self) -> WorkItem {
        loop {
            let notified = self.inner.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if let Some(item) = state.queue.pop_front() {
                    state.dirty.remove(&item);
                    state.processing.insert(item.clone());
                    return item;
                }
            }

            notified.await;
        }
    }

    /// Release `item`. If it was re-added meanwhile it goes back on the queue.
    pub fn done(&self, item: &WorkItem) {
        let mut state = self.state();
        state.processing.remove(item);
        if state.dirty.contains(item) {
            state.queue.push_back(item.clone());
            drop(state);
            self.inner.ready.notify_one();
        }
    }

    /// Number of items waiting.
    pub fn len(&self) -> usize {
        self.state().dirty.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
