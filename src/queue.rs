//! Thread-safe FIFO of pending jobs.
//!
//! Producers `put` from any thread; the single worker blocks on `pop`.
//! Arrival order is preserved, but fairness between producers racing to
//! submit at the same instant is left to the mutex. The queue itself knows
//! nothing about the store; draining for cancellation or refresh is driven
//! by [`crate::service::JobService`].

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::script::CheckScript;
use crate::types::{CheckId, JobId};

/// One pending execution: the job record's identity plus the already
/// loaded, hash-verified script instance. The submitter owns the item until
/// it is dequeued; after that the worker does.
pub struct QueueItem {
    pub job_id: JobId,
    pub check_id: CheckId,
    pub script: Box<dyn CheckScript>,
}

#[derive(Default)]
struct State {
    items: VecDeque<QueueItem>,
    closed: bool,
}

/// FIFO queue feeding the worker.
#[derive(Default)]
pub struct JobQueue {
    state: Mutex<State>,
    available: Condvar,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item. Items pushed after `close` are dropped.
    pub fn put(&self, item: QueueItem) {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        if state.closed {
            return;
        }
        state.items.push_back(item);
        self.available.notify_one();
    }

    /// Block until an item is available or the queue is closed.
    ///
    /// Returns `None` only after `close` with the backlog fully drained.
    pub fn pop_blocking(&self) -> Option<QueueItem> {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self.available.wait(state).expect("queue mutex poisoned");
        }
    }

    /// Remove and return everything currently queued.
    pub fn drain(&self) -> Vec<QueueItem> {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        state.items.drain(..).collect()
    }

    /// Job ids currently in the queue, front first.
    pub fn pending_job_ids(&self) -> Vec<JobId> {
        let state = self.state.lock().expect("queue mutex poisoned");
        state.items.iter().map(|i| i.job_id).collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("queue mutex poisoned").items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wake the worker and let it exit once the backlog is drained.
    pub fn close(&self) {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        state.closed = true;
        self.available.notify_all();
    }
}
