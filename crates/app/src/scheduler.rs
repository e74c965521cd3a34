//! Action scheduler — the time-ordered queue of pending action
//! invocations.
//!
//! Items become ready when their `ready_at` instant passes; within the
//! same instant they are FIFO by sequence number. Readiness is measured
//! with [`tokio::time::Instant`] so the dispatcher behaves correctly
//! under tokio's paused test clock. Items are owned exclusively by this
//! queue and removed once popped.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use driphub_domain::id::ExecutionId;
use driphub_domain::time::Timestamp;

/// One pending action invocation.
#[derive(Debug, Clone)]
pub struct QueuedAction {
    pub execution_id: ExecutionId,
    /// Index into the owning rule's action list.
    pub action_index: usize,
    /// When the action becomes dispatchable.
    pub ready_at: Instant,
    /// Wall-clock time the item was enqueued, for observability.
    pub scheduled_at: Timestamp,
    seq: u64,
}

impl PartialEq for QueuedAction {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueuedAction {}

impl PartialOrd for QueuedAction {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedAction {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ready_at
            .cmp(&other.ready_at)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Min-queue of [`QueuedAction`]s ordered by readiness, FIFO within the
/// same instant.
#[derive(Default)]
pub struct ActionQueue {
    heap: Mutex<BinaryHeap<Reverse<QueuedAction>>>,
    seq: AtomicU64,
}

impl ActionQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an action to run after `delay`.
    pub fn schedule(
        &self,
        execution_id: ExecutionId,
        action_index: usize,
        delay: Duration,
        scheduled_at: Timestamp,
    ) {
        let item = QueuedAction {
            execution_id,
            action_index,
            ready_at: Instant::now() + delay,
            scheduled_at,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        self.heap.lock().expect("queue lock poisoned").push(Reverse(item));
    }

    /// Pop every item whose `ready_at` is at or before `now`, in order.
    #[must_use]
    pub fn pop_ready(&self, now: Instant) -> Vec<QueuedAction> {
        let mut heap = self.heap.lock().expect("queue lock poisoned");
        let mut ready = Vec::new();
        while heap.peek().is_some_and(|Reverse(item)| item.ready_at <= now) {
            let Reverse(item) = heap.pop().expect("peeked item present");
            ready.push(item);
        }
        ready
    }

    /// Drop all pending items for an execution. Returns how many were
    /// removed.
    pub fn remove_execution(&self, execution_id: ExecutionId) -> usize {
        let mut heap = self.heap.lock().expect("queue lock poisoned");
        let before = heap.len();
        heap.retain(|Reverse(item)| item.execution_id != execution_id);
        before - heap.len()
    }

    /// Number of pending items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.lock().expect("queue lock poisoned").len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
