//! Completion tracking for walker tasks
//!
//! A latch over outstanding walker tasks. Every task is registered before it
//! is spawned and deregisters by dropping its [`TaskGuard`]. The count
//! reaches zero exactly once; [`CompletionTracker::wait`] returns after that.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

/// Shared counter of outstanding walker tasks
#[derive(Debug, Default)]
pub struct CompletionTracker {
    outstanding: AtomicUsize,
    /// Total registrations over the tracker's lifetime
    registered: AtomicUsize,
    zero: Notify,
}

impl CompletionTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register one more outstanding task
    ///
    /// Must be called by the spawner before the task is spawned, so the
    /// count can't touch zero while work remains.
    pub fn register(self: &Arc<Self>) -> TaskGuard {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        self.registered.fetch_add(1, Ordering::Relaxed);
        TaskGuard {
            tracker: Arc::clone(self),
        }
    }

    /// Tasks registered and not yet finished
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Tasks registered since creation
    pub fn total_registered(&self) -> usize {
        self.registered.load(Ordering::Relaxed)
    }

    /// Wait until every registered task has finished
    pub async fn wait(&self) {
        loop {
            // Created before the check so a concurrent notify_waiters is not lost
            let notified = self.zero.notified();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn finish_one(&self) {
        let prev = self.outstanding.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0, "completion tracker underflow");
        if prev == 1 {
            debug!(tasks = self.total_registered(), "All walker tasks finished");
            self.zero.notify_waiters();
        }
    }
}

/// Registration of one walker task
///
/// Dropping it deregisters the task, including when the task panics.
#[derive(Debug)]
pub struct TaskGuard {
    tracker: Arc<CompletionTracker>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.tracker.finish_one();
    }
}
