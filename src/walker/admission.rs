//! Admission pool for directory reads
//!
//! A fixed number of tokens bounds how many directory reads may be in
//! flight at once, no matter how wide or deep the tree is. The pool is
//! constructed explicitly and shared by `Arc`, so independent runs (and
//! tests) can use independent limits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Fixed-capacity pool of admission tokens
#[derive(Debug)]
pub struct AdmissionPool {
    /// Permits backing the tokens
    semaphore: Arc<Semaphore>,
    /// Total number of tokens
    capacity: usize,
    /// Tokens currently held
    in_flight: Arc<AtomicUsize>,
    /// Highest number of tokens ever held at once
    peak: Arc<AtomicUsize>,
}

impl AdmissionPool {
    /// Create a pool holding `capacity` tokens
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tokens currently held
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of tokens held at the same time since creation
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Acquire a token, waiting while the pool is exhausted
    ///
    /// The token goes back to the pool when dropped.
    pub async fn acquire(&self) -> AdmissionToken {
        // The semaphore is owned here and never closed
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("admission semaphore closed");

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        AdmissionToken {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

/// One unit of read capacity
///
/// Released on drop, so a read that errors or panics still returns it.
#[derive(Debug)]
pub struct AdmissionToken {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for AdmissionToken {
    fn drop(&mut self) {
        // Decrement before the permit field drops so the counter never
        // exceeds the semaphore's view of outstanding permits.
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
