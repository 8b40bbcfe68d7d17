//! Walk coordinator - drives one stale-usage run using tokio
//!
//! Spawns a walker per root, a closer task that shuts the size stream once
//! every walker has finished, and runs the aggregator on the calling task.

use crate::config::WalkConfig;
use crate::error::{Result, WorkerError};
use crate::walker::admission::AdmissionPool;
use crate::walker::aggregator::{aggregate, UsageSink, UsageTotals};
use crate::walker::reader::{DirReader, ReadFailure, ReadStats};
use crate::walker::tracker::CompletionTracker;
use crate::walker::walk::{spawn_walker, StaleCutoff, WalkContext};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Capacity of the size stream; one value is handed over at a time
const SIZE_STREAM_CAPACITY: usize = 1;

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct WalkResult {
    /// Stale files found and their total size
    pub totals: UsageTotals,
    /// Directories listed successfully
    pub dirs_read: u64,
    /// Directories that could not be listed
    pub unreadable_dirs: u64,
    /// Path and kind of every unreadable directory
    pub failed_reads: Vec<ReadFailure>,
    /// Walker tasks that ended abnormally; their subtrees are not counted
    pub panicked_walkers: u64,
    /// Access-time cutoff used for the whole run
    pub cutoff: DateTime<Utc>,
    /// Highest number of concurrent directory reads observed
    pub peak_concurrent_reads: usize,
    pub duration: Duration,
}

/// Coordinates a concurrent stale-usage walk over one or more roots
pub struct DiskUsageCoordinator {
    config: Arc<WalkConfig>,
    pool: Arc<AdmissionPool>,
}

impl DiskUsageCoordinator {
    /// Create a coordinator with its own admission pool
    ///
    /// Fails with `WalkerError::Config` if the config does not validate.
    pub fn new(config: WalkConfig) -> Result<Self> {
        let pool = Arc::new(AdmissionPool::new(config.max_concurrent_reads));
        Self::with_pool(config, pool)
    }

    /// Create a coordinator that reads through an existing admission pool
    pub fn with_pool(config: WalkConfig, pool: Arc<AdmissionPool>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            pool,
        })
    }

    /// Run the walk to completion
    ///
    /// Must be called within a tokio runtime. Progress snapshots go to
    /// `sink` when the config is verbose; the final snapshot always does.
    pub async fn run<S>(self, sink: &mut S) -> Result<WalkResult>
    where
        S: UsageSink + ?Sized,
    {
        let start_time = Instant::now();
        let cutoff = StaleCutoff::from_now();

        info!(
            roots = self.config.roots.len(),
            max_open_dirs = self.pool.capacity(),
            cutoff = %cutoff.at().to_rfc3339(),
            "Starting stale usage walk"
        );

        let (size_tx, size_rx) = mpsc::channel::<u64>(SIZE_STREAM_CAPACITY);
        let tracker = CompletionTracker::new();
        let stats = Arc::new(ReadStats::default());
        let reader = DirReader::new(Arc::clone(&self.pool), Arc::clone(&stats));
        let ctx = WalkContext::new(reader, Arc::clone(&tracker), size_tx.downgrade(), cutoff);

        // Register every root before any walker can finish
        let guards: Vec<_> = self.config.roots.iter().map(|_| tracker.register()).collect();
        for (root, guard) in self.config.roots.iter().zip(guards) {
            debug!(root = %root.display(), "Spawning root walker");
            spawn_walker(Arc::clone(&ctx), root.clone(), guard);
        }
        drop(ctx);

        // The closer owns the only strong sender
        let closer = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move {
                tracker.wait().await;
                drop(size_tx);
            })
        };

        let totals = aggregate(size_rx, self.config.progress_tick(), sink).await;

        closer.await.map_err(|e| WorkerError::Panicked {
            task: "size-stream-closer",
            message: e.to_string(),
        })?;

        let duration = start_time.elapsed();
        let result = WalkResult {
            totals,
            dirs_read: stats.dirs_read(),
            unreadable_dirs: stats.failures(),
            failed_reads: stats.failed_reads(),
            panicked_walkers: stats.panicked(),
            cutoff: cutoff.at(),
            peak_concurrent_reads: self.pool.peak_in_flight(),
            duration,
        };

        info!(
            files = totals.files,
            bytes = totals.bytes,
            dirs = result.dirs_read,
            unreadable = result.unreadable_dirs,
            panicked = result.panicked_walkers,
            walkers = tracker.total_registered(),
            duration_ms = duration.as_millis() as u64,
            "Stale usage walk completed"
        );

        Ok(result)
    }
}
