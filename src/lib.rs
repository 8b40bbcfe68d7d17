//! stale-du - Disk usage of files nobody has read in a month
//!
//! Walks one or more directory trees concurrently and totals the count and
//! size of every file whose last access time is older than one calendar
//! month before the walk started.
//!
//! # Features
//!
//! - **Task per Directory**: Every subdirectory is walked by its own tokio
//!   task, so wide and deep trees are explored in parallel.
//!
//! - **Bounded Reads**: A fixed pool of admission tokens (48 by default)
//!   caps concurrently open directory reads regardless of tree shape.
//!
//! - **Single Writer Totals**: Walkers only send sizes; one aggregator owns
//!   the totals and reports periodic and final snapshots.
//!
//! - **Best Effort**: Unreadable directories are logged and skipped; the run
//!   always completes.
//!
//! # Example
//!
//! ```bash
//! # Current directory
//! stale-du
//!
//! # Several roots with live progress
//! stale-du /home /srv -v
//! ```

pub mod config;
pub mod error;
pub mod progress;
pub mod walker;

pub use config::{CliArgs, WalkConfig};
pub use error::{Result, WalkerError};
pub use walker::{DiskUsageCoordinator, SnapshotKind, UsageSink, UsageTotals, WalkResult};
