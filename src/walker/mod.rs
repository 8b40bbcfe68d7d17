//! Concurrent stale-usage walker
//!
//! This module implements a fan-out directory walk with a single fan-in
//! aggregation point.
//!
//! # Architecture
//!
//! ```text
//!        roots ──► Walker task per root
//!                     │  read_dir (holds 1 of N admission tokens)
//!                     ├── subdir ──► register ──► spawn Walker task ...
//!                     └── stale file ──► size stream (mpsc)
//!                                              │
//!   CompletionTracker == 0 ──► closer drops    │
//!                              strong sender   ▼
//!                                         Aggregator ──► UsageSink
//!                                           (progress ticks, final)
//! ```

pub mod admission;
pub mod aggregator;
pub mod coordinator;
pub mod reader;
pub mod tracker;
pub mod walk;

pub use admission::{AdmissionPool, AdmissionToken};
pub use aggregator::{aggregate, SnapshotKind, UsageSink, UsageTotals};
pub use coordinator::{DiskUsageCoordinator, WalkResult};
pub use reader::{DirEntrySnapshot, DirReader, ReadFailure, ReadStats};
pub use tracker::{CompletionTracker, TaskGuard};
pub use walk::{spawn_walker, StaleCutoff, WalkContext};
