//! Recursive walker
//!
//! Each directory gets its own tokio task. A task lists its directory,
//! registers and spawns one child task per subdirectory, and sends the size
//! of every stale non-directory entry into the size stream. It deregisters
//! once its own listing is done; children keep their own registrations.

use crate::walker::reader::{DirEntrySnapshot, DirReader};
use crate::walker::tracker::{CompletionTracker, TaskGuard};
use chrono::{DateTime, Datelike, Months, TimeDelta, Timelike, Utc};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::WeakSender;
use tracing::{debug, trace, warn};

/// Access-time threshold for a run
///
/// Computed once when the walk starts and shared by every task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleCutoff(DateTime<Utc>);

impl StaleCutoff {
    /// Same day and time one month before `now`
    ///
    /// A day that does not exist in the previous month rolls over into the
    /// following one: Mar 31 gives Mar 2 in a leap year and Mar 3 otherwise.
    pub fn one_month_before(now: DateTime<Utc>) -> Self {
        let at = now
            .with_day(1)
            .and_then(|first| first.checked_sub_months(Months::new(1)))
            .and_then(|first| first.checked_add_signed(TimeDelta::days(i64::from(now.day0()))))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self(at)
    }

    /// One calendar month before the current time
    pub fn from_now() -> Self {
        Self::one_month_before(Utc::now())
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.0
    }

    /// True when `accessed`, at whole-second precision, is strictly before
    /// the cutoff
    pub fn is_stale(&self, accessed: DateTime<Utc>) -> bool {
        let accessed = accessed.with_nanosecond(0).unwrap_or(accessed);
        accessed < self.0
    }
}

/// State shared by every walker task of one run
#[derive(Debug)]
pub struct WalkContext {
    reader: DirReader,
    tracker: Arc<CompletionTracker>,
    sizes: WeakSender<u64>,
    cutoff: StaleCutoff,
}

impl WalkContext {
    /// `sizes` is weak: the stream stays open only while its owner keeps the
    /// strong sender, so walkers can never hold it open or close it.
    pub fn new(
        reader: DirReader,
        tracker: Arc<CompletionTracker>,
        sizes: WeakSender<u64>,
        cutoff: StaleCutoff,
    ) -> Arc<Self> {
        Arc::new(Self {
            reader,
            tracker,
            sizes,
            cutoff,
        })
    }

    /// Size to report for `entry`, if it counts
    fn stale_size(&self, entry: &DirEntrySnapshot) -> Option<u64> {
        match entry.accessed {
            Some(accessed) if self.cutoff.is_stale(accessed) => Some(entry.size),
            Some(_) => None,
            None => {
                debug!(path = %entry.path.display(), "Skipping entry without access time");
                None
            }
        }
    }

    async fn emit(&self, size: u64) {
        let Some(tx) = self.sizes.upgrade() else {
            warn!(size, "Size stream closed while walkers were still running");
            return;
        };
        if tx.send(size).await.is_err() {
            warn!(size, "Size stream receiver dropped");
        }
    }
}

/// Spawn a walker task for `dir`
///
/// `guard` is the task's registration, taken by the caller before spawning.
pub fn spawn_walker(ctx: Arc<WalkContext>, dir: PathBuf, guard: TaskGuard) {
    let walk = walk_dir(Arc::clone(&ctx), dir.clone());
    spawn_supervised(ctx, dir, guard, walk);
}

/// Run `walk` on its own task and keep the registration until it has ended
///
/// A panicking walk is logged with its directory and counted before the
/// guard is released, so the run's result always includes it.
fn spawn_supervised<F>(ctx: Arc<WalkContext>, dir: PathBuf, guard: TaskGuard, walk: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = tokio::spawn(walk).await {
            ctx.reader.stats().record_panic();
            warn!(path = %dir.display(), error = %e, "Walker task failed; subtree not counted");
        }
        drop(guard);
    });
}

async fn walk_dir(ctx: Arc<WalkContext>, dir: PathBuf) {
    let entries = ctx.reader.read(&dir).await;
    trace!(path = %dir.display(), entries = entries.len(), "Walking directory");

    for entry in entries {
        if entry.is_dir {
            let child = ctx.tracker.register();
            spawn_walker(Arc::clone(&ctx), entry.path, child);
        } else if let Some(size) = ctx.stale_size(&entry) {
            ctx.emit(size).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::admission::AdmissionPool;
    use crate::walker::reader::ReadStats;
    use chrono::TimeZone;
    use filetime::{set_file_atime, FileTime};
    use std::fs;
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    fn write_aged(path: &Path, len: usize, age: Duration) {
        fs::write(path, vec![0u8; len]).unwrap();
        let atime = FileTime::from_system_time(SystemTime::now() - age);
        set_file_atime(path, atime).unwrap();
    }

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[test]
    fn test_cutoff_is_one_calendar_month() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let cutoff = StaleCutoff::one_month_before(now);
        assert_eq!(cutoff.at(), Utc.with_ymd_and_hms(2024, 2, 15, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_cutoff_rolls_over_short_month_leap_year() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();
        let cutoff = StaleCutoff::one_month_before(now);
        assert_eq!(cutoff.at(), Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_cutoff_rolls_over_short_month() {
        let now = Utc.with_ymd_and_hms(2023, 3, 31, 18, 45, 10).unwrap();
        let cutoff = StaleCutoff::one_month_before(now);
        assert_eq!(cutoff.at(), Utc.with_ymd_and_hms(2023, 3, 3, 18, 45, 10).unwrap());

        let now = Utc.with_ymd_and_hms(2023, 5, 31, 9, 0, 0).unwrap();
        let cutoff = StaleCutoff::one_month_before(now);
        assert_eq!(cutoff.at(), Utc.with_ymd_and_hms(2023, 5, 1, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_cutoff_crosses_year_boundary() {
        let now = Utc.with_ymd_and_hms(2025, 1, 20, 6, 0, 0).unwrap();
        let cutoff = StaleCutoff::one_month_before(now);
        assert_eq!(cutoff.at(), Utc.with_ymd_and_hms(2024, 12, 20, 6, 0, 0).unwrap());
    }

    #[test]
    fn test_cutoff_keeps_subsecond_part() {
        let now = Utc
            .with_ymd_and_hms(2024, 7, 4, 1, 2, 3)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        let cutoff = StaleCutoff::one_month_before(now);
        assert_eq!(cutoff.at().nanosecond(), 123_456_789);
        assert_eq!(cutoff.at().day(), 4);
        assert_eq!(cutoff.at().month(), 6);
    }

    #[test]
    fn test_is_stale_is_strict() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 8, 30, 0).unwrap();
        let cutoff = StaleCutoff::one_month_before(now);
        assert!(!cutoff.is_stale(cutoff.at()));
        assert!(cutoff.is_stale(cutoff.at() - chrono::Duration::seconds(1)));
        assert!(!cutoff.is_stale(now));
    }

    #[test]
    fn test_is_stale_truncates_to_seconds() {
        let now = Utc
            .with_ymd_and_hms(2024, 6, 10, 8, 30, 0)
            .unwrap()
            .with_nanosecond(700_000_000)
            .unwrap();
        let cutoff = StaleCutoff::one_month_before(now);
        // Later than the cutoff by a fraction of a second, earlier once truncated
        let accessed = cutoff.at() + chrono::Duration::milliseconds(200);
        assert!(cutoff.is_stale(accessed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_walk_emits_only_stale_sizes() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        write_aged(&dir.path().join("old.bin"), 100, 40 * DAY);
        write_aged(&dir.path().join("a/old.bin"), 20, 90 * DAY);
        write_aged(&dir.path().join("a/b/old.bin"), 3, 365 * DAY);
        write_aged(&dir.path().join("a/b/new.bin"), 7000, DAY);

        let (tx, mut rx) = mpsc::channel::<u64>(1);
        let tracker = CompletionTracker::new();
        let reader = DirReader::new(
            Arc::new(AdmissionPool::new(2)),
            Arc::new(ReadStats::default()),
        );
        let ctx = WalkContext::new(reader, Arc::clone(&tracker), tx.downgrade(), StaleCutoff::from_now());

        spawn_walker(ctx, dir.path().to_path_buf(), tracker.register());

        let closer = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move {
                tracker.wait().await;
                drop(tx);
            })
        };

        let mut sizes = Vec::new();
        while let Some(size) = rx.recv().await {
            sizes.push(size);
        }
        closer.await.unwrap();

        sizes.sort_unstable();
        assert_eq!(sizes, vec![3, 20, 100]);
        assert_eq!(tracker.total_registered(), 3);
    }

    #[tokio::test]
    async fn test_panicked_walker_is_counted_and_deregistered() {
        let (tx, _rx) = mpsc::channel::<u64>(1);
        let tracker = CompletionTracker::new();
        let stats = Arc::new(ReadStats::default());
        let reader = DirReader::new(Arc::new(AdmissionPool::new(1)), Arc::clone(&stats));
        let ctx = WalkContext::new(reader, Arc::clone(&tracker), tx.downgrade(), StaleCutoff::from_now());

        spawn_supervised(ctx, PathBuf::from("/data/broken"), tracker.register(), async {
            panic!("walker blew up");
        });

        tokio::time::timeout(Duration::from_secs(5), tracker.wait())
            .await
            .expect("tracker never reached zero");
        assert_eq!(stats.panicked(), 1);
        assert_eq!(tracker.outstanding(), 0);
    }
}
