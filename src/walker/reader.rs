//! Bounded directory reader
//!
//! Lists a single directory while holding an admission token. The blocking
//! `read_dir` and per-entry `lstat` calls run on tokio's blocking pool, so
//! the token count also bounds how many blocking threads are busy reading.

use crate::error::ReadDirError;
use crate::walker::admission::AdmissionPool;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Snapshot of one directory entry, taken at read time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntrySnapshot {
    /// File name within the parent
    pub name: OsString,
    /// Full path (parent joined with name)
    pub path: PathBuf,
    /// True for directories (symlinks are not followed)
    pub is_dir: bool,
    /// Size in bytes
    pub size: u64,
    /// Last access time, if the platform reports one
    pub accessed: Option<DateTime<Utc>>,
}

impl DirEntrySnapshot {
    fn from_metadata(name: OsString, path: PathBuf, meta: &fs::Metadata) -> Self {
        let accessed = match meta.accessed() {
            Ok(t) => Some(DateTime::<Utc>::from(t)),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Access time unavailable");
                None
            }
        };

        Self {
            name,
            path,
            is_dir: meta.is_dir(),
            size: meta.len(),
            accessed,
        }
    }
}

/// A directory that could not be listed during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFailure {
    pub path: PathBuf,
    /// Permission denied or vanished, as opposed to an unexpected I/O error
    pub recoverable: bool,
}

/// Counters kept by the reader and its walkers
#[derive(Debug, Default)]
pub struct ReadStats {
    dirs_read: AtomicU64,
    panicked: AtomicU64,
    failed: Mutex<Vec<ReadFailure>>,
}

impl ReadStats {
    pub fn record_read(&self) {
        self.dirs_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, err: &ReadDirError) {
        self.failed.lock().push(ReadFailure {
            path: err.path.clone(),
            recoverable: err.is_recoverable(),
        });
    }

    /// A walker task ended abnormally; its subtree is missing from the totals
    pub fn record_panic(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dirs_read(&self) -> u64 {
        self.dirs_read.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failed.lock().len() as u64
    }

    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }

    /// Unreadable directories in the order they were hit
    pub fn failed_reads(&self) -> Vec<ReadFailure> {
        self.failed.lock().clone()
    }
}

/// Directory reader gated by an admission pool
#[derive(Debug, Clone)]
pub struct DirReader {
    pool: Arc<AdmissionPool>,
    stats: Arc<ReadStats>,
}

impl DirReader {
    pub fn new(pool: Arc<AdmissionPool>, stats: Arc<ReadStats>) -> Self {
        Self { pool, stats }
    }

    pub fn pool(&self) -> &Arc<AdmissionPool> {
        &self.pool
    }

    pub fn stats(&self) -> &Arc<ReadStats> {
        &self.stats
    }

    /// List the immediate entries of `dir`
    ///
    /// Never fails: an unreadable directory is logged, counted, and
    /// reported as having no entries.
    pub async fn read(&self, dir: &Path) -> Vec<DirEntrySnapshot> {
        match self.try_read(dir).await {
            Ok(entries) => {
                self.stats.record_read();
                entries
            }
            Err(e) => {
                self.stats.record_failure(&e);
                if e.is_recoverable() {
                    warn!(path = %e.path.display(), error = %e.source, "Skipping unreadable directory");
                } else {
                    error!(path = %e.path.display(), error = %e.source, "Unexpected error reading directory; skipping");
                }
                Vec::new()
            }
        }
    }

    async fn try_read(&self, dir: &Path) -> Result<Vec<DirEntrySnapshot>, ReadDirError> {
        let _token = self.pool.acquire().await;

        let owned = dir.to_path_buf();
        match tokio::task::spawn_blocking(move || list_dir(&owned)).await {
            Ok(result) => result,
            Err(join_err) => Err(ReadDirError::new(
                dir,
                std::io::Error::new(std::io::ErrorKind::Other, join_err.to_string()),
            )),
        }
    }
}

/// Blocking listing of one directory
///
/// Entries that vanish between listing and `lstat` are skipped; only a
/// failure to open or iterate the directory itself is an error.
pub fn list_dir(dir: &Path) -> Result<Vec<DirEntrySnapshot>, ReadDirError> {
    let iter = fs::read_dir(dir).map_err(|e| ReadDirError::new(dir, e))?;

    let mut entries = Vec::new();
    for entry in iter {
        let entry = entry.map_err(|e| ReadDirError::new(dir, e))?;
        let path = entry.path();

        // DirEntry::metadata does not traverse symlinks
        match entry.metadata() {
            Ok(meta) => entries.push(DirEntrySnapshot::from_metadata(entry.file_name(), path, &meta)),
            Err(e) => debug!(path = %path.display(), error = %e, "Entry vanished before stat"),
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn reader(capacity: usize) -> DirReader {
        DirReader::new(
            Arc::new(AdmissionPool::new(capacity)),
            Arc::new(ReadStats::default()),
        )
    }

    #[test]
    fn test_list_dir_entries() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let mut entries = list_dir(dir.path()).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, OsString::from("a.txt"));
        assert!(!entries[0].is_dir);
        assert_eq!(entries[0].size, 5);
        assert!(entries[0].accessed.is_some());
        assert_eq!(entries[1].name, OsString::from("sub"));
        assert!(entries[1].is_dir);
        assert_eq!(entries[1].path, dir.path().join("sub"));
    }

    #[test]
    fn test_list_dir_missing() {
        let dir = tempdir().unwrap();
        let err = list_dir(&dir.path().join("nope")).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_read_failure_is_empty_and_counted() {
        let dir = tempdir().unwrap();
        let reader = reader(4);

        let entries = reader.read(&dir.path().join("missing")).await;
        assert!(entries.is_empty());
        assert_eq!(reader.stats().failures(), 1);
        assert_eq!(reader.stats().dirs_read(), 0);
        assert_eq!(reader.pool().in_flight(), 0);
        assert_eq!(
            reader.stats().failed_reads(),
            vec![ReadFailure {
                path: dir.path().join("missing"),
                recoverable: true,
            }]
        );
    }

    #[tokio::test]
    async fn test_read_file_is_not_a_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, b"x").unwrap();

        let reader = reader(1);
        assert!(reader.read(&file).await.is_empty());
        assert_eq!(reader.stats().failures(), 1);

        // Not a permission or existence problem, so it is reported as unexpected
        let failed = reader.stats().failed_reads();
        assert_eq!(failed[0].path, file);
        assert!(!failed[0].recoverable);
    }

    #[tokio::test]
    async fn test_failures_keep_every_path() {
        let dir = tempdir().unwrap();
        let reader = reader(2);

        reader.read(&dir.path().join("one")).await;
        reader.read(dir.path()).await;
        reader.read(&dir.path().join("two")).await;

        let paths: Vec<_> = reader.stats().failed_reads().into_iter().map(|f| f.path).collect();
        assert_eq!(paths, vec![dir.path().join("one"), dir.path().join("two")]);
        assert_eq!(reader.stats().dirs_read(), 1);
    }

    #[tokio::test]
    async fn test_read_releases_token() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("f"), b"abc").unwrap();

        let reader = reader(1);
        assert_eq!(reader.read(dir.path()).await.len(), 1);
        assert_eq!(reader.read(dir.path()).await.len(), 1);
        assert_eq!(reader.pool().in_flight(), 0);
        assert_eq!(reader.pool().peak_in_flight(), 1);
        assert_eq!(reader.stats().dirs_read(), 2);
    }
}
