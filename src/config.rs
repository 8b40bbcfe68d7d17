//! Configuration types for stale-du
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Default number of directory reads allowed in flight at once
pub const DEFAULT_MAX_CONCURRENT_READS: usize = 48;

/// Default progress cadence in verbose mode
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Maximum reasonable runtime thread count
const MAX_THREADS: usize = 1024;

/// Report disk usage of files not accessed within the last month
#[derive(Parser, Debug, Clone)]
#[command(
    name = "stale-du",
    version,
    about = "Disk usage of files not accessed within the last month",
    long_about = "Walks one or more directory trees concurrently and totals the count and size\n\
                  of every file whose last access time is older than one calendar month.",
    after_help = "EXAMPLES:\n    \
        stale-du\n    \
        stale-du /home /srv -v\n    \
        stale-du /data --plain -v --interval-ms 500"
)]
pub struct CliArgs {
    /// Directories to scan (defaults to the current directory)
    #[arg(value_name = "ROOT")]
    pub roots: Vec<PathBuf>,

    /// Show periodic progress and debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Print snapshots as plain "<files> files <size> GB" lines
    #[arg(long)]
    pub plain: bool,

    /// Maximum directories read concurrently
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT_READS, value_name = "NUM")]
    pub max_open_dirs: usize,

    /// Progress reporting interval in milliseconds (verbose only)
    #[arg(long, default_value = "100", value_name = "MS")]
    pub interval_ms: u64,

    /// Number of runtime worker threads
    #[arg(long, default_value_t = default_threads(), value_name = "NUM")]
    pub threads: usize,
}

fn default_threads() -> usize {
    num_cpus::get()
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// Root directories, never empty
    pub roots: Vec<PathBuf>,

    /// Emit periodic progress snapshots
    pub verbose: bool,

    /// Capacity of the directory-read admission pool
    pub max_concurrent_reads: usize,

    /// Cadence of progress snapshots
    pub progress_interval: Duration,

    /// Runtime worker threads
    pub threads: usize,
}

impl WalkConfig {
    /// Configuration with defaults for the given roots
    ///
    /// An empty root list means the current directory.
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut roots: Vec<PathBuf> = roots.into_iter().map(Into::into).collect();
        if roots.is_empty() {
            roots.push(PathBuf::from("."));
        }

        Self {
            roots,
            verbose: false,
            max_concurrent_reads: DEFAULT_MAX_CONCURRENT_READS,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            threads: default_threads(),
        }
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if let Some(index) = args.roots.iter().position(|r| r.as_os_str().is_empty()) {
            return Err(ConfigError::EmptyRoot { index });
        }

        if args.threads == 0 || args.threads > MAX_THREADS {
            return Err(ConfigError::InvalidThreadCount {
                count: args.threads,
                max: MAX_THREADS,
            });
        }

        let config = Self::new(args.roots)
            .verbose(args.verbose)
            .max_concurrent_reads(args.max_open_dirs)
            .progress_interval(Duration::from_millis(args.interval_ms));

        config.validate()?;

        Ok(Self {
            threads: args.threads,
            ..config
        })
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn max_concurrent_reads(mut self, count: usize) -> Self {
        self.max_concurrent_reads = count;
        self
    }

    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Check invariants the walker relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_reads == 0 {
            return Err(ConfigError::InvalidConcurrency {
                count: self.max_concurrent_reads,
            });
        }

        if self.progress_interval.is_zero() {
            return Err(ConfigError::InvalidInterval {
                millis: self.progress_interval.as_millis() as u64,
            });
        }

        Ok(())
    }

    /// Progress cadence, only when verbose
    pub fn progress_tick(&self) -> Option<Duration> {
        self.verbose.then_some(self.progress_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("stale-du").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_default_root() {
        let config = WalkConfig::from_args(parse(&[])).unwrap();
        assert_eq!(config.roots, vec![PathBuf::from(".")]);
        assert!(!config.verbose);
        assert_eq!(config.max_concurrent_reads, 48);
        assert_eq!(config.progress_tick(), None);
    }

    #[test]
    fn test_roots_keep_order() {
        let config = WalkConfig::from_args(parse(&["/b", "/a", "-v"])).unwrap();
        assert_eq!(config.roots, vec![PathBuf::from("/b"), PathBuf::from("/a")]);
        assert_eq!(config.progress_tick(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = WalkConfig::from_args(parse(&["--max-open-dirs", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConcurrency { count: 0 }));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = WalkConfig::from_args(parse(&["--interval-ms", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInterval { millis: 0 }));
    }

    #[test]
    fn test_thread_bounds() {
        let err = WalkConfig::from_args(parse(&["--threads", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidThreadCount { count: 0, .. }));
    }

    #[test]
    fn test_builder_setters() {
        let config = WalkConfig::new(["/x"])
            .verbose(true)
            .max_concurrent_reads(4)
            .progress_interval(Duration::from_millis(5));
        assert_eq!(config.max_concurrent_reads, 4);
        assert_eq!(config.progress_tick(), Some(Duration::from_millis(5)));
        assert!(config.validate().is_ok());
    }
}
