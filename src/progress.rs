//! Progress reporting for the stale-usage walker
//!
//! Two snapshot sinks: an indicatif spinner for interactive use and a plain
//! line writer for scripts. The summary printer formats a finished run.

use crate::walker::{ReadFailure, SnapshotKind, UsageSink, UsageTotals, WalkResult};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{HumanCount, ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::warn;

/// Unreadable directories listed by name in the summary
const SUMMARY_FAILED_PATHS: usize = 5;

/// Spinner that shows the latest snapshot
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,

    started: Instant,
}

impl ProgressReporter {
    /// Spinner redrawn at the default snapshot cadence
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.yellow} {elapsed:>4} stale so far: {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            bar,
            started: Instant::now(),
        }
    }

    /// Update the progress display
    pub fn update(&self, totals: &UsageTotals) {
        let secs = self.started.elapsed().as_secs_f64();
        let rate = if secs > 0.0 { totals.files as f64 / secs } else { 0.0 };

        let msg = format!(
            "{} files, {} ({:.0} files/s)",
            HumanCount(totals.files),
            format_size(totals.bytes, BINARY),
            rate,
        );

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageSink for ProgressReporter {
    fn snapshot(&mut self, totals: UsageTotals, kind: SnapshotKind) {
        match kind {
            SnapshotKind::Progress => self.update(&totals),
            SnapshotKind::Final => self.finish_and_clear(),
        }
    }
}

/// Writes every snapshot as a `"<files> files <size> GB"` line
pub struct PlainReporter<W> {
    out: W,
}

impl PlainReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> PlainReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> UsageSink for PlainReporter<W> {
    fn snapshot(&mut self, totals: UsageTotals, _kind: SnapshotKind) {
        if let Err(e) = writeln!(self.out, "{}", format_plain(&totals)) {
            warn!(error = %e, "Failed to write snapshot");
        }
    }
}

/// Plain one-line rendering of a snapshot
pub fn format_plain(totals: &UsageTotals) -> String {
    format!("{} files {:.6} GB", totals.files, totals.gigabytes())
}

/// Names of the first unreadable directories, then a count of the rest
fn failed_path_lines(failed: &[ReadFailure]) -> Vec<String> {
    let mut lines: Vec<String> = failed
        .iter()
        .take(SUMMARY_FAILED_PATHS)
        .map(|f| f.path.display().to_string())
        .collect();
    if failed.len() > SUMMARY_FAILED_PATHS {
        lines.push(format!("... and {} more", failed.len() - SUMMARY_FAILED_PATHS));
    }
    lines
}

/// Print a summary of the walk results
pub fn print_summary(result: &WalkResult) {
    let totals = &result.totals;
    let duration_secs = result.duration.as_secs_f64();

    println!();
    println!("{}", style("Walk Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Stale files:").bold(),
        HumanCount(totals.files)
    );
    println!(
        "  {} {} ({} bytes)",
        style("Total size:").bold(),
        format_size(totals.bytes, BINARY),
        HumanCount(totals.bytes)
    );
    println!(
        "  {} {}",
        style("Not accessed since:").bold(),
        result.cutoff.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "  {} {} ({:.1}s)",
        style("Directories:").bold(),
        HumanCount(result.dirs_read),
        duration_secs
    );
    if result.unreadable_dirs > 0 {
        println!(
            "  {} {}",
            style("Unreadable:").yellow().bold(),
            HumanCount(result.unreadable_dirs)
        );
        for line in failed_path_lines(&result.failed_reads) {
            println!("    {}", style(line).dim());
        }
    }
    if result.panicked_walkers > 0 {
        println!(
            "  {} {}",
            style("Walker failures:").red().bold(),
            HumanCount(result.panicked_walkers)
        );
    }
    println!();
}

/// Print a header at the start of the walk
pub fn print_header(roots: &[PathBuf], max_open_dirs: usize) {
    println!();
    println!(
        "{} {}",
        style("stale-du").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    for root in roots {
        println!("  {} {}", style("Root:").bold(), root.display());
    }
    println!("  {} {}", style("Max open dirs:").bold(), max_open_dirs);
    println!();
}
