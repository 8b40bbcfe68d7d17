//! Usage aggregation and snapshot reporting
//!
//! The aggregator is the only writer of the running totals. It drains the
//! size stream, optionally reports a snapshot on a fixed cadence, and
//! reports the final totals exactly once after the stream closes.

use std::future;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::debug;

/// Running totals of stale files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageTotals {
    pub files: u64,
    pub bytes: u64,
}

impl UsageTotals {
    pub fn record(&mut self, size: u64) {
        self.files += 1;
        self.bytes += size;
    }

    /// Total size in decimal gigabytes
    pub fn gigabytes(&self) -> f64 {
        self.bytes as f64 / 1e9
    }
}

/// Why a snapshot was emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    /// Periodic snapshot while the walk is running
    Progress,
    /// Totals after every walker has finished
    Final,
}

/// Receiver of usage snapshots
pub trait UsageSink: Send {
    fn snapshot(&mut self, totals: UsageTotals, kind: SnapshotKind);
}

impl<F> UsageSink for F
where
    F: FnMut(UsageTotals, SnapshotKind) + Send,
{
    fn snapshot(&mut self, totals: UsageTotals, kind: SnapshotKind) {
        self(totals, kind)
    }
}

/// Consume `sizes` until it closes, then report and return the totals
///
/// With `tick` set, a progress snapshot is reported every `tick`, the first
/// one a full period after start.
pub async fn aggregate<S>(mut sizes: Receiver<u64>, tick: Option<Duration>, sink: &mut S) -> UsageTotals
where
    S: UsageSink + ?Sized,
{
    let mut totals = UsageTotals::default();
    let mut ticker = tick.map(|period| {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            size = sizes.recv() => match size {
                Some(size) => totals.record(size),
                None => break,
            },
            _ = next_tick(&mut ticker) => {
                ticks += 1;
                sink.snapshot(totals, SnapshotKind::Progress);
            }
        }
    }

    debug!(files = totals.files, bytes = totals.bytes, ticks, "Size stream closed");
    sink.snapshot(totals, SnapshotKind::Final);
    totals
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending::<()>().await,
    }
}
