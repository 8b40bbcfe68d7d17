//! stale-du - Disk usage of files not accessed within the last month
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use stale_du::config::{CliArgs, WalkConfig};
use stale_du::progress::{print_header, print_summary, PlainReporter, ProgressReporter};
use stale_du::walker::{DiskUsageCoordinator, SnapshotKind, UsageSink, UsageTotals, WalkResult};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    let plain = args.plain;

    // Validate and create config
    let config = WalkConfig::from_args(args).context("Invalid configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.threads)
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    if plain {
        let mut sink = PlainReporter::stdout();
        runtime.block_on(run_walk(config, &mut sink))?;
        return Ok(());
    }

    print_header(&config.roots, config.max_concurrent_reads);

    let result = if config.verbose {
        let mut reporter = ProgressReporter::new();
        reporter.set_status("Walking...");
        runtime.block_on(run_walk(config, &mut reporter))?
    } else {
        let mut sink = |_: UsageTotals, _: SnapshotKind| {};
        runtime.block_on(run_walk(config, &mut sink))?
    };

    print_summary(&result);

    Ok(())
}

async fn run_walk<S>(config: WalkConfig, sink: &mut S) -> Result<WalkResult>
where
    S: UsageSink,
{
    let coordinator = DiskUsageCoordinator::new(config)?;
    let result = coordinator.run(sink).await.context("Walk failed")?;

    if result.unreadable_dirs > 0 || result.panicked_walkers > 0 {
        info!(
            unreadable = result.unreadable_dirs,
            panicked = result.panicked_walkers,
            "Walk completed with skipped subtrees; totals undercount them"
        );
    }

    Ok(result)
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("stale_du=debug,warn")
        } else {
            EnvFilter::new("stale_du=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
