//! relink - restore hardlinks between duplicate files
//!
//! Reads a hash manifest sorted by hash, groups entries that share hash and
//! size, and makes every member of a group that exists on disk a hardlink of
//! the first one found. Groups are reconciled concurrently on a bounded
//! worker pool.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod links;
pub mod logging;
pub mod manifest;
pub mod output;
pub mod progress;
pub mod reconcile;
pub mod signal;

use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use cli::Cli;
use config::Config;
use dispatch::{DispatchConfig, Dispatcher};
use error::ExitCode;
use links::{native_search, HardlinkEnumerator, LinkEnumerator, SearchScope};
use manifest::GroupStream;
use output::{CsvReport, JsonSummary};
use progress::{Fanout, LogReporter, Progress, Reporter};
use reconcile::linker::FsLinker;
use reconcile::GroupReconciler;

/// Initial buffer for single-file enumeration, small so growth is exercised.
const ENUMERATE_BUFFER_LEN: usize = 2;

/// Run relink with parsed arguments.
///
/// # Errors
///
/// Returns an error for anything fatal to the run: a missing or malformed
/// manifest, an invalid explicit config file, a failed enumeration in
/// `--enumerate` mode, or a worker that could not be started or panicked.
/// Per-group failures are not errors; they yield [`ExitCode::PartialSuccess`].
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    if let Some(path) = &cli.enumerate {
        let stdout = io::stdout();
        print_links(path, &mut stdout.lock())?;
        return Ok(ExitCode::Success);
    }

    let config = Config::load(cli.config.as_deref())?.apply_cli(&cli);
    log::debug!("Effective configuration: {:?}", config);

    let handler = signal::install_handler()?;
    reconcile_manifest(&config, &cli, handler.get_flag())
}

/// Write every name linked to `path`, one per line. Returns the count.
///
/// # Errors
///
/// Returns an error if enumeration or writing fails.
pub fn print_links<W: Write>(path: &Path, out: &mut W) -> Result<usize> {
    let mut enumerator =
        HardlinkEnumerator::with_buffer_len(native_search(SearchScope::Volume), ENUMERATE_BUFFER_LEN);
    let links = enumerator
        .enumerate(path)
        .with_context(|| format!("cannot enumerate hardlinks of {}", path.display()))?;

    for name in links.iter() {
        writeln!(out, "{}", name.display())?;
    }
    log::debug!("{} name(s) for {}", links.len(), path.display());
    Ok(links.len())
}

fn reconcile_manifest(
    config: &Config,
    cli: &Cli,
    shutdown: Arc<AtomicBool>,
) -> Result<ExitCode> {
    let started = Instant::now();
    let mut groups = GroupStream::open(&config.manifest)?;

    log::info!(
        "Reconciling {} under {}{}",
        config.manifest.display(),
        config.root.display(),
        if config.dry_run { " (dry run)" } else { "" }
    );

    let log_reporter = LogReporter;
    let progress = cli
        .progress
        .then(|| Progress::with_accessible(cli.quiet, cli.accessible));
    let report = cli
        .report
        .as_deref()
        .map(CsvReport::create)
        .transpose()
        .context("cannot create report")?;

    let mut reporters: Vec<&dyn Reporter> = vec![match &progress {
        Some(progress) => progress as &dyn Reporter,
        None => &log_reporter,
    }];
    if let Some(report) = &report {
        reporters.push(report);
    }
    let reporter = Fanout(reporters);

    let dispatcher = Dispatcher::new(
        DispatchConfig::default()
            .with_workers(config.workers)
            .with_channel_capacity(config.channel_capacity)
            .with_shutdown_flag(shutdown)
            .with_dry_run(config.dry_run),
    );
    let linker = FsLinker::new().with_dry_run(config.dry_run);
    let make_reconciler = || {
        let search = native_search(SearchScope::Root(config.root.clone()));
        GroupReconciler::new(
            config.root.clone(),
            HardlinkEnumerator::with_buffer_len(search, config.initial_buffer),
            linker,
        )
    };

    let result = dispatcher.run(&mut groups, make_reconciler, &reporter);
    drop(reporter);
    if let Some(report) = report {
        report.finish().context("cannot write report")?;
    }
    let summary =
        result.with_context(|| format!("reconciliation of {} failed", config.manifest.display()))?;

    let exit_code = if summary.interrupted {
        ExitCode::Interrupted
    } else if summary.has_failures() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    };

    if cli.summary_json {
        let json = JsonSummary::new(&summary, groups.records_read(), started.elapsed(), exit_code);
        json.write_to(&mut io::stdout().lock(), true)?;
    }
    Ok(exit_code)
}
