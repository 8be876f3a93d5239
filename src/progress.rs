//! Outcome reporting.
//!
//! Workers hand every [`ReconciliationOutcome`] to a [`Reporter`]. Two are
//! provided:
//!
//! - [`LogReporter`]: one log line per outcome, at a level matching how bad
//!   it is. Every line names the group hash and the affected path.
//! - [`Progress`]: an indicatif spinner counting groups, which still logs
//!   through [`LogReporter`] with the bar suspended.
//!
//! # Accessible Mode
//!
//! With accessible mode the spinner is replaced by plain text with a slow
//! tick and no animation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::dispatch::RunSummary;
use crate::manifest::DuplicateGroup;
use crate::reconcile::{FailureReason, ReconciliationOutcome};

/// Observer for a dispatch run.
///
/// Called from worker threads, so implementations must be thread-safe.
pub trait Reporter: Send + Sync {
    /// Called once before the first group, with the worker count.
    fn on_start(&self, _workers: usize) {}

    /// Called once per reconciled group.
    fn on_group(&self, group: &DuplicateGroup, outcome: &ReconciliationOutcome);

    /// Called once after all workers are joined.
    fn on_finish(&self, _summary: &RunSummary) {}
}

/// Logs each outcome through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn on_group(&self, group: &DuplicateGroup, outcome: &ReconciliationOutcome) {
        let first = group.members.first().map_or("", String::as_str);
        match outcome {
            ReconciliationOutcome::AlreadyComplete => {
                log::debug!("group {}: {outcome} ({first})", group.hash);
            }
            ReconciliationOutcome::LinkedMissing(_) => {
                log::info!("group {}: {outcome} ({first})", group.hash);
            }
            ReconciliationOutcome::AllMissing { .. } => {
                log::error!("group {}: {outcome}", group.hash);
            }
            ReconciliationOutcome::PartialFailure(FailureReason::Links {
                representative,
                linked,
                failures,
            }) => {
                for failure in failures {
                    log::error!(
                        "group {}: cannot link {} to {}: {}",
                        group.hash,
                        failure.path.display(),
                        representative.display(),
                        failure.error
                    );
                }
                log::warn!(
                    "group {}: linked {linked}, failed {} ({first})",
                    group.hash,
                    failures.len()
                );
            }
            ReconciliationOutcome::PartialFailure(_) => {
                log::error!("group {}: {outcome} ({first})", group.hash);
            }
        }
    }

    fn on_finish(&self, summary: &RunSummary) {
        let verb = if summary.dry_run { "planned" } else { "created" };
        log::info!(
            "{} group(s): {} complete, {} repaired, {} link(s) {verb}, {} all-missing, {} failed",
            summary.groups,
            summary.already_complete,
            summary.repaired,
            summary.links_created,
            summary.all_missing,
            summary.partial_failures
        );
        if summary.interrupted {
            log::warn!("Run interrupted before the manifest was exhausted");
        }
    }
}

/// Forwards every event to each reporter in order.
pub struct Fanout<'a>(pub Vec<&'a dyn Reporter>);

impl Reporter for Fanout<'_> {
    fn on_start(&self, workers: usize) {
        self.0.iter().for_each(|r| r.on_start(workers));
    }

    fn on_group(&self, group: &DuplicateGroup, outcome: &ReconciliationOutcome) {
        self.0.iter().for_each(|r| r.on_group(group, outcome));
    }

    fn on_finish(&self, summary: &RunSummary) {
        self.0.iter().for_each(|r| r.on_finish(summary));
    }
}

/// Spinner over the group count, logging through [`LogReporter`].
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    links: AtomicUsize,
    quiet: bool,
    accessible: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no spinner is displayed (outcomes are still logged).
    ///
    /// # Examples
    ///
    /// ```
    /// use relink::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self::with_accessible(quiet, false)
    }

    /// Create a new progress reporter with accessible mode.
    #[must_use]
    pub fn with_accessible(quiet: bool, accessible: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            links: AtomicUsize::new(0),
            quiet,
            accessible,
        }
    }

    /// Check if accessible mode is enabled.
    #[must_use]
    pub fn is_accessible(&self) -> bool {
        self.accessible
    }

    fn style(&self) -> ProgressStyle {
        if self.accessible {
            ProgressStyle::with_template("{msg} [{elapsed_precise}] {pos} groups")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
        } else {
            ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} groups")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        }
    }

    fn bar(&self) -> Option<ProgressBar> {
        self.bar.lock().ok().and_then(|bar| bar.clone())
    }
}

impl Reporter for Progress {
    fn on_start(&self, workers: usize) {
        if self.quiet {
            return;
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(self.style());
        pb.set_message(format!("Reconciling ({workers} workers)"));
        let tick_rate = if self.accessible { 500 } else { 100 };
        pb.enable_steady_tick(Duration::from_millis(tick_rate));
        if let Ok(mut bar) = self.bar.lock() {
            *bar = Some(pb);
        }
    }

    fn on_group(&self, group: &DuplicateGroup, outcome: &ReconciliationOutcome) {
        let Some(pb) = self.bar() else {
            LogReporter.on_group(group, outcome);
            return;
        };
        pb.suspend(|| LogReporter.on_group(group, outcome));
        let links = self.links.fetch_add(outcome.links_created(), Ordering::Relaxed)
            + outcome.links_created();
        pb.set_message(format!("Reconciling, {links} link(s)"));
        pb.inc(1);
    }

    fn on_finish(&self, summary: &RunSummary) {
        if let Some(pb) = self.bar.lock().ok().and_then(|mut bar| bar.take()) {
            pb.finish_and_clear();
        }
        LogReporter.on_finish(summary);
    }
}
