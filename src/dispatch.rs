//! Concurrent group dispatch.
//!
//! # Overview
//!
//! [`Dispatcher::run`] is one producer and W workers joined by a bounded
//! queue:
//!
//! - The producer runs on the calling thread. It pulls groups from the
//!   stream and blocks on `send` while the queue is full.
//! - Each worker owns its own reconciler (and so its own link buffer),
//!   receives groups until the queue is closed and drained, and returns a
//!   [`RunSummary`] of what it did.
//! - The producer closes the queue by dropping the sender: at end of input,
//!   on a manifest error, or when the shutdown flag is raised.
//!
//! Every worker is joined before `run` returns, whatever the reason it stops.
//! A group is handed to exactly one worker; nothing is shared between workers
//! except the filesystem.

use std::io;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Serialize;
use thiserror::Error;

use crate::manifest::{DuplicateGroup, ManifestError};
use crate::progress::Reporter;
use crate::reconcile::{FailureReason, Reconcile, ReconciliationOutcome};

/// Default queue capacity between the producer and the workers.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Worker count when none is configured: the available parallelism.
#[must_use]
pub fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Configuration for [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Number of worker threads (min 1).
    pub workers: usize,
    /// Queue capacity in groups (min 1).
    pub channel_capacity: usize,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Marks the summary as a dry run; reconcilers decide what that means.
    pub dry_run: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            shutdown_flag: None,
            dry_run: false,
        }
    }
}

impl DispatchConfig {
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Error type for a dispatch run.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The manifest could not be read to the end.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// A worker thread could not be started.
    #[error("failed to spawn worker {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: io::Error,
    },

    /// A worker thread panicked; the groups it held are unaccounted for.
    #[error("worker {index} panicked")]
    WorkerPanicked { index: usize },
}

/// Tallies for a run, summed over all workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Groups reconciled
    pub groups: usize,
    /// Groups whose members were already fully linked
    pub already_complete: usize,
    /// Groups brought to full linkage by creating links
    pub repaired: usize,
    /// Links created, or planned in dry-run
    pub links_created: usize,
    /// Individual links that could not be created
    pub link_failures: usize,
    /// Groups with no member on disk
    pub all_missing: usize,
    /// Groups that could not be brought to full linkage
    pub partial_failures: usize,
    /// Whether the run was stopped by the shutdown flag
    pub interrupted: bool,
    /// Whether links were only planned
    pub dry_run: bool,
}

impl RunSummary {
    /// Count one reconciled group.
    pub fn record(&mut self, outcome: &ReconciliationOutcome) {
        self.groups += 1;
        self.links_created += outcome.links_created();
        match outcome {
            ReconciliationOutcome::AlreadyComplete | ReconciliationOutcome::LinkedMissing(0) => {
                self.already_complete += 1;
            }
            ReconciliationOutcome::LinkedMissing(_) => self.repaired += 1,
            ReconciliationOutcome::AllMissing { .. } => self.all_missing += 1,
            ReconciliationOutcome::PartialFailure(reason) => {
                self.partial_failures += 1;
                if let FailureReason::Links { failures, .. } = reason {
                    self.link_failures += failures.len();
                }
            }
        }
    }

    /// Add another worker's tallies to this one.
    pub fn merge(&mut self, other: &RunSummary) {
        self.groups += other.groups;
        self.already_complete += other.already_complete;
        self.repaired += other.repaired;
        self.links_created += other.links_created;
        self.link_failures += other.link_failures;
        self.all_missing += other.all_missing;
        self.partial_failures += other.partial_failures;
        self.interrupted |= other.interrupted;
        self.dry_run |= other.dry_run;
    }

    /// Whether any group ended short of full linkage.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.all_missing > 0 || self.partial_failures > 0
    }
}

/// Bounded worker pool over a group stream.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    config: DispatchConfig,
}

impl Dispatcher {
    #[must_use]
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Reconcile every group of `groups` on the worker pool.
    ///
    /// `make_reconciler` is called once per worker, on that worker's thread.
    /// `reporter` sees every outcome as it happens, from whichever worker
    /// produced it.
    ///
    /// # Errors
    ///
    /// Returns the first fatal condition after all workers are joined:
    /// a manifest error, then a worker panic, then a spawn failure.
    pub fn run<I, F, R>(
        &self,
        groups: I,
        make_reconciler: F,
        reporter: &dyn Reporter,
    ) -> Result<RunSummary, DispatchError>
    where
        I: IntoIterator<Item = Result<DuplicateGroup, ManifestError>>,
        F: Fn() -> R + Sync,
        R: Reconcile,
    {
        let workers = self.config.workers.max(1);
        let (sender, receiver) = bounded::<DuplicateGroup>(self.config.channel_capacity.max(1));
        log::debug!(
            "Dispatching with {} worker(s), queue capacity {}",
            workers,
            self.config.channel_capacity.max(1)
        );
        reporter.on_start(workers);

        let make_reconciler = &make_reconciler;
        let (mut summary, result) = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            let mut spawn_error = None;

            for index in 0..workers {
                let queue = receiver.clone();
                let spawned = thread::Builder::new()
                    .name(format!("relink-worker-{index}"))
                    .spawn_scoped(scope, move || work(make_reconciler(), queue, reporter));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(source) => {
                        log::error!("Failed to spawn worker {index}: {source}");
                        spawn_error = Some(DispatchError::Spawn { index, source });
                        break;
                    }
                }
            }
            drop(receiver);

            let produced = if spawn_error.is_none() {
                self.produce(groups, &sender)
            } else {
                Ok(false)
            };
            drop(sender);

            let mut summary = RunSummary::default();
            let mut panicked = None;
            for (index, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(part) => summary.merge(&part),
                    Err(_) => {
                        log::error!("Worker {index} panicked");
                        panicked.get_or_insert(index);
                    }
                }
            }

            let result = match produced {
                Err(e) => Err(DispatchError::Manifest(e)),
                Ok(interrupted) => {
                    summary.interrupted = interrupted;
                    match (panicked, spawn_error) {
                        (Some(index), _) => Err(DispatchError::WorkerPanicked { index }),
                        (None, Some(e)) => Err(e),
                        (None, None) => Ok(()),
                    }
                }
            };
            (summary, result)
        });

        summary.interrupted |= self.config.is_shutdown_requested();
        summary.dry_run = self.config.dry_run;
        reporter.on_finish(&summary);
        result.map(|()| summary)
    }

    /// Feed the queue; `Ok(true)` if stopped by the shutdown flag.
    fn produce<I>(&self, groups: I, sender: &Sender<DuplicateGroup>) -> Result<bool, ManifestError>
    where
        I: IntoIterator<Item = Result<DuplicateGroup, ManifestError>>,
    {
        for group in groups {
            if self.config.is_shutdown_requested() {
                log::info!("Shutdown requested, no further groups will be queued");
                return Ok(true);
            }
            let group = group?;
            if sender.send(group).is_err() {
                // Only happens once every worker has exited.
                log::error!("No worker left to receive groups");
                break;
            }
        }
        Ok(false)
    }
}

/// Worker body: reconcile until the queue is closed and drained.
fn work<R: Reconcile>(
    mut reconciler: R,
    queue: Receiver<DuplicateGroup>,
    reporter: &dyn Reporter,
) -> RunSummary {
    let mut summary = RunSummary::default();
    for group in queue {
        let outcome = reconciler.reconcile(&group);
        reporter.on_group(&group, &outcome);
        summary.record(&outcome);
    }
    summary
}
