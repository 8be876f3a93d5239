//! CSV outcome report.
//!
//! One row per affected path, written as groups finish:
//!
//! - `hash`, `size`: the group
//! - `outcome`: `complete`, `linked`, `all_missing`, `enumerate_failed`,
//!   `link_failed` or `undersized`
//! - `path`: the member concerned
//! - `detail`: link count or error text
//!
//! Complete and linked groups get one row naming their first member.
//! Rows from different workers interleave in completion order.
//!
//! # Example
//!
//! ```no_run
//! use relink::output::csv::CsvReport;
//! use std::path::Path;
//!
//! let report = CsvReport::create(Path::new("report.csv")).unwrap();
//! // hand `&report` to Dispatcher::run, then:
//! report.finish().unwrap();
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;

use crate::manifest::DuplicateGroup;
use crate::progress::Reporter;
use crate::reconcile::{FailureReason, ReconciliationOutcome};

/// Errors that can occur during CSV output generation.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// An earlier row could not be written.
    #[error("report incomplete: {0}")]
    Incomplete(String),
}

/// A single row in the CSV output.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    hash: &'a str,
    size: &'a str,
    outcome: &'static str,
    path: String,
    detail: String,
}

struct State<W: Write> {
    writer: csv::Writer<W>,
    error: Option<String>,
}

/// [`Reporter`] that writes outcome rows to a CSV sink.
pub struct CsvReport<W: Write + Send = BufWriter<File>> {
    state: Mutex<State<W>>,
}

impl CsvReport {
    /// Create (or truncate) a report file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self, CsvOutputError> {
        let file = File::create(path)?;
        log::debug!("Writing outcome report to {}", path.display());
        Ok(Self::from_writer(BufWriter::new(file)))
    }
}

impl<W: Write + Send> CsvReport<W> {
    #[must_use]
    pub fn from_writer(writer: W) -> Self {
        Self {
            state: Mutex::new(State {
                writer: csv::Writer::from_writer(writer),
                error: None,
            }),
        }
    }

    /// Flush and return the sink.
    ///
    /// # Errors
    ///
    /// Returns the first row error seen during the run, or a flush error.
    pub fn finish(self) -> Result<W, CsvOutputError> {
        let state = self
            .state
            .into_inner()
            .map_err(|_| CsvOutputError::Incomplete("report writer poisoned".to_string()))?;
        if let Some(error) = state.error {
            return Err(CsvOutputError::Incomplete(error));
        }
        state
            .writer
            .into_inner()
            .map_err(|e| CsvOutputError::Io(e.into_error()))
    }
}

fn rows<'a>(group: &'a DuplicateGroup, outcome: &ReconciliationOutcome) -> Vec<CsvRow<'a>> {
    let (hash, size) = (group.hash.as_str(), group.size.as_str());
    let row = move |outcome, path: String, detail: String| CsvRow {
        hash,
        size,
        outcome,
        path,
        detail,
    };
    let first = group.members.first().cloned().unwrap_or_default();

    match outcome {
        ReconciliationOutcome::AlreadyComplete => vec![row("complete", first, String::new())],
        ReconciliationOutcome::LinkedMissing(n) => vec![row("linked", first, n.to_string())],
        ReconciliationOutcome::AllMissing { candidates } => candidates
            .iter()
            .map(|p| row("all_missing", p.display().to_string(), String::new()))
            .collect(),
        ReconciliationOutcome::PartialFailure(FailureReason::Enumerate { path, error }) => {
            vec![row("enumerate_failed", path.display().to_string(), error.to_string())]
        }
        ReconciliationOutcome::PartialFailure(FailureReason::Links { failures, .. }) => failures
            .iter()
            .map(|f| row("link_failed", f.path.display().to_string(), f.error.to_string()))
            .collect(),
        ReconciliationOutcome::PartialFailure(FailureReason::Undersized { members }) => {
            vec![row("undersized", first, members.to_string())]
        }
    }
}

impl<W: Write + Send> Reporter for CsvReport<W> {
    fn on_group(&self, group: &DuplicateGroup, outcome: &ReconciliationOutcome) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.error.is_some() {
            return;
        }
        for row in rows(group, outcome) {
            if let Err(e) = state.writer.serialize(row) {
                log::error!("Failed to write report row for group {}: {}", group.hash, e);
                state.error = Some(e.to_string());
                return;
            }
        }
    }
}
