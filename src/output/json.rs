//! JSON run summary.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "groups": 120,
//!   "already_complete": 100,
//!   "repaired": 15,
//!   "links_created": 31,
//!   "link_failures": 2,
//!   "all_missing": 3,
//!   "partial_failures": 2,
//!   "interrupted": false,
//!   "dry_run": false,
//!   "records_read": 412,
//!   "duration_ms": 5310,
//!   "exit_code": 3,
//!   "exit_code_name": "RL003"
//! }
//! ```

use std::io::Write;
use std::time::Duration;

use serde::Serialize;

use crate::dispatch::RunSummary;
use crate::error::ExitCode;

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    #[serde(flatten)]
    pub summary: RunSummary,
    /// Manifest records consumed
    pub records_read: u64,
    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "RL000")
    pub exit_code_name: String,
}

impl JsonSummary {
    #[must_use]
    pub fn new(summary: &RunSummary, records_read: u64, duration: Duration, exit_code: ExitCode) -> Self {
        Self {
            summary: *summary,
            records_read,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            serde_json::to_string(self)?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
