//! Machine-readable run output.
//!
//! - [`json`]: the run summary with its exit code, for `--summary-json`
//! - [`csv`]: one row per reconciliation outcome, for `--report`

pub mod csv;
pub mod json;

pub use csv::{CsvOutputError, CsvReport};
pub use json::{JsonOutputError, JsonSummary};
