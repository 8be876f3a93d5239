//! Structured error handling and exit codes.

use serde::Serialize;

/// Exit codes for relink.
///
/// - 0: Success (every group complete or repaired)
/// - 1: General error (manifest unreadable or malformed, enumerate failure)
/// - 3: Partial success (some groups all-missing or not fully linked)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: every group ended fully linked.
    Success = 0,
    /// General error: the run could not complete.
    GeneralError = 1,
    /// Partial success: the run completed but some groups failed.
    PartialSuccess = 3,
    /// Interrupted: the run was stopped by Ctrl+C.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "RL000",
            Self::GeneralError => "RL001",
            Self::PartialSuccess => "RL003",
            Self::Interrupted => "RL130",
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "RL001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
