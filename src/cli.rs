//! Command-line interface definitions for relink.
//!
//! Options left unset on the command line fall back to the configuration
//! file, then `RELINK_*` environment variables, then built-in defaults (see
//! [`crate::config`]).
//!
//! # Example
//!
//! ```bash
//! # Restore links under /data from a sorted manifest, 8 workers
//! relink -f hashes_sorted.txt -r /data -w 8
//!
//! # See what would be linked without touching anything
//! relink -f hashes_sorted.txt -r /data --dry-run
//!
//! # List every name of one file
//! relink --enumerate /data/photos/a.jpg
//! ```

use clap::Parser;
use std::path::PathBuf;

/// Restore hardlinks between duplicate files from a sorted hash manifest.
///
/// Each line of the manifest is `<hash>\t<size>\t<path>`, sorted by hash.
/// For every group of two or more paths sharing hash and size, relink makes
/// all members that exist on disk hardlinks of the first one found.
#[derive(Debug, Parser)]
#[command(name = "relink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Number of worker threads [default: available parallelism]
    #[arg(short, long, value_name = "N", value_parser = parse_count)]
    pub workers: Option<usize>,

    /// Hash manifest to read [default: hashes_sorted.txt]
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Root directory manifest paths are relative to [default: / or \]
    #[arg(short, long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Print every hardlink of PATH and exit
    #[arg(short, long, value_name = "PATH")]
    pub enumerate: Option<PathBuf>,

    /// Groups queued ahead of the workers [default: 64]
    #[arg(long, value_name = "N", value_parser = parse_count)]
    pub channel_capacity: Option<usize>,

    /// Report the links that would be created without creating them
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Show a progress spinner
    #[arg(long)]
    pub progress: bool,

    /// Plain-text progress without animation
    #[arg(long, requires = "progress")]
    pub accessible: bool,

    /// Configuration file [default: platform config dir]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    pub summary_json: bool,

    /// Write one CSV row per group outcome to PATH
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Report fatal errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Parse a positive count.
///
/// # Examples
///
/// ```
/// use relink::cli::parse_count;
///
/// assert_eq!(parse_count("8").unwrap(), 8);
/// assert!(parse_count("0").is_err());
/// ```
///
/// # Errors
///
/// Returns an error for anything but an integer of at least 1.
pub fn parse_count(s: &str) -> Result<usize, String> {
    let n: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: '{s}'"))?;
    if n == 0 {
        return Err("Must be at least 1".to_string());
    }
    Ok(n)
}
