//! Tab-separated manifest records.
//!
//! # Format
//!
//! One record per line, exactly three tab-separated fields and no header:
//!
//! ```text
//! <hash>\t<size>\t<relative path>
//! ```
//!
//! Hash and size are opaque tokens. Quote characters are not special, so a
//! path containing `"` is read as-is. Blank lines are skipped. Any record
//! with a different field count is fatal: a malformed manifest cannot be
//! repaired locally.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Fields every record must have.
pub const FIELDS_PER_RECORD: usize = 3;

/// Error type for manifest reading. All variants are fatal to the run.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be opened.
    #[error("cannot open manifest {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A record had the wrong number of fields.
    #[error("malformed manifest at line {line}: expected 3 fields, found {found}")]
    FieldCount { line: u64, found: usize },

    /// Reading or decoding failed.
    #[error("failed to read manifest near line {line}: {source}")]
    Read {
        line: u64,
        #[source]
        source: csv::Error,
    },
}

/// One manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRecord {
    /// Content hash (opaque)
    pub hash: String,
    /// File size token (opaque, compared as text)
    pub size: String,
    /// Path relative to the reconciliation root
    pub path: String,
    /// 1-based line number in the manifest
    pub line: u64,
}

impl ManifestRecord {
    #[must_use]
    pub fn new(hash: impl Into<String>, size: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            size: size.into(),
            path: path.into(),
            line: 0,
        }
    }
}

/// Streaming manifest reader.
///
/// Reuses one record buffer for the whole file. After the first error the
/// reader is fused and yields nothing more.
pub struct ManifestReader<R: Read> {
    inner: csv::Reader<R>,
    record: csv::StringRecord,
    failed: bool,
}

impl ManifestReader<BufReader<File>> {
    /// Open a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Open`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, ManifestError> {
        let file = File::open(path).map_err(|source| ManifestError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Reading manifest {}", path.display());
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: Read> ManifestReader<R> {
    /// Read a manifest from any byte source.
    #[must_use]
    pub fn from_reader(reader: R) -> Self {
        let inner = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);
        Self {
            inner,
            record: csv::StringRecord::new(),
            failed: false,
        }
    }

    /// Read the next record, `Ok(None)` at end of input.
    ///
    /// # Errors
    ///
    /// [`ManifestError::FieldCount`] for a wrong field count,
    /// [`ManifestError::Read`] for I/O or UTF-8 failures.
    pub fn read_record(&mut self) -> Result<Option<ManifestRecord>, ManifestError> {
        let more = self
            .inner
            .read_record(&mut self.record)
            .map_err(|source| ManifestError::Read {
                line: self.inner.position().line(),
                source,
            })?;
        if !more {
            return Ok(None);
        }

        let line = self.record.position().map_or(0, csv::Position::line);
        if self.record.len() != FIELDS_PER_RECORD {
            return Err(ManifestError::FieldCount {
                line,
                found: self.record.len(),
            });
        }

        Ok(Some(ManifestRecord {
            hash: self.record[0].to_owned(),
            size: self.record[1].to_owned(),
            path: self.record[2].to_owned(),
            line,
        }))
    }
}

impl<R: Read> Iterator for ManifestReader<R> {
    type Item = Result<ManifestRecord, ManifestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
