//! Duplicate grouping over a hash-sorted manifest.
//!
//! # Overview
//!
//! [`GroupStream`] is a single-pass reducer: it remembers the hash and size of
//! the current run and the paths collected so far. A record with a different
//! hash or size closes the run; a closed run is emitted only if it has at
//! least two members. Nothing else is buffered, so manifests of any length
//! stream in constant memory per group.
//!
//! The manifest must already be sorted by hash. Grouping does not sort or
//! check order: two non-adjacent runs of one hash come out as two groups.
//!
//! # Example
//!
//! ```
//! use relink::manifest::{GroupStream, ManifestReader};
//!
//! let input = "h1\t100\ta.txt\nh1\t100\tb.txt\nh2\t50\tc.txt\n";
//! let groups: Vec<_> = GroupStream::new(ManifestReader::from_reader(input.as_bytes()))
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//!
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].hash, "h1");
//! assert_eq!(groups[0].members, ["a.txt", "b.txt"]);
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::record::{ManifestError, ManifestReader, ManifestRecord};
use crate::links::path_utils::resolve_member;

/// Manifest entries sharing one hash and size.
///
/// Always has at least two members when produced by [`GroupStream`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// Content hash shared by all members
    pub hash: String,
    /// Size token shared by all members
    pub size: String,
    /// Member paths relative to the root, in manifest order
    pub members: Vec<String>,
}

impl DuplicateGroup {
    #[must_use]
    pub fn new(hash: impl Into<String>, size: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            hash: hash.into(),
            size: size.into(),
            members,
        }
    }

    /// Number of members in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Check if this group has actual duplicates (2+ members).
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        self.members.len() > 1
    }

    /// Member paths joined onto `root`, in manifest order.
    pub fn member_paths<'a>(&'a self, root: &'a Path) -> impl Iterator<Item = PathBuf> + 'a {
        self.members.iter().map(move |m| resolve_member(root, m))
    }
}

/// The run being accumulated.
#[derive(Debug)]
struct Run {
    hash: String,
    size: String,
    members: Vec<String>,
}

impl Run {
    fn start(record: ManifestRecord) -> Self {
        Self {
            hash: record.hash,
            size: record.size,
            members: vec![record.path],
        }
    }

    fn matches(&self, record: &ManifestRecord) -> bool {
        self.hash == record.hash && self.size == record.size
    }

    fn into_group(self) -> Option<DuplicateGroup> {
        if self.members.len() < 2 {
            return None;
        }
        Some(DuplicateGroup {
            hash: self.hash,
            size: self.size,
            members: self.members,
        })
    }
}

/// Lazy sequence of duplicate groups from sorted manifest records.
///
/// Finite and not restartable. A record error ends the stream: the error is
/// yielded once and the partially built run is discarded.
#[derive(Debug)]
pub struct GroupStream<I> {
    records: I,
    run: Option<Run>,
    records_read: u64,
    done: bool,
}

impl GroupStream<ManifestReader<BufReader<File>>> {
    /// Stream groups from a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Open`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, ManifestError> {
        Ok(Self::new(ManifestReader::open(path)?))
    }
}

impl<I> GroupStream<I>
where
    I: Iterator<Item = Result<ManifestRecord, ManifestError>>,
{
    #[must_use]
    pub fn new(records: I) -> Self {
        Self {
            records,
            run: None,
            records_read: 0,
            done: false,
        }
    }

    /// Records consumed so far.
    #[must_use]
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Add a record, returning the run it closed if that run is a group.
    fn push(&mut self, record: ManifestRecord) -> Option<DuplicateGroup> {
        self.records_read += 1;
        if let Some(run) = self.run.as_mut().filter(|run| run.matches(&record)) {
            run.members.push(record.path);
            return None;
        }
        self.run
            .replace(Run::start(record))
            .and_then(Run::into_group)
    }
}

impl<I> Iterator for GroupStream<I>
where
    I: Iterator<Item = Result<ManifestRecord, ManifestError>>,
{
    type Item = Result<DuplicateGroup, ManifestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.records.next() {
                Some(Ok(record)) => {
                    if let Some(group) = self.push(record) {
                        return Some(Ok(group));
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    self.run = None;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    log::debug!("Manifest exhausted after {} record(s)", self.records_read);
                    return self.run.take().and_then(Run::into_group).map(Ok);
                }
            }
        }
    }
}
